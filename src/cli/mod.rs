// CLI module - User-facing command-line interface

mod output;

use crate::config::SupervisorConfig;
use crate::daemon::DaemonManager;
use crate::error::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Number of log lines `logs` prints by default
const DEFAULT_LOG_LINES: usize = 20;

/// kiro2api - run the API server as a background daemon
#[derive(Parser)]
#[command(name = "kiro2api")]
#[command(version, about, long_about = None)]
#[command(disable_version_flag = true, arg_required_else_help = true)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: (),

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server in the background
    Start {
        /// Port to listen on (default: 8989)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Stop the background server
    Stop,

    /// Restart the background server
    Restart {
        /// Port to listen on (default: 8989)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show whether the server is running
    Status,

    /// Show current settings and configuration
    Info,

    /// Show the end of the server log
    Logs {
        /// Number of lines to display
        #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LINES)]
        lines: usize,
    },

    /// Run the server in the foreground
    Run {
        /// Port to listen on (default: 8989)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Run the CLI application
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        crate::logging::init();
        cli.execute()
    }

    /// Execute the parsed command
    fn execute(&self) -> Result<()> {
        let config = SupervisorConfig::load(self.config.as_deref())?;

        let manager = DaemonManager::new(config).with_config_path(self.config.clone());
        let default_port = manager.config().default_port;

        match &self.command {
            Commands::Start { port } => {
                let port = port.unwrap_or(default_port);
                output::print_starting(port, manager.log().path());
                let outcome = manager.start(port)?;
                output::print_start_outcome(&outcome);
            }

            Commands::Stop => {
                let spinner = output::create_progress_bar("Stopping kiro2api...");
                let outcome = manager.stop();
                spinner.finish_and_clear();
                output::print_stop_outcome(&outcome?);
            }

            Commands::Restart { port } => {
                let port = port.unwrap_or(default_port);
                output::print_info(&format!("Restarting kiro2api on port {}...", port));
                let (stop, old_exited) = manager.stop_for_restart()?;
                output::print_stop_outcome(&stop);
                if !old_exited {
                    output::print_lingering_instance(&stop);
                }

                output::print_starting(port, manager.log().path());
                let outcome = manager.start(port)?;
                output::print_start_outcome(&outcome);
            }

            Commands::Info => {
                output::print_info_table(manager.config(), self.config.as_deref());
            }

            Commands::Status => {
                output::print_status(&manager.status());
            }

            Commands::Logs { lines } => {
                output::print_logs(&manager.recent_logs(*lines));
            }

            Commands::Run { port } => {
                let port = port.unwrap_or(default_port);
                output::print_info(&format!(
                    "Running kiro2api on port {} in the foreground (Ctrl-C to stop)",
                    port
                ));
                let outcome = manager.run_foreground(port)?;
                output::print_start_outcome(&outcome);
            }
        }

        Ok(())
    }
}
