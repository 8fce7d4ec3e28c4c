// Output formatting and display for CLI

use crate::config::SupervisorConfig;
use crate::daemon::{DaemonStatus, StartOutcome, StopOutcome};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tabled::{
    settings::{object::Columns, Modify, Style, Width},
    Table, Tabled,
};

/// Environment variables the API server reads its credentials from
const CREDENTIAL_VARS: [&str; 2] = ["KIRO_ACCESS_TOKEN", "KIRO_REFRESH_TOKEN"];

/// Token cache written by the Kiro IDE, relative to the home directory
const TOKEN_CACHE_PATH: &str = ".aws/sso/cache/kiro-auth-token.json";

/// Announce a background start before the invoking process detaches
pub fn print_starting(port: u16, log_file: &Path) {
    println!(
        "{} Starting kiro2api on port {}...",
        "ℹ".blue().bold(),
        port.to_string().cyan()
    );
    println!("  {}: {}", "Logs".bold(), log_file.display());
}

pub fn print_start_outcome(outcome: &StartOutcome) {
    match outcome {
        StartOutcome::Detached { port } => {
            print_success_msg(&format!("kiro2api started in the background on port {}", port));
        }
        StartOutcome::AlreadyRunning { pid } => {
            println!(
                "{}",
                format!("kiro2api is already running (PID: {})", pid)
                    .yellow()
                    .bold()
            );
        }
        StartOutcome::StartInProgress => {
            println!("{}", "Another start of kiro2api is in progress".yellow().bold());
        }
        StartOutcome::Exited => {
            print_success_msg("kiro2api exited");
        }
    }
}

pub fn print_stop_outcome(outcome: &StopOutcome) {
    match outcome {
        StopOutcome::NotRunning => {
            println!("{}", "kiro2api is not running".yellow());
        }
        StopOutcome::Stale { pid } => {
            println!(
                "{}",
                format!("kiro2api is not running (removed stale PID file for {})", pid).yellow()
            );
        }
        StopOutcome::Stopped { pid, forced: false } => {
            print_success_msg(&format!("kiro2api stopped (PID: {})", pid));
        }
        StopOutcome::Stopped { pid, forced: true } => {
            print_success_msg(&format!("kiro2api force-stopped with SIGKILL (PID: {})", pid));
        }
    }
}

/// Warn that the previous instance outlived the restart grace period
pub fn print_lingering_instance(stop: &StopOutcome) {
    if let StopOutcome::Stopped { pid, .. } = stop {
        println!(
            "{}",
            format!("Previous instance (PID: {}) is still alive, starting anyway", pid).yellow()
        );
    }
}

/// Print detailed status view for the daemon
pub fn print_status(status: &DaemonStatus) {
    match status {
        DaemonStatus::NotRunning => {
            println!("{}", "✗ kiro2api is not running".red().bold());
        }
        DaemonStatus::Stale { pid } => {
            println!("{}", "✗ kiro2api is not running (stale)".red().bold());
            println!("  {}", format!("Removed stale PID file for {}", pid).dimmed());
        }
        DaemonStatus::Running {
            pid,
            pid_file,
            log_file,
            recent_logs,
        } => {
            println!("{}", "✓ kiro2api is running".green().bold());
            println!("  {:<10} {}", "PID:".bold(), pid);
            println!("  {:<10} {}", "PID file:".bold(), pid_file.display());
            println!("  {:<10} {}", "Log file:".bold(), log_file.display());
            print_logs(recent_logs);
        }
    }
}

/// Print log lines as recorded
pub fn print_logs(lines: &[String]) {
    if lines.is_empty() {
        println!("{}", "No logs available".yellow());
        return;
    }

    println!("\n{}", "Recent logs".bold().underline());
    println!();

    for line in lines {
        println!("{}", line);
    }

    println!();
}

/// Print current settings, without revealing credential values
pub fn print_info_table(config: &SupervisorConfig, config_path: Option<&Path>) {
    #[derive(Tabled)]
    struct SettingRow {
        #[tabled(rename = "Setting")]
        name: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    let config_file = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(SupervisorConfig::default_config_path);
    let token_cache = dirs::home_dir().map(|home| home.join(TOKEN_CACHE_PATH));

    let mut rows = vec![
        ("Version", env!("CARGO_PKG_VERSION").to_string()),
        ("State dir", config.state_dir.display().to_string()),
        ("PID file", config.pid_file().display().to_string()),
        ("Log file", config.log_file().display().to_string()),
        ("Config file", describe_file(&config_file)),
        ("Host", config.host.clone()),
        ("Port", config.default_port.to_string()),
        ("URL", format!("http://localhost:{}", config.default_port)),
        (
            "Token file",
            token_cache
                .as_deref()
                .map(describe_file)
                .unwrap_or_else(|| "unknown (no home directory)".to_string()),
        ),
    ];
    for var in CREDENTIAL_VARS {
        rows.push((var, env_presence(std::env::var_os(var).is_some()).to_string()));
    }

    let rows: Vec<SettingRow> = rows
        .into_iter()
        .map(|(name, value)| SettingRow {
            name: name.to_string(),
            value,
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Columns::last()).with(Width::wrap(60)));

    println!("\n{}\n", "kiro2api Configuration".bold().underline());
    println!("{}\n", table);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Create a spinner for long operations
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn describe_file(path: &Path) -> String {
    let state = if path.exists() { "exists" } else { "missing" };
    format!("{} ({})", path.display(), state)
}

fn env_presence(set: bool) -> &'static str {
    if set {
        "Set"
    } else {
        "Not set"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_env_presence() {
        assert_eq!(env_presence(true), "Set");
        assert_eq!(env_presence(false), "Not set");
    }

    #[test]
    fn test_describe_file() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("config.toml");
        std::fs::write(&present, "").unwrap();
        let absent = temp_dir.path().join("absent.toml");

        assert!(describe_file(&present).ends_with("(exists)"));
        assert!(describe_file(&absent).ends_with("(missing)"));
    }
}
