use colored::Colorize;
use kiro2api::cli::Cli;

fn main() {
    if let Err(e) = Cli::run() {
        eprintln!("{} {}", "✗ Error:".red().bold(), e);
        std::process::exit(1);
    }
}
