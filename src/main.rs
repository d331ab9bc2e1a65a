//! promptloom CLI entry point.
//!
//! Parses arguments, resolves a template through the six-stage pipeline,
//! and prints each enumerated item to stdout. Nothing downstream of
//! argument parsing performs network or concurrent I/O, so this stays a
//! plain synchronous `fn main`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use promptloom::cli::Cli;
use promptloom::error::user_friendly_error;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins if set; otherwise --verbose turns on debug; otherwise
    // logging is off.
    let rust_log_exists = std::env::var("RUST_LOG").is_ok();
    let filter = if rust_log_exists {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Err(e) = cli.run() {
        user_friendly_error(e).display();
        std::process::exit(1);
    }
}
