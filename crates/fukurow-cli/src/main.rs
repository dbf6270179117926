//! Realization CLI main entry point

use anyhow::Result;
use clap::Parser;
use fukurow_cli::commands::{Cli, CommandExecutor};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut executor = CommandExecutor::from_cli(&cli)?;
    let result = executor.execute(cli.command)?;

    // Exit with appropriate code
    if result.success {
        std::process::exit(0);
    } else {
        eprintln!("{}", result.message);
        std::process::exit(1);
    }
}
