//! trailfuse CLI - inspect and fuse actor movement, speech and code files

mod cli;
mod commands;
mod config_loader;
mod output;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    // Errors are already reported by the output writer
    if runtime.block_on(commands::execute(cli)).is_err() {
        std::process::exit(1);
    }

    Ok(())
}
