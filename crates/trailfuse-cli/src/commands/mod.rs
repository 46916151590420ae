//! Command implementations

mod config;
mod fuse;
mod inspect;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Inspect(args) => inspect::execute(args, &output).await,
        Commands::Fuse(args) => fuse::execute(args, config_path, &output).await,
        Commands::Config => config::execute(config_path, &output),
    };

    if let Err(e) = &result {
        output.error(format!("{:#}", e));
    }
    result
}
