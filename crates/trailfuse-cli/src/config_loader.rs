//! Configuration loading utilities for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use trailfuse_core::config::{CliConfigOverrides, LayeredConfig};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "trailfuse.toml";

/// Explicit path, or `./trailfuse.toml` when it exists
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
            candidate.is_file().then_some(candidate)
        }
    }
}

/// Load defaults, then the config file, then `TRAILFUSE_*` environment variables
pub fn load_config(explicit: Option<&Path>) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();
    if let Some(path) = config_path(explicit) {
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
    }
    Ok(config.load_from_env())
}

/// Load layered configuration with CLI overrides
pub fn load_config_with_overrides(
    explicit: Option<&Path>,
    overrides: CliConfigOverrides,
) -> Result<LayeredConfig> {
    let mut config = load_config(explicit)?;
    config.update_from_cli(overrides);
    Ok(config)
}
