//! Integration tests for layered configuration
//!
//! Precedence: CLI arguments > environment variables > config file > defaults

use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;
use trailfuse_core::config::{CliConfigOverrides, ConfigSource, LayeredConfig};

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", content).unwrap();
    file
}

#[test]
fn test_file_overrides_defaults() {
    let file = config_file(
        r#"
[fusion]
movement_sample_threshold = 500

[simplify]
min_distance = 2.5
aggressive = true

[gps]
padding_percent = 5.0
map_provider_url = "https://maps.example/static?bbox={bbox}&size={width}x{height}"
"#,
    );

    let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

    assert_eq!(config.movement_sample_threshold.value, 500);
    assert_eq!(config.movement_sample_threshold.source, ConfigSource::File);
    assert_eq!(config.min_distance.value, 2.5);
    assert!(config.aggressive.value);
    assert_eq!(config.padding_percent.source, ConfigSource::File);
    assert_eq!(config.max_time_gap.source, ConfigSource::Default);
    assert!(config.map_provider_url.value.is_some());
}

#[test]
fn test_malformed_file_is_rejected() {
    let file = config_file("[simplify\nmin_distance = ");
    assert!(LayeredConfig::with_defaults().load_from_file(file.path()).is_err());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    env::remove_var("TRAILFUSE_MIN_DISTANCE");
    env::remove_var("TRAILFUSE_MAX_TIME_GAP");

    env::set_var("TRAILFUSE_MIN_DISTANCE", "8.5");
    env::set_var("TRAILFUSE_MAX_TIME_GAP", "not-a-number");

    let file = config_file("[simplify]\nmin_distance = 2.5\nmax_time_gap = 4.0\n");
    let config = LayeredConfig::with_defaults()
        .load_from_file(file.path())
        .unwrap()
        .load_from_env();

    assert_eq!(config.min_distance.value, 8.5);
    assert_eq!(config.min_distance.source, ConfigSource::Environment);
    // Unparseable values leave the lower layer in place
    assert_eq!(config.max_time_gap.value, 4.0);
    assert_eq!(config.max_time_gap.source, ConfigSource::File);

    env::remove_var("TRAILFUSE_MIN_DISTANCE");
    env::remove_var("TRAILFUSE_MAX_TIME_GAP");
}

#[test]
#[serial]
fn test_cli_overrides_all() {
    env::set_var("TRAILFUSE_MIN_DISTANCE", "8.5");

    let mut config = LayeredConfig::with_defaults().load_from_env();
    config.update_from_cli(CliConfigOverrides {
        min_distance: Some(1.0),
        aggressive: Some(true),
        ..Default::default()
    });

    assert_eq!(config.min_distance.value, 1.0);
    assert_eq!(config.min_distance.source, ConfigSource::Cli);
    assert_eq!(config.aggressive.source, ConfigSource::Cli);

    let resolved = config.resolve().unwrap();
    assert_eq!(resolved.simplify.min_distance, 1.0);
    assert!(resolved.simplify.aggressive);

    env::remove_var("TRAILFUSE_MIN_DISTANCE");
}

#[test]
fn test_resolve_rejects_invalid_values() {
    let mut config = LayeredConfig::with_defaults();
    config.update_from_cli(CliConfigOverrides { max_time_gap: Some(0.0), ..Default::default() });
    assert!(config.resolve().is_err());
}
