use crate::error::{Result, TrailError};
use crate::fusion::FusionConfig;
use crate::simplify::{SimplifyConfig, MIN_INTERPOLATION_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// GPS validation and projection settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsConfig {
    /// Side length of the normalized pixel square
    pub normalized_size: f64,

    /// Padding added on each side of the bounds, in percent of the span
    pub padding_percent: f64,

    /// Points implying a faster speed from the last accepted point are spikes
    pub max_speed_kmh: f64,

    /// Largest tolerated time gap before a completeness warning
    pub gap_warning_secs: f64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            normalized_size: 1000.0,
            padding_percent: 10.0,
            max_speed_kmh: 200.0,
            gap_warning_secs: 60.0,
        }
    }
}

/// Fully resolved settings consumed by the import pipeline
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    pub fusion: FusionConfig,
    pub simplify: SimplifyConfig,
    pub gps: GpsConfig,
    pub map_provider_url: Option<String>,
}

impl PipelineConfig {
    /// Static map URL template, required for map image fetches
    pub fn require_map_provider_url(&self) -> Result<&str> {
        self.map_provider_url.as_deref().ok_or_else(|| TrailError::ConfigMissing {
            key: "map_provider_url".to_string(),
        })
    }
}

/// Layered configuration for trailfuse
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub movement_sample_threshold: ConfigValue<usize>,
    pub movement_sample_interval: ConfigValue<f64>,
    pub min_distance: ConfigValue<f64>,
    pub max_time_gap: ConfigValue<f64>,
    pub interpolation_threshold: ConfigValue<f64>,
    pub code_sampling_interval: ConfigValue<usize>,
    pub stop_sampling_interval: ConfigValue<usize>,
    pub aggressive: ConfigValue<bool>,
    pub preserve_stops: ConfigValue<bool>,
    pub normalized_size: ConfigValue<f64>,
    pub padding_percent: ConfigValue<f64>,
    pub max_speed_kmh: ConfigValue<f64>,
    pub gap_warning_secs: ConfigValue<f64>,
    pub map_provider_url: ConfigValue<Option<String>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        let fusion = FusionConfig::default();
        let simplify = SimplifyConfig::default();
        let gps = GpsConfig::default();
        let d = ConfigSource::Default;

        Self {
            movement_sample_threshold: ConfigValue::new(fusion.movement_sample_threshold, d),
            movement_sample_interval: ConfigValue::new(fusion.movement_sample_interval, d),
            min_distance: ConfigValue::new(simplify.min_distance, d),
            max_time_gap: ConfigValue::new(simplify.max_time_gap, d),
            interpolation_threshold: ConfigValue::new(simplify.interpolation_threshold, d),
            code_sampling_interval: ConfigValue::new(simplify.code_sampling_interval, d),
            stop_sampling_interval: ConfigValue::new(simplify.stop_sampling_interval, d),
            aggressive: ConfigValue::new(simplify.aggressive, d),
            preserve_stops: ConfigValue::new(simplify.preserve_stops, d),
            normalized_size: ConfigValue::new(gps.normalized_size, d),
            padding_percent: ConfigValue::new(gps.padding_percent, d),
            max_speed_kmh: ConfigValue::new(gps.max_speed_kmh, d),
            gap_warning_secs: ConfigValue::new(gps.gap_warning_secs, d),
            map_provider_url: ConfigValue::new(None, d),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| TrailError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| TrailError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        let src = ConfigSource::File;
        if let Some(fusion) = file_config.fusion {
            if let Some(v) = fusion.movement_sample_threshold {
                self.movement_sample_threshold.update(v, src);
            }
            if let Some(v) = fusion.movement_sample_interval {
                self.movement_sample_interval.update(v, src);
            }
        }

        if let Some(simplify) = file_config.simplify {
            if let Some(v) = simplify.min_distance {
                self.min_distance.update(v, src);
            }
            if let Some(v) = simplify.max_time_gap {
                self.max_time_gap.update(v, src);
            }
            if let Some(v) = simplify.interpolation_threshold {
                self.interpolation_threshold.update(v, src);
            }
            if let Some(v) = simplify.code_sampling_interval {
                self.code_sampling_interval.update(v, src);
            }
            if let Some(v) = simplify.stop_sampling_interval {
                self.stop_sampling_interval.update(v, src);
            }
            if let Some(v) = simplify.aggressive {
                self.aggressive.update(v, src);
            }
            if let Some(v) = simplify.preserve_stops {
                self.preserve_stops.update(v, src);
            }
        }

        if let Some(gps) = file_config.gps {
            if let Some(v) = gps.normalized_size {
                self.normalized_size.update(v, src);
            }
            if let Some(v) = gps.padding_percent {
                self.padding_percent.update(v, src);
            }
            if let Some(v) = gps.max_speed_kmh {
                self.max_speed_kmh.update(v, src);
            }
            if let Some(v) = gps.gap_warning_secs {
                self.gap_warning_secs.update(v, src);
            }
            if let Some(url) = gps.map_provider_url {
                self.map_provider_url.update(Some(url), src);
            }
        }

        Ok(self)
    }

    /// Load configuration from `TRAILFUSE_*` environment variables
    pub fn load_from_env(mut self) -> Self {
        update_from_env(&mut self.movement_sample_threshold, "TRAILFUSE_MOVEMENT_SAMPLE_THRESHOLD");
        update_from_env(&mut self.movement_sample_interval, "TRAILFUSE_MOVEMENT_SAMPLE_INTERVAL");
        update_from_env(&mut self.min_distance, "TRAILFUSE_MIN_DISTANCE");
        update_from_env(&mut self.max_time_gap, "TRAILFUSE_MAX_TIME_GAP");
        update_from_env(&mut self.interpolation_threshold, "TRAILFUSE_INTERPOLATION_THRESHOLD");
        update_from_env(&mut self.code_sampling_interval, "TRAILFUSE_CODE_SAMPLING_INTERVAL");
        update_from_env(&mut self.stop_sampling_interval, "TRAILFUSE_STOP_SAMPLING_INTERVAL");
        update_from_env(&mut self.aggressive, "TRAILFUSE_AGGRESSIVE");
        update_from_env(&mut self.preserve_stops, "TRAILFUSE_PRESERVE_STOPS");
        update_from_env(&mut self.normalized_size, "TRAILFUSE_NORMALIZED_SIZE");
        update_from_env(&mut self.padding_percent, "TRAILFUSE_PADDING_PERCENT");
        update_from_env(&mut self.max_speed_kmh, "TRAILFUSE_MAX_SPEED_KMH");
        update_from_env(&mut self.gap_warning_secs, "TRAILFUSE_GAP_WARNING_SECS");

        if let Ok(url) = env::var("TRAILFUSE_MAP_PROVIDER_URL") {
            self.map_provider_url.update(Some(url), ConfigSource::Environment);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        let src = ConfigSource::Cli;
        if let Some(v) = overrides.movement_sample_interval {
            self.movement_sample_interval.update(v, src);
        }
        if let Some(v) = overrides.min_distance {
            self.min_distance.update(v, src);
        }
        if let Some(v) = overrides.max_time_gap {
            self.max_time_gap.update(v, src);
        }
        if let Some(v) = overrides.aggressive {
            self.aggressive.update(v, src);
        }
        if let Some(v) = overrides.max_speed_kmh {
            self.max_speed_kmh.update(v, src);
        }
        if let Some(url) = overrides.map_provider_url {
            self.map_provider_url.update(Some(url), src);
        }
    }

    /// Validate and flatten into the settings the pipeline consumes
    pub fn resolve(&self) -> Result<PipelineConfig> {
        require_positive("movement_sample_interval", self.movement_sample_interval.value)?;
        require_positive("max_time_gap", self.max_time_gap.value)?;
        require_positive("interpolation_threshold", self.interpolation_threshold.value)?;
        if self.interpolation_threshold.value < MIN_INTERPOLATION_THRESHOLD {
            return Err(TrailError::ConfigInvalid {
                key: "interpolation_threshold".to_string(),
                reason: format!("must be at least {} seconds", MIN_INTERPOLATION_THRESHOLD),
            });
        }
        require_positive("normalized_size", self.normalized_size.value)?;
        require_positive("max_speed_kmh", self.max_speed_kmh.value)?;
        require_non_negative("min_distance", self.min_distance.value)?;
        require_non_negative("padding_percent", self.padding_percent.value)?;
        require_non_negative("gap_warning_secs", self.gap_warning_secs.value)?;
        for (key, value) in [
            ("code_sampling_interval", self.code_sampling_interval.value),
            ("stop_sampling_interval", self.stop_sampling_interval.value),
        ] {
            if value == 0 {
                return Err(TrailError::ConfigInvalid {
                    key: key.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(PipelineConfig {
            fusion: FusionConfig {
                movement_sample_threshold: self.movement_sample_threshold.value,
                movement_sample_interval: self.movement_sample_interval.value,
            },
            simplify: SimplifyConfig {
                min_distance: self.min_distance.value,
                max_time_gap: self.max_time_gap.value,
                interpolation_threshold: self.interpolation_threshold.value,
                code_sampling_interval: self.code_sampling_interval.value,
                stop_sampling_interval: self.stop_sampling_interval.value,
                aggressive: self.aggressive.value,
                preserve_stops: self.preserve_stops.value,
            },
            gps: GpsConfig {
                normalized_size: self.normalized_size.value,
                padding_percent: self.padding_percent.value,
                max_speed_kmh: self.max_speed_kmh.value,
                gap_warning_secs: self.gap_warning_secs.value,
            },
            map_provider_url: self.map_provider_url.value.clone(),
        })
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        fn entry<T: Display>(v: &ConfigValue<T>) -> (String, ConfigSource) {
            (v.value.to_string(), v.source)
        }

        let mut map = HashMap::new();
        map.insert("movement_sample_threshold".to_string(), entry(&self.movement_sample_threshold));
        map.insert("movement_sample_interval".to_string(), entry(&self.movement_sample_interval));
        map.insert("min_distance".to_string(), entry(&self.min_distance));
        map.insert("max_time_gap".to_string(), entry(&self.max_time_gap));
        map.insert("interpolation_threshold".to_string(), entry(&self.interpolation_threshold));
        map.insert("code_sampling_interval".to_string(), entry(&self.code_sampling_interval));
        map.insert("stop_sampling_interval".to_string(), entry(&self.stop_sampling_interval));
        map.insert("aggressive".to_string(), entry(&self.aggressive));
        map.insert("preserve_stops".to_string(), entry(&self.preserve_stops));
        map.insert("normalized_size".to_string(), entry(&self.normalized_size));
        map.insert("padding_percent".to_string(), entry(&self.padding_percent));
        map.insert("max_speed_kmh".to_string(), entry(&self.max_speed_kmh));
        map.insert("gap_warning_secs".to_string(), entry(&self.gap_warning_secs));
        map.insert(
            "map_provider_url".to_string(),
            (
                self.map_provider_url.value.clone().unwrap_or_else(|| "(none)".to_string()),
                self.map_provider_url.source,
            ),
        );
        map
    }
}

fn update_from_env<T: FromStr>(value: &mut ConfigValue<T>, key: &str) {
    if let Ok(raw) = env::var(key) {
        match raw.trim().parse::<T>() {
            Ok(parsed) => value.update(parsed, ConfigSource::Environment),
            Err(_) => tracing::warn!("Invalid {} value '{}', ignoring", key, raw),
        }
    }
}

fn require_positive(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrailError::ConfigInvalid {
            key: key.to_string(),
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

fn require_non_negative(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrailError::ConfigInvalid {
            key: key.to_string(),
            reason: format!("must be zero or positive, got {}", value),
        })
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Default, Deserialize, Serialize)]
struct FileConfig {
    fusion: Option<FusionSection>,
    simplify: Option<SimplifySection>,
    gps: Option<GpsSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct FusionSection {
    movement_sample_threshold: Option<usize>,
    movement_sample_interval: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct SimplifySection {
    min_distance: Option<f64>,
    max_time_gap: Option<f64>,
    interpolation_threshold: Option<f64>,
    code_sampling_interval: Option<usize>,
    stop_sampling_interval: Option<usize>,
    aggressive: Option<bool>,
    preserve_stops: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct GpsSection {
    normalized_size: Option<f64>,
    padding_percent: Option<f64>,
    max_speed_kmh: Option<f64>,
    gap_warning_secs: Option<f64>,
    map_provider_url: Option<String>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub movement_sample_interval: Option<f64>,
    pub min_distance: Option<f64>,
    pub max_time_gap: Option<f64>,
    pub aggressive: Option<bool>,
    pub max_speed_kmh: Option<f64>,
    pub map_provider_url: Option<String>,
}
