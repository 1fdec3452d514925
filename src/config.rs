/// Service configuration loader - parses gwres.toml
///
/// Keeps evaluation thresholds out of the code so trend sensitivity, alert
/// bands, and the evaluation period can be tuned without recompiling. Every
/// field has a default, so an empty file (or a missing section) is valid.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "gwres.toml";

/// Longest accepted evaluation period (100 Julian years).
pub const MAX_PERIOD_DAYS: i64 = 36_525;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Thresholds handed to the metrics orchestrator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluation window and maximum age of a metrics record, in days.
    pub period_days: i64,
    pub trend: TrendConfig,
    pub alert: AlertThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            period_days: 365,
            trend: TrendConfig::default(),
            alert: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Slopes with |slope| below this (m/year) are `stable`.
    pub stable_epsilon_m_per_year: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            stable_epsilon_m_per_year: 0.1,
        }
    }
}

/// Lower bounds of the alert bands, in storage percent. Intervals are
/// half-open: a value equal to a bound belongs to the higher band.
///
///   [0, warning_from) critical, [warning_from, normal_from) warning,
///   [normal_from, good_from) normal, [good_from, 100] good
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub warning_from: f64,
    pub normal_from: f64,
    pub good_from: f64,
    /// Downgrade `normal` to `warning` when the water table is falling.
    pub downgrade_normal_on_falling: bool,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning_from: 25.0,
            normal_from: 50.0,
            good_from: 75.0,
            downgrade_normal_on_falling: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Service configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// How often the daemon sweeps all stations for stale metrics.
    pub poll_interval_minutes: u64,
    /// Worker threads used for batch evaluation.
    pub worker_threads: usize,
    /// Serve the JSON endpoint on this port if set.
    pub endpoint_port: Option<u16>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 60,
            worker_threads: 4,
            endpoint_port: None,
        }
    }
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    pub service: DaemonSettings,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if !(1..=MAX_PERIOD_DAYS).contains(&engine.period_days) {
            return Err(ConfigError::Validation(format!(
                "engine.period_days must be within 1..={}, got {}",
                MAX_PERIOD_DAYS, engine.period_days
            )));
        }

        let epsilon = engine.trend.stable_epsilon_m_per_year;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(ConfigError::Validation(format!(
                "engine.trend.stable_epsilon_m_per_year must be >= 0, got {}",
                epsilon
            )));
        }

        let a = &engine.alert;
        let ascending = 0.0 < a.warning_from && a.warning_from < a.normal_from
            && a.normal_from < a.good_from && a.good_from <= 100.0;
        if !ascending {
            return Err(ConfigError::Validation(format!(
                "alert bands must satisfy 0 < warning_from < normal_from < good_from <= 100, got {} / {} / {}",
                a.warning_from, a.normal_from, a.good_from
            )));
        }

        if self.service.poll_interval_minutes == 0 {
            return Err(ConfigError::Validation(
                "service.poll_interval_minutes must be at least 1".to_string(),
            ));
        }

        if self.service.worker_threads == 0 {
            return Err(ConfigError::Validation("service.worker_threads must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Parses and validates configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&contents)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        return Ok(ServiceConfig::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").expect("empty config should parse");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.engine.period_days, 365);
        assert_eq!(config.engine.trend.stable_epsilon_m_per_year, 0.1);
        assert_eq!(config.engine.alert.warning_from, 25.0);
        assert_eq!(config.service.worker_threads, 4);
    }

    #[test]
    fn test_partial_sections_fill_remaining_defaults() {
        let config = parse_config(
            r#"
            [engine]
            period_days = 180

            [engine.alert]
            good_from = 80.0

            [service]
            endpoint_port = 8080
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.engine.period_days, 180);
        assert_eq!(config.engine.alert.good_from, 80.0);
        assert_eq!(config.engine.alert.normal_from, 50.0);
        assert_eq!(config.service.endpoint_port, Some(8080));
        assert_eq!(config.service.poll_interval_minutes, 60);
    }

    #[test]
    fn test_rejects_non_ascending_bands() {
        let result = parse_config(
            r#"
            [engine.alert]
            warning_from = 60.0
            normal_from = 50.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_non_positive_period() {
        let result = parse_config("[engine]\nperiod_days = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_period_beyond_calendar_range() {
        let result = parse_config("[engine]\nperiod_days = 100000000\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let longest = parse_config(&format!("[engine]\nperiod_days = {}\n", MAX_PERIOD_DAYS))
            .expect("upper bound is inclusive");
        assert_eq!(longest.engine.period_days, MAX_PERIOD_DAYS);
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let result = parse_config("[service]\npoll_interval_minutes = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_negative_epsilon() {
        let result = parse_config("[engine.trend]\nstable_epsilon_m_per_year = -0.5\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = parse_config("[engine\nperiod_days = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default("does/not/exist/gwres.toml")
            .expect("missing file should not be an error");
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_bundled_config_is_valid() {
        let config = load_config(concat!(env!("CARGO_MANIFEST_DIR"), "/gwres.toml"))
            .expect("bundled gwres.toml should load");
        assert_eq!(config.engine.period_days, 365);
    }
}
