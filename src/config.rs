use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::ClassifierConfig;
use crate::easy::EasyGateConfig;
use crate::error::ConfigError;
use crate::export::GaugeTable;
use crate::extractor::ExtractionConfig;
use crate::gating::{LoadGateConfig, WindowGateConfig};
use crate::import::StreamColumns;
use crate::logging::LogConfig;

/// Main analysis configuration
///
/// Every section falls back to its defaults, so a partial file only needs
/// the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Per-activity extraction: FTP fallback, NP window, zones, metadata synonyms
    pub extraction: ExtractionConfig,

    /// Stream CSV header synonyms
    pub stream_columns: StreamColumns,

    /// Easy-activity thresholds
    pub easy_gate: EasyGateConfig,

    /// Window sufficiency thresholds
    pub window_gate: WindowGateConfig,

    /// Weekly load thresholds
    pub load_gate: LoadGateConfig,

    /// Deviation and label thresholds
    pub classifier: ClassifierConfig,

    /// Exported gauges
    pub gauges: GaugeTable,

    /// Logging
    pub logging: LogConfig,
}

impl AnalysisConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::File {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        let config: AnalysisConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let file_error = |source| ConfigError::File {
            path: path.as_ref().to_path_buf(),
            source,
        };

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(file_error)?;
        }

        let toml_content = toml::to_string_pretty(self)?;
        fs::write(&path, toml_content).map_err(file_error)?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".strainrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %err,
                    "Config file not usable, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let extraction = &self.extraction;
        if !(extraction.default_ftp.is_finite() && extraction.default_ftp > 0.0) {
            return Err(invalid("extraction.default_ftp", "must be a positive number of watts"));
        }
        if extraction.rolling_window == 0 {
            return Err(invalid("extraction.rolling_window", "must be at least 1"));
        }
        let thresholds = &extraction.power_zone_thresholds;
        if thresholds.is_empty()
            || thresholds.iter().any(|t| !t.is_finite() || *t <= 0.0)
            || thresholds.windows(2).any(|pair| pair[0] >= pair[1])
        {
            return Err(invalid(
                "extraction.power_zone_thresholds",
                "must be positive and strictly increasing",
            ));
        }
        if self.classifier.likely_fatigue_days > self.classifier.accumulating_fatigue_days {
            return Err(invalid(
                "classifier.likely_fatigue_days",
                "must not exceed accumulating_fatigue_days",
            ));
        }
        if self.classifier.likely_fatigue_days < 2 {
            return Err(invalid("classifier.likely_fatigue_days", "must be at least 2"));
        }
        if self.stream_columns.time.is_empty() {
            return Err(invalid("stream_columns.time", "needs at least one column name"));
        }
        if self.window_gate.window_days == 0 {
            return Err(invalid("window_gate.window_days", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AnalysisConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AnalysisConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
        assert_eq!(deserialized.extraction.default_ftp, 218.0);
        assert_eq!(deserialized.load_gate.max_single_percent, 60.0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [extraction]
            default_ftp = 250.0

            [classifier]
            zscore_threshold = 1.5

            [stream_columns]
            watts = ["pwr"]
            "#,
        )
        .unwrap();

        assert_eq!(config.extraction.default_ftp, 250.0);
        assert_eq!(config.extraction.rolling_window, 30);
        assert_eq!(config.classifier.zscore_threshold, 1.5);
        assert_eq!(config.classifier.accumulating_fatigue_days, 3);
        assert_eq!(config.easy_gate, EasyGateConfig::default());
        assert_eq!(config.stream_columns.watts, vec!["pwr".to_string()]);
        assert_eq!(config.stream_columns.time, StreamColumns::default().time);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original_config = AnalysisConfig::default();
        original_config.window_gate.window_days = 14;
        original_config.extraction.synonyms.lthr.push("threshold_hr".to_string());

        original_config.save_to_file(&config_path).unwrap();
        let loaded_config = AnalysisConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded_config, original_config);
    }

    #[test]
    fn test_missing_file() {
        let err = AnalysisConfig::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = AnalysisConfig::default();
        assert!(config.validate().is_ok());

        config.extraction.power_zone_thresholds = vec![0.75, 0.55];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "extraction.power_zone_thresholds"
        ));

        let mut config = AnalysisConfig::default();
        config.extraction.default_ftp = 0.0;
        assert!(config.validate().is_err());
    }
}
