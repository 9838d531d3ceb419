//! Unified error hierarchy for strainrs
//!
//! Per-activity field problems never surface here: they degrade to `None`
//! metrics or reason codes. These errors cover the few structural failures
//! (no time axis, unreadable files, bad configuration).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all strainrs operations
#[derive(Debug, Error)]
pub enum StrainError {
    /// Activity extraction errors
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Activity directory / stream import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structural failures while turning one activity into strain metrics
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No sample carries a usable time value
    #[error("No usable time axis in {samples} samples")]
    MissingTimeAxis { samples: usize },
}

/// Activity directory import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// Directory does not exist or is not a directory
    #[error("Not an activity directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Metadata file could not be parsed
    #[error("Invalid metadata in {path}: {reason}")]
    InvalidMetadata { path: PathBuf, reason: String },

    /// Stream CSV could not be read
    #[error("Invalid stream file {path}: {reason}")]
    InvalidStream { path: PathBuf, reason: String },

    /// Stream CSV has no time column
    #[error("Stream file {path} has no time column")]
    MissingTimeColumn { path: PathBuf },
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Config file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML could not be produced
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of its valid range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type alias for strainrs operations
pub type Result<T> = std::result::Result<T, StrainError>;

impl StrainError {
    /// Whether the caller should skip this activity and keep processing the window
    pub fn is_per_activity(&self) -> bool {
        matches!(
            self,
            StrainError::Extraction(_)
                | StrainError::Import(ImportError::InvalidMetadata { .. })
                | StrainError::Import(ImportError::InvalidStream { .. })
                | StrainError::Import(ImportError::MissingTimeColumn { .. })
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StrainError::Extraction(_) => ErrorSeverity::Warning,
            StrainError::Import(ImportError::NotADirectory { .. }) => ErrorSeverity::Error,
            StrainError::Import(_) => ErrorSeverity::Warning,
            StrainError::Config(_) => ErrorSeverity::Error,
            StrainError::Io(_) => ErrorSeverity::Error,
            StrainError::Serialization(_) => ErrorSeverity::Critical,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            StrainError::Extraction(ExtractionError::MissingTimeAxis { .. }) => {
                "Activity has no time stream and was skipped.".to_string()
            }
            StrainError::Import(ImportError::NotADirectory { path }) => {
                format!("Could not find activity directory: {}", path.display())
            }
            StrainError::Config(ConfigError::Parse(_)) => {
                "Configuration file is not valid TOML. Run `strainrs config --init` to regenerate it."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Unexpected internal failure
    Critical,
    /// Operation cannot continue
    Error,
    /// Activity skipped, window continues
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
