// Library interface for strainrs modules
// The binary and the integration tests both go through these exports

pub mod bands;
pub mod baseline;
pub mod classifier;
pub mod config;
pub mod easy;
pub mod error;
pub mod export;
pub mod extractor;
pub mod gating;
pub mod hints;
pub mod import;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod power;
pub mod running;
pub mod streams;
pub mod strength;
pub mod summary;

// Re-export commonly used types for convenience
pub use models::*;
pub use bands::IntensityBand;
pub use baseline::{BaselineBuilder, BaselineStats, DeviationComparator, DeviationResult};
pub use classifier::{Classification, FatigueClassifier, FatigueLabel};
pub use config::AnalysisConfig;
pub use easy::EasyActivityGate;
pub use extractor::{ExtractionConfig, StrainExtractor};
pub use gating::{LoadContextGate, WindowGate};
pub use import::ActivityLoader;
pub use pipeline::{assess_window, select_window, WindowAssessment};
pub use summary::SummaryRenderer;
pub use error::{Result, StrainError};
pub use logging::{LogConfig, LogFormat, LogLevel};
