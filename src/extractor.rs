//! Per-activity strain extraction
//!
//! Picks the extraction path from the activity type and the streams that
//! are actually present, then fills the fields common to every path.

use crate::error::ExtractionError;
use crate::hints::{Hint, HintResolver, SynonymTable};
use crate::models::{ActivityMetadata, ActivitySample, ActivityType, EstimateMethod, StrainMetrics};
use crate::streams::{quantile, Channel, PreparedStream};
use crate::{power, running, strength};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// FTP used when the activity metadata carries none, watts
    pub default_ftp: f64,

    /// Rows in the rolling window used for normalized power (~1 Hz data)
    pub rolling_window: usize,

    /// Upper bounds of power zones Z1..Z5 as fractions of FTP; Z6 is open-ended
    pub power_zone_thresholds: Vec<f64>,

    /// Candidate metadata keys per hint concept
    pub synonyms: SynonymTable,
}

impl ExtractionConfig {
    /// Full power zone edges, `[0, thresholds.., inf)`
    pub fn power_zone_edges(&self) -> Vec<f64> {
        let mut edges = Vec::with_capacity(self.power_zone_thresholds.len() + 2);
        edges.push(0.0);
        edges.extend(self.power_zone_thresholds.iter().copied());
        edges.push(f64::INFINITY);
        edges
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_ftp: 218.0,
            rolling_window: 30,
            power_zone_thresholds: vec![0.55, 0.75, 0.90, 1.05, 1.20],
            synonyms: SynonymTable::default(),
        }
    }
}

/// Everything an extraction path reads
pub(crate) struct PathInput<'a> {
    pub stream: &'a PreparedStream,
    pub metadata: &'a ActivityMetadata,
    pub ftp: Option<f64>,
    pub rolling_window: usize,
    pub power_zone_edges: Vec<f64>,
}

impl PathInput<'_> {
    /// LTHR from the typed field, else from metadata hints
    pub fn lthr(&self, hints: &mut HintResolver<'_>) -> Option<f64> {
        self.metadata
            .lthr
            .filter(|l| *l > 0.0)
            .or_else(|| hints.resolve(Hint::Lthr).filter(|l| *l > 0.0))
    }
}

/// Time below, between (inclusive) and above two heart-rate bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HeartRateSplit {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

/// Split time by heart rate, using LTHR fractions or stream percentiles
pub(crate) fn split_by_heartrate(
    stream: &PreparedStream,
    lthr: Option<f64>,
    lthr_fractions: (f64, f64),
    percentiles: (f64, f64),
) -> HeartRateSplit {
    let hr = stream.values_or_zero(Channel::Heartrate);
    let (lower, upper) = match lthr {
        Some(lthr) => (lthr_fractions.0 * lthr, lthr_fractions.1 * lthr),
        None => (
            quantile(&hr, percentiles.0).unwrap_or(0.0),
            quantile(&hr, percentiles.1).unwrap_or(0.0),
        ),
    };

    HeartRateSplit {
        low: stream.time_where(|i| hr[i] < lower),
        mid: stream.time_where(|i| hr[i] >= lower && hr[i] <= upper),
        high: stream.time_where(|i| hr[i] > upper),
    }
}

/// Converts raw activity streams into strain metrics
#[derive(Debug, Clone, Default)]
pub struct StrainExtractor {
    config: ExtractionConfig,
}

impl StrainExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract strain metrics for one activity
    ///
    /// Missing channels or metadata only null the dependent outputs. The
    /// only failure is a stream without any usable time value.
    pub fn extract(
        &self,
        samples: &[ActivitySample],
        metadata: &ActivityMetadata,
    ) -> Result<StrainMetrics, ExtractionError> {
        let stream = PreparedStream::prepare(samples)?;
        let mut hints = HintResolver::new(&self.config.synonyms, &metadata.hints);

        let ftp = metadata
            .ftp
            .filter(|f| *f > 0.0)
            .or(Some(self.config.default_ftp))
            .filter(|f| *f > 0.0);

        let input = PathInput {
            stream: &stream,
            metadata,
            ftp,
            rolling_window: self.config.rolling_window,
            power_zone_edges: self.config.power_zone_edges(),
        };

        let (avg_heartrate, max_heartrate) = stream.mean_and_max(Channel::Heartrate);
        let mut metrics = StrainMetrics {
            activity_id: metadata.id.clone(),
            activity_type: metadata.activity_type.clone(),
            date: metadata.activity_date(),
            total_time: Some(stream.total_time()),
            avg_heartrate,
            max_heartrate,
            hr_drift: stream.hr_drift(),
            ..StrainMetrics::default()
        };

        match &metadata.activity_type {
            t if t.is_cycling() && stream.has(Channel::Watts) => {
                power::stream_metrics(&input, &mut metrics);
            }
            t if t.is_cycling() => {
                power::metadata_estimate(&input, &mut hints, &mut metrics);
            }
            ActivityType::Run => running::running_metrics(&input, &mut hints, &mut metrics),
            ActivityType::WeightTraining => {
                strength::strength_metrics(&input, &mut hints, &mut metrics)
            }
            _ => metrics.estimate_method = EstimateMethod::NotImplemented,
        }

        metrics.segment_percentages = stream.percentages(&metrics.segment_times);
        metrics.cardiac_cost = match (metrics.avg_heartrate, metrics.avg_power) {
            (Some(hr), Some(power)) if power > 0.0 => Some(hr / power),
            _ => None,
        };
        metrics.strain_applicable =
            metadata.activity_type.is_cycling() && metrics.intensity_factor.is_some();
        metrics.hint_issues = hints.issue_codes();

        debug!(
            activity = ?metrics.activity_id,
            activity_type = %metrics.activity_type,
            method = ?metrics.estimate_method,
            rows = stream.len(),
            total_time = stream.total_time(),
            intensity_factor = ?metrics.intensity_factor,
            "Extracted strain metrics"
        );

        Ok(metrics)
    }
}
