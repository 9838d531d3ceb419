//! Conservative window classification
//!
//! Each stage can only veto. A fatigue label is emitted only when the
//! window, the load spread and the baseline are all usable and several
//! distinct days show elevated strain on easy activities.

use crate::baseline::{BaselineBuilder, BaselineStats, DeviationComparator};
use crate::easy::EasyActivityGate;
use crate::gating::{LoadContextGate, LoadContextResult, WindowGate, WindowGateResult};
use crate::models::{StrainMetric, StrainMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

pub const SINGLE_FLAGGED_RIDE: &str = "single_flagged_ride";
pub const NO_ELEVATED_STRAIN: &str = "no_elevated_strain_on_easy_rides";
pub const NO_ELIGIBLE_BANDS: &str = "no_eligible_bands_in_baseline";
pub const NO_EASY_RIDES: &str = "no_easy_rides_to_evaluate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueLabel {
    NeutralNoisy,
    /// Defined for reporting; the staged rules never produce it
    AbsorbingWell,
    NonTrainingFatigueLikely,
    FatigueAccumulating,
}

impl FatigueLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueLabel::NeutralNoisy => "neutral_noisy",
            FatigueLabel::AbsorbingWell => "absorbing_well",
            FatigueLabel::NonTrainingFatigueLikely => "non_training_fatigue_likely",
            FatigueLabel::FatigueAccumulating => "fatigue_accumulating",
        }
    }
}

impl fmt::Display for FatigueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// z-scores strictly above this flag a metric
    pub zscore_threshold: f64,
    /// Flagged days for `non_training_fatigue_likely`
    pub likely_fatigue_days: usize,
    /// Flagged days for `fatigue_accumulating`
    pub accumulating_fatigue_days: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            zscore_threshold: 1.0,
            likely_fatigue_days: 2,
            accumulating_fatigue_days: 3,
        }
    }
}

/// One metric of one easy activity above the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrainFlag {
    pub date: Option<String>,
    pub metric: StrainMetric,
    pub zscore: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: FatigueLabel,
    pub reasons: Vec<String>,
    pub window_gate: WindowGateResult,
    pub load_context: LoadContextResult,
    pub strain_flags: Vec<StrainFlag>,
    /// Distinct dates carrying at least one flag
    pub flagged_rides: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FatigueClassifier {
    config: ClassifierConfig,
    easy_gate: EasyActivityGate,
    window_gate: WindowGate,
    load_gate: LoadContextGate,
}

impl FatigueClassifier {
    pub fn new(
        config: &ClassifierConfig,
        easy_gate: EasyActivityGate,
        window_gate: WindowGate,
        load_gate: LoadContextGate,
    ) -> Self {
        Self {
            config: config.clone(),
            easy_gate,
            window_gate,
            load_gate,
        }
    }

    pub fn classify(&self, activities: &[StrainMetrics]) -> Classification {
        let baseline = BaselineBuilder::build(activities);
        self.classify_with_baseline(activities, &baseline)
    }

    /// Classify against an already built baseline
    pub fn classify_with_baseline(
        &self,
        activities: &[StrainMetrics],
        baseline: &BaselineStats,
    ) -> Classification {
        let window_gate = self.window_gate.evaluate(activities);
        let load_context = self.load_gate.evaluate(activities);

        let mut result = Classification {
            label: FatigueLabel::NeutralNoisy,
            reasons: Vec::new(),
            window_gate,
            load_context,
            strain_flags: Vec::new(),
            flagged_rides: 0,
        };

        if !result.window_gate.eligible {
            result.reasons = result.window_gate.reasons.clone();
            return finish(result);
        }
        if !result.load_context.reliable {
            result.reasons = result.load_context.reasons.clone();
            return finish(result);
        }
        if baseline.is_empty() {
            result.reasons.push(NO_ELIGIBLE_BANDS.to_string());
            return finish(result);
        }

        let easy: Vec<&StrainMetrics> = activities
            .iter()
            .filter(|a| self.easy_gate.is_easy(a).is_easy)
            .collect();
        if easy.is_empty() {
            result.reasons.push(NO_EASY_RIDES.to_string());
            return finish(result);
        }

        for activity in easy {
            let deviation = DeviationComparator::compare(activity, baseline);
            let Some(comparison) = deviation.comparison else {
                continue;
            };
            for (metric, entry) in comparison {
                if let Some(zscore) = entry.zscore.filter(|z| *z > self.config.zscore_threshold) {
                    result.strain_flags.push(StrainFlag {
                        date: activity.date.clone(),
                        metric,
                        zscore,
                    });
                }
            }
        }

        result.flagged_rides = result
            .strain_flags
            .iter()
            .map(|flag| flag.date.as_deref())
            .collect::<BTreeSet<_>>()
            .len();

        let flagged = result.flagged_rides;
        if flagged >= self.config.accumulating_fatigue_days {
            result.label = FatigueLabel::FatigueAccumulating;
        } else if flagged >= self.config.likely_fatigue_days {
            result.label = FatigueLabel::NonTrainingFatigueLikely;
        } else if flagged == 1 {
            result.reasons.push(SINGLE_FLAGGED_RIDE.to_string());
        } else {
            result.reasons.push(NO_ELEVATED_STRAIN.to_string());
        }

        finish(result)
    }
}

fn finish(result: Classification) -> Classification {
    debug!(
        flags = result.strain_flags.len(),
        reasons = ?result.reasons,
        "Classification stages complete"
    );
    info!(
        label = %result.label,
        flagged_rides = result.flagged_rides,
        total = result.window_gate.total_activities,
        easy = result.window_gate.easy_activities,
        "Window classified"
    );
    result
}
