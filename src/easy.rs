//! Easy-activity eligibility
//!
//! An activity is easy when it is long enough, mostly spent in the two
//! lowest zones and below the IF ceiling. Every failed check adds a reason
//! code; checks never short-circuit.

use crate::models::StrainMetrics;
use serde::{Deserialize, Serialize};

pub const MISSING_IF: &str = "missing_if";
pub const INVALID_IF: &str = "invalid_if";
pub const MISSING_DURATION: &str = "missing_duration";
pub const SHORT_DURATION: &str = "short_duration";
pub const MISSING_ZONES: &str = "missing_zones";
pub const INSUFFICIENT_TIME_IN_Z2: &str = "insufficient_time_in_z2";
pub const IF_TOO_HIGH: &str = "if_too_high";

/// Reasons that make an activity ineligible
const BLOCKING: [&str; 5] = [
    MISSING_IF,
    SHORT_DURATION,
    MISSING_ZONES,
    INSUFFICIENT_TIME_IN_Z2,
    IF_TOO_HIGH,
];

/// Easy-activity thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EasyGateConfig {
    /// Minimum duration, minutes
    pub min_duration_minutes: f64,
    /// Minimum share of time in Z1+Z2, percent
    pub min_low_zone_percent: f64,
    /// IF at or above this is too hard to be easy
    pub max_intensity_factor: f64,
}

impl Default for EasyGateConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 60.0,
            min_low_zone_percent: 60.0,
            max_intensity_factor: 0.65,
        }
    }
}

/// Outcome of the easy check for one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EasyVerdict {
    pub is_easy: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EasyActivityGate {
    config: EasyGateConfig,
}

impl EasyActivityGate {
    pub fn new(config: &EasyGateConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn is_easy(&self, metrics: &StrainMetrics) -> EasyVerdict {
        let mut reasons: Vec<&str> = Vec::new();

        match metrics.intensity_factor {
            None => reasons.push(MISSING_IF),
            Some(f) if !f.is_finite() => reasons.push(INVALID_IF),
            Some(_) => {}
        }

        let seconds = match (metrics.total_time, metrics.total_minutes) {
            (Some(seconds), _) => seconds,
            (None, Some(minutes)) => minutes * 60.0,
            (None, None) => {
                reasons.push(MISSING_DURATION);
                0.0
            }
        };
        if seconds.is_nan() || seconds / 60.0 < self.config.min_duration_minutes {
            reasons.push(SHORT_DURATION);
        }

        let zones = metrics
            .zone_percentages
            .as_ref()
            .filter(|zones| !zones.is_empty())
            .or(metrics.pace_zone_percentages.as_ref().filter(|zones| !zones.is_empty()));

        let low_zone_share = match zones {
            Some(zones) => {
                let share: f64 = ["Z1", "Z2"]
                    .iter()
                    .filter_map(|zone| zones.get(*zone))
                    .filter(|v| v.is_finite())
                    .sum();
                Some(if share <= 1.0 { share * 100.0 } else { share })
            }
            None => {
                reasons.push(MISSING_ZONES);
                None
            }
        };
        if low_zone_share.map_or(true, |share| share < self.config.min_low_zone_percent) {
            reasons.push(INSUFFICIENT_TIME_IN_Z2);
        }

        if let Some(f) = metrics.intensity_factor {
            if f >= self.config.max_intensity_factor {
                reasons.push(IF_TOO_HIGH);
            }
        }

        EasyVerdict {
            is_easy: !reasons.iter().any(|r| BLOCKING.contains(r)),
            reasons: reasons.into_iter().map(String::from).collect(),
        }
    }

    /// Count of easy activities in a window
    pub fn count_easy(&self, activities: &[StrainMetrics]) -> usize {
        activities.iter().filter(|a| self.is_easy(a).is_easy).count()
    }
}
