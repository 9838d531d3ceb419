//! Resolution of vendor metadata hints through an ordered synonym table
//!
//! Vendors spell the same concept several ways (`icu_training_load`,
//! `training_load`, `icu_tss`, ...). Each concept has an ordered list of
//! candidate keys; the first candidate that holds a usable number wins.
//! Candidates that are present but unusable are reported, never dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Concepts that can be read from activity metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// Average or weighted average power, watts
    AveragePower,
    /// Power intensity relative to FTP, percent-scaled
    PowerIntensity,
    /// Intensity used to split an activity into hard/rest, percent-scaled
    SegmentIntensity,
    /// Training load for cycling fallback (TSS-like)
    RideLoad,
    /// Training load for running and strength work
    TrainingLoad,
    /// Lactate threshold heart rate, bpm
    Lthr,
    ElevationGain,
    ElevationLoss,
    Distance,
}

impl Hint {
    /// Hints whose values may arrive as percentages
    fn percent_scaled(&self) -> bool {
        matches!(self, Hint::PowerIntensity | Hint::SegmentIntensity)
    }
}

/// Ordered candidate keys for every hint concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynonymTable {
    pub average_power: Vec<String>,
    pub power_intensity: Vec<String>,
    pub segment_intensity: Vec<String>,
    pub ride_load: Vec<String>,
    pub training_load: Vec<String>,
    pub lthr: Vec<String>,
    pub elevation_gain: Vec<String>,
    pub elevation_loss: Vec<String>,
    pub distance: Vec<String>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self {
            average_power: keys(&[
                "icu_weighted_avg_watts",
                "icu_weighted_avg_power",
                "average_watts",
                "weighted_avg_watts",
                "average_power",
            ]),
            power_intensity: keys(&["icu_intensity", "icu_power_intensity", "intensity"]),
            segment_intensity: keys(&["icu_intensity", "intensity"]),
            ride_load: keys(&["icu_training_load", "training_load", "icu_tss"]),
            training_load: keys(&["icu_training_load", "training_load", "tss"]),
            lthr: keys(&["lthr", "icu_lthr", "lactate_threshold_hr"]),
            elevation_gain: keys(&["total_elevation_gain", "elevation_gain"]),
            elevation_loss: keys(&["total_elevation_loss", "elevation_loss"]),
            distance: keys(&["distance", "icu_distance"]),
        }
    }
}

impl SynonymTable {
    pub fn candidates(&self, hint: Hint) -> &[String] {
        match hint {
            Hint::AveragePower => &self.average_power,
            Hint::PowerIntensity => &self.power_intensity,
            Hint::SegmentIntensity => &self.segment_intensity,
            Hint::RideLoad => &self.ride_load,
            Hint::TrainingLoad => &self.training_load,
            Hint::Lthr => &self.lthr,
            Hint::ElevationGain => &self.elevation_gain,
            Hint::ElevationLoss => &self.elevation_loss,
            Hint::Distance => &self.distance,
        }
    }
}

/// Why a present hint value could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintIssue {
    NotNumeric { key: String },
    BadPercent { key: String },
}

impl HintIssue {
    /// Reason code recorded on the metrics record
    pub fn code(&self) -> String {
        match self {
            HintIssue::NotNumeric { key } => format!("hint_not_numeric:{}", key),
            HintIssue::BadPercent { key } => format!("hint_bad_percent:{}", key),
        }
    }
}

/// Resolves hints for one activity, collecting issues as it goes
pub struct HintResolver<'a> {
    table: &'a SynonymTable,
    hints: &'a BTreeMap<String, Value>,
    issues: Vec<HintIssue>,
}

impl<'a> HintResolver<'a> {
    pub fn new(table: &'a SynonymTable, hints: &'a BTreeMap<String, Value>) -> Self {
        Self {
            table,
            hints,
            issues: Vec::new(),
        }
    }

    /// First usable value among the hint's candidate keys
    pub fn resolve(&mut self, hint: Hint) -> Option<f64> {
        let percent = hint.percent_scaled();

        for key in self.table.candidates(hint) {
            let Some(value) = self.hints.get(key) else {
                continue;
            };
            match coerce(value, percent) {
                Coerced::Value(v) => return Some(v),
                Coerced::Absent => continue,
                Coerced::Issue(issue) => {
                    let issue = issue(key.clone());
                    if !self.issues.contains(&issue) {
                        self.issues.push(issue);
                    }
                }
            }
        }

        None
    }

    /// Issue codes gathered so far
    pub fn issue_codes(&self) -> Vec<String> {
        self.issues.iter().map(HintIssue::code).collect()
    }
}

enum Coerced {
    Value(f64),
    Absent,
    Issue(fn(String) -> HintIssue),
}

fn not_numeric(key: String) -> HintIssue {
    HintIssue::NotNumeric { key }
}

fn bad_percent(key: String) -> HintIssue {
    HintIssue::BadPercent { key }
}

fn coerce(value: &Value, percent: bool) -> Coerced {
    let number = match value {
        Value::Null => return Coerced::Absent,
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.contains('%') => {
            return match s.replace('%', "").trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Coerced::Value(if percent { v / 100.0 } else { v }),
                _ => Coerced::Issue(bad_percent),
            };
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number.filter(|v| v.is_finite()) {
        Some(v) if percent && v > 1.5 => Coerced::Value(v / 100.0),
        Some(v) => Coerced::Value(v),
        None => Coerced::Issue(not_numeric),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hints(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_first_candidate_wins() {
        let table = SynonymTable::default();
        let map = hints(&[("average_watts", json!(180)), ("icu_weighted_avg_watts", json!(190))]);
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::AveragePower), Some(190.0));
    }

    #[test]
    fn test_percent_scaling() {
        let table = SynonymTable::default();
        let map = hints(&[("icu_intensity", json!("59%"))]);
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::PowerIntensity), Some(0.59));

        let map = hints(&[("intensity", json!(72.0))]);
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::PowerIntensity), Some(0.72));

        let map = hints(&[("intensity", json!(0.8))]);
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::PowerIntensity), Some(0.8));
    }

    #[test]
    fn test_percent_sign_without_scaling() {
        let table = SynonymTable::default();
        let map = hints(&[("icu_training_load", json!("45%"))]);
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::RideLoad), Some(45.0));
    }

    #[test]
    fn test_unusable_values_are_reported_and_skipped() {
        let table = SynonymTable::default();
        let map = hints(&[
            ("icu_training_load", json!("n/a")),
            ("training_load", json!(null)),
            ("icu_tss", json!("62")),
        ]);
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::RideLoad), Some(62.0));
        assert_eq!(resolver.issue_codes(), vec!["hint_not_numeric:icu_training_load"]);
    }

    #[test]
    fn test_bad_percent_issue() {
        let table = SynonymTable::default();
        let map = hints(&[("icu_intensity", json!("abc%"))]);
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::PowerIntensity), None);
        assert_eq!(resolver.issue_codes(), vec!["hint_bad_percent:icu_intensity"]);
    }

    #[test]
    fn test_missing_everywhere() {
        let table = SynonymTable::default();
        let map = BTreeMap::new();
        let mut resolver = HintResolver::new(&table, &map);
        assert_eq!(resolver.resolve(Hint::Lthr), None);
        assert!(resolver.issue_codes().is_empty());
    }
}
