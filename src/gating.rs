//! Window-level gates: is there enough recent history, and is the weekly
//! load spread out enough for a deviation to mean anything?

use crate::easy::EasyActivityGate;
use crate::models::StrainMetrics;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const NO_RIDES_IN_WINDOW: &str = "no_rides_in_window";
pub const BAD_DATE_FORMAT: &str = "bad_date_format";
pub const NO_VALID_DATES: &str = "no_valid_dates";
const GAP_PREFIX: &str = "gap_of_";

/// Window sufficiency thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowGateConfig {
    /// Minimum activities in the window
    pub min_activities: usize,
    /// Minimum easy activities in the window
    pub min_easy_activities: usize,
    /// Day gaps above this are noted (never blocking)
    pub max_gap_days: i64,
    /// Default window length for date selection
    pub window_days: u32,
}

impl Default for WindowGateConfig {
    fn default() -> Self {
        Self {
            min_activities: 5,
            min_easy_activities: 2,
            max_gap_days: 3,
            window_days: 7,
        }
    }
}

/// Weekly load thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadGateConfig {
    /// Minimum activities with a known load
    pub min_with_load: usize,
    /// Largest share of weekly load one activity may carry, percent
    pub max_single_percent: f64,
}

impl Default for LoadGateConfig {
    fn default() -> Self {
        Self {
            min_with_load: 3,
            max_single_percent: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowGateResult {
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub total_activities: usize,
    pub easy_activities: usize,
}

impl WindowGateResult {
    /// Day-gap notes that did not block the window
    pub fn gap_notes(&self) -> impl Iterator<Item = &str> {
        self.reasons
            .iter()
            .map(String::as_str)
            .filter(|r| is_gap_note(r))
    }

    /// Reasons that made the window ineligible
    pub fn blocking_reasons(&self) -> impl Iterator<Item = &str> {
        self.reasons
            .iter()
            .map(String::as_str)
            .filter(|r| !is_gap_note(r))
    }
}

fn is_gap_note(reason: &str) -> bool {
    reason.starts_with(GAP_PREFIX)
}

#[derive(Debug, Clone, Default)]
pub struct WindowGate {
    config: WindowGateConfig,
    easy_gate: EasyActivityGate,
}

impl WindowGate {
    pub fn new(config: &WindowGateConfig, easy_gate: EasyActivityGate) -> Self {
        Self {
            config: config.clone(),
            easy_gate,
        }
    }

    pub fn evaluate(&self, activities: &[StrainMetrics]) -> WindowGateResult {
        if activities.is_empty() {
            return WindowGateResult {
                eligible: false,
                reasons: vec![NO_RIDES_IN_WINDOW.to_string()],
                total_activities: 0,
                easy_activities: 0,
            };
        }

        let mut reasons = Vec::new();
        let mut days = BTreeSet::new();
        let mut bad_dates = false;
        for activity in activities {
            match activity.calendar_date() {
                Some(Ok(day)) => {
                    days.insert(day);
                }
                Some(Err(_)) => bad_dates = true,
                None => {}
            }
        }

        if bad_dates {
            reasons.push(BAD_DATE_FORMAT.to_string());
        }
        if days.is_empty() {
            reasons.push(NO_VALID_DATES.to_string());
        }

        let days: Vec<NaiveDate> = days.into_iter().collect();
        for pair in days.windows(2) {
            let gap = (pair[1] - pair[0]).num_days();
            if gap > self.config.max_gap_days {
                reasons.push(format!("{}{}_days", GAP_PREFIX, gap));
            }
        }

        let total = activities.len();
        let easy = self.easy_gate.count_easy(activities);
        if total < self.config.min_activities {
            reasons.push(format!("only_{}_rides", total));
        }
        if easy < self.config.min_easy_activities {
            reasons.push(format!("only_{}_easy_rides", easy));
        }

        WindowGateResult {
            eligible: reasons.iter().all(|r| is_gap_note(r)),
            reasons,
            total_activities: total,
            easy_activities: easy,
        }
    }
}

/// Weekly load distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TssStats {
    pub total: f64,
    pub count: usize,
    pub max: f64,
    pub max_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadContextResult {
    pub reliable: bool,
    pub reasons: Vec<String>,
    pub tss_stats: TssStats,
}

#[derive(Debug, Clone, Default)]
pub struct LoadContextGate {
    config: LoadGateConfig,
}

impl LoadContextGate {
    pub fn new(config: &LoadGateConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn evaluate(&self, activities: &[StrainMetrics]) -> LoadContextResult {
        let loads: Vec<f64> = activities
            .iter()
            .filter_map(|activity| activity.tss)
            .filter(|tss| tss.is_finite())
            .collect();

        let total: f64 = loads.iter().sum();
        let max = loads.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let max_percent = if total > 0.0 { max / total * 100.0 } else { 0.0 };
        let tss_stats = TssStats {
            total,
            count: loads.len(),
            max,
            max_percent,
        };

        let mut reasons = Vec::new();
        if loads.len() < self.config.min_with_load {
            reasons.push(format!("only_{}_rides_with_tss", loads.len()));
        } else if max_percent > self.config.max_single_percent {
            reasons.push(format!(
                "single_ride_is_{}pct_of_weekly",
                max_percent.round() as i64
            ));
        }

        LoadContextResult {
            reliable: reasons.is_empty(),
            reasons,
            tss_stats,
        }
    }
}

/// Activities dated within the `days` ending on `end`, sorted by date
///
/// Activities with a missing or unparseable date are kept so the window
/// gate can report them.
pub fn select_window(activities: &[StrainMetrics], end: NaiveDate, days: u32) -> Vec<StrainMetrics> {
    let start = end
        .checked_sub_signed(Duration::days(i64::from(days.max(1)) - 1))
        .unwrap_or(NaiveDate::MIN);

    let mut selected: Vec<StrainMetrics> = activities
        .iter()
        .filter(|a| match a.calendar_date() {
            Some(Ok(day)) => day >= start && day <= end,
            _ => true,
        })
        .cloned()
        .collect();

    selected.sort_by_key(|a| a.calendar_date().and_then(Result::ok));
    selected
}
