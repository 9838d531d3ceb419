//! Plain-text strain report
//!
//! Output depends only on the classification, baseline and activities
//! passed in; the same inputs always render the same bytes.

use crate::baseline::BaselineStats;
use crate::classifier::{Classification, FatigueLabel};
use crate::models::{StrainMetric, StrainMetrics};
use std::fmt::{self, Write};

const RULE_WIDTH: usize = 50;

pub const DISCLAIMER: &str = "This compares easy activities against your own recent baseline. \
It is not a medical assessment.";

pub struct SummaryRenderer;

impl SummaryRenderer {
    pub fn render(
        classification: &Classification,
        baseline: &BaselineStats,
        activities: &[StrainMetrics],
    ) -> String {
        let mut out = String::new();
        write_report(&mut out, classification, baseline, activities)
            .map(|()| out)
            .unwrap_or_default()
    }
}

fn write_report(
    out: &mut String,
    classification: &Classification,
    baseline: &BaselineStats,
    activities: &[StrainMetrics],
) -> fmt::Result {
    writeln!(out, "{:=<width$}", "", width = RULE_WIDTH)?;
    writeln!(out, "EASY-RIDE STRAIN SUMMARY")?;
    writeln!(out, "{:=<width$}", "", width = RULE_WIDTH)?;

    let mut dates: Vec<_> = activities
        .iter()
        .filter_map(|a| a.calendar_date().and_then(Result::ok))
        .collect();
    dates.sort();
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => writeln!(out, "Window: {} to {}", first, last)?,
        _ => writeln!(out, "Window: no dated activities")?,
    }
    writeln!(out)?;

    let window = &classification.window_gate;
    if !window.eligible {
        writeln!(out, "Not enough recent history to judge strain:")?;
        for reason in window.blocking_reasons() {
            writeln!(out, "  - {}", reason)?;
        }
        writeln!(out)?;
        writeln!(out, "{}", DISCLAIMER)?;
        return Ok(());
    }

    let load = &classification.load_context;
    if !load.reliable {
        writeln!(out, "Weekly load is too uneven to judge strain:")?;
        for reason in &load.reasons {
            writeln!(out, "  - {}", reason)?;
        }
        writeln!(out)?;
        writeln!(out, "{}", DISCLAIMER)?;
        return Ok(());
    }

    writeln!(out, "Assessment: {}", classification.label)?;
    writeln!(out, "{}", narrative(classification))?;
    if !classification.reasons.is_empty() {
        writeln!(out, "Reasons:")?;
        for reason in &classification.reasons {
            writeln!(out, "  - {}", reason)?;
        }
    }
    writeln!(out)?;

    writeln!(out, "Flagged strain:")?;
    if classification.strain_flags.is_empty() {
        writeln!(out, "  none")?;
    }
    for flag in &classification.strain_flags {
        writeln!(
            out,
            "  {:<10}  {:<13}  z={:+.2}",
            flag.date.as_deref().unwrap_or("undated"),
            flag.metric.as_str(),
            flag.zscore
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Context")?;
    writeln!(out, "{:-<width$}", "", width = RULE_WIDTH)?;
    writeln!(
        out,
        "Activities: {} (easy: {})",
        window.total_activities, window.easy_activities
    )?;
    writeln!(
        out,
        "Weekly TSS: {:.1} (largest single activity {:.0}%)",
        load.tss_stats.total, load.tss_stats.max_percent
    )?;

    let notes: Vec<&str> = window.gap_notes().collect();
    if !notes.is_empty() {
        writeln!(out, "Window notes: {}", notes.join(", "))?;
    }

    let heart_rates: Vec<_> = baseline
        .iter()
        .filter_map(|(band, stats)| {
            let hr = stats.get(&StrainMetric::AvgHeartrate)?;
            hr.mean.map(|mean| (band, mean, hr.count))
        })
        .collect();
    if !heart_rates.is_empty() {
        writeln!(out, "Mean HR by band:")?;
        for (band, mean, count) in heart_rates {
            writeln!(out, "  {}: {:.1} bpm (n={})", band, mean, count)?;
        }
    }
    writeln!(out)?;

    writeln!(out, "{}", DISCLAIMER)?;
    Ok(())
}

fn narrative(classification: &Classification) -> String {
    let days = classification.flagged_rides;
    match classification.label {
        FatigueLabel::NeutralNoisy => {
            "No consistent signal: strain on easy activities is within normal variation.".to_string()
        }
        FatigueLabel::AbsorbingWell => {
            "Easy activities cost less than usual. Training appears well absorbed.".to_string()
        }
        FatigueLabel::NonTrainingFatigueLikely => format!(
            "Easy activities on {} separate days cost more than usual. \
             Stress outside training (illness, sleep, life load) may be contributing.",
            days
        ),
        FatigueLabel::FatigueAccumulating => format!(
            "Easy activities on {} separate days cost more than usual. \
             Fatigue appears to be accumulating.",
            days
        ),
    }
}
