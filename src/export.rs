//! Output formats: gauge exposition text, JSON and a flat CSV of metrics

use crate::error::{Result, StrainError};
use crate::models::StrainMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::io;

/// One exported gauge: which metrics field feeds it, its name and help text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugeEntry {
    pub field: String,
    pub name: String,
    pub help: String,
}

impl GaugeEntry {
    fn new(field: &str, name: &str, help: &str) -> Self {
        Self {
            field: field.to_string(),
            name: name.to_string(),
            help: help.to_string(),
        }
    }
}

/// Gauges to export, in output order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugeTable {
    pub entries: Vec<GaugeEntry>,
}

impl Default for GaugeTable {
    fn default() -> Self {
        Self {
            entries: vec![
                GaugeEntry::new("total_time", "strain_total_time_seconds", "Activity duration"),
                GaugeEntry::new("avg_heartrate", "strain_avg_heartrate_bpm", "Average heart rate"),
                GaugeEntry::new("max_heartrate", "strain_max_heartrate_bpm", "Max heart rate"),
                GaugeEntry::new("hr_drift", "strain_hr_drift_bpm", "Second-half minus first-half heart rate"),
                GaugeEntry::new("avg_power", "strain_avg_power_watts", "Average power"),
                GaugeEntry::new("normalized_power", "strain_normalized_power_watts", "Normalized power"),
                GaugeEntry::new("intensity_factor", "strain_intensity_factor", "Normalized power over FTP"),
                GaugeEntry::new("tss", "strain_tss", "Training stress score"),
                GaugeEntry::new("training_load", "strain_training_load", "Vendor training load"),
                GaugeEntry::new("cardiac_cost", "strain_cardiac_cost", "Heart beats per watt"),
            ],
        }
    }
}

/// One labeled gauge value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeSample {
    pub name: String,
    pub activity_type: String,
    pub date: String,
    pub value: f64,
}

/// Samples for the table's fields that are present on `metrics`
///
/// Fields are looked up by their serialized name; absent, null or
/// non-numeric fields produce no sample.
pub fn gauge_samples(table: &GaugeTable, metrics: &StrainMetrics) -> Result<Vec<GaugeSample>> {
    let record = serde_json::to_value(metrics)?;

    Ok(table
        .entries
        .iter()
        .filter_map(|entry| {
            let value = record.get(&entry.field)?.as_f64()?;
            value.is_finite().then(|| GaugeSample {
                name: entry.name.clone(),
                activity_type: metrics.activity_type.to_string(),
                date: metrics.date.clone().unwrap_or_default(),
                value,
            })
        })
        .collect())
}

/// Prometheus text exposition for a set of activities
pub fn render_exposition(table: &GaugeTable, activities: &[StrainMetrics]) -> Result<String> {
    let mut by_name: BTreeMap<String, Vec<GaugeSample>> = BTreeMap::new();
    for activity in activities {
        for sample in gauge_samples(table, activity)? {
            by_name.entry(sample.name.clone()).or_default().push(sample);
        }
    }

    let mut out = String::new();
    write_exposition(&mut out, table, &by_name)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    Ok(out)
}

fn write_exposition(
    out: &mut String,
    table: &GaugeTable,
    by_name: &BTreeMap<String, Vec<GaugeSample>>,
) -> fmt::Result {
    for entry in &table.entries {
        let Some(samples) = by_name.get(&entry.name) else {
            continue;
        };
        writeln!(out, "# HELP {} {}", entry.name, escape_help(&entry.help))?;
        writeln!(out, "# TYPE {} gauge", entry.name)?;
        for sample in samples {
            writeln!(
                out,
                "{}{{activity_type=\"{}\",date=\"{}\"}} {}",
                sample.name,
                escape_label(&sample.activity_type),
                escape_label(&sample.date),
                sample.value
            )?;
        }
    }
    Ok(())
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Pretty JSON for any serializable result
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(StrainError::from)
}

#[derive(Serialize)]
struct MetricsRow<'a> {
    activity_id: &'a str,
    date: &'a str,
    activity_type: &'a str,
    estimate_method: String,
    total_time: Option<f64>,
    avg_heartrate: Option<f64>,
    hr_drift: Option<f64>,
    avg_power: Option<f64>,
    normalized_power: Option<f64>,
    intensity_factor: Option<f64>,
    tss: Option<f64>,
    training_load: Option<f64>,
    cardiac_cost: Option<f64>,
}

/// One CSV row per activity with the headline metrics
pub fn write_metrics_csv<W: io::Write>(writer: W, activities: &[StrainMetrics]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for metrics in activities {
        let estimate_method = serde_json::to_value(metrics.estimate_method)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let row = MetricsRow {
            activity_id: metrics.activity_id.as_deref().unwrap_or_default(),
            date: metrics.date.as_deref().unwrap_or_default(),
            activity_type: metrics.activity_type.as_str(),
            estimate_method,
            total_time: metrics.total_time,
            avg_heartrate: metrics.avg_heartrate,
            hr_drift: metrics.hr_drift,
            avg_power: metrics.avg_power,
            normalized_power: metrics.normalized_power,
            intensity_factor: metrics.intensity_factor,
            tss: metrics.tss,
            training_load: metrics.training_load,
            cardiac_cost: metrics.cardiac_cost,
        };
        csv_writer.serialize(row).map_err(io::Error::from)?;
    }
    csv_writer.flush()?;
    Ok(())
}
