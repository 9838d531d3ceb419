use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Calendar date format used for activity dates throughout the pipeline
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Vendor timestamp format of `start_date_local`
const LOCAL_START_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One time-stamped row of an activity stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    /// Elapsed time in seconds; rows without it are dropped before analysis
    pub time_seconds: Option<f64>,

    /// Power output in watts
    pub watts: Option<f64>,

    /// Heart rate in beats per minute
    pub heartrate: Option<f64>,

    /// Cadence (rpm for cycling, spm for running)
    pub cadence: Option<f64>,

    /// Smoothed velocity in meters per second
    pub velocity: Option<f64>,
}

impl ActivitySample {
    /// Sample at the given elapsed time with every channel absent
    pub fn at(time_seconds: f64) -> Self {
        Self {
            time_seconds: Some(time_seconds),
            ..Self::default()
        }
    }

    pub fn with_watts(mut self, watts: f64) -> Self {
        self.watts = Some(watts);
        self
    }

    pub fn with_heartrate(mut self, heartrate: f64) -> Self {
        self.heartrate = Some(heartrate);
        self
    }

    pub fn with_cadence(mut self, cadence: f64) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

/// Activity types as reported by the fitness platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Ride,
    VirtualRide,
    Run,
    WeightTraining,
    Walk,
    Other(String),
}

impl ActivityType {
    /// Outdoor or indoor cycling
    pub fn is_cycling(&self) -> bool {
        matches!(self, ActivityType::Ride | ActivityType::VirtualRide)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Ride => "Ride",
            ActivityType::VirtualRide => "VirtualRide",
            ActivityType::Run => "Run",
            ActivityType::WeightTraining => "WeightTraining",
            ActivityType::Walk => "Walk",
            ActivityType::Other(name) => name,
        }
    }
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Other(String::new())
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Ride" => ActivityType::Ride,
            "VirtualRide" => ActivityType::VirtualRide,
            "Run" => ActivityType::Run,
            "WeightTraining" => ActivityType::WeightTraining,
            "Walk" => ActivityType::Walk,
            _ => ActivityType::Other(value),
        }
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-activity metadata as delivered by the fitness platform
///
/// Known fields are typed; everything else the vendor sends is kept in
/// `hints` and resolved through [`crate::hints::SynonymTable`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    /// Vendor activity identifier (string or number on the wire)
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    /// Activity type
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,

    /// Local start timestamp, `YYYY-MM-DDTHH:MM:SS`
    #[serde(default)]
    pub start_date_local: Option<String>,

    /// Explicit calendar date, takes precedence over `start_date_local`
    #[serde(default)]
    pub date: Option<String>,

    /// Functional threshold power for this activity, watts
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ftp: Option<f64>,

    /// Lactate threshold heart rate, bpm
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lthr: Option<f64>,

    /// Remaining vendor fields (load, intensity, elevation, ...)
    #[serde(flatten)]
    pub hints: BTreeMap<String, serde_json::Value>,
}

impl ActivityMetadata {
    pub fn new(activity_type: ActivityType, date: &str) -> Self {
        Self {
            activity_type,
            date: Some(date.to_string()),
            ..Self::default()
        }
    }

    pub fn with_ftp(mut self, ftp: f64) -> Self {
        self.ftp = Some(ftp);
        self
    }

    pub fn with_lthr(mut self, lthr: f64) -> Self {
        self.lthr = Some(lthr);
        self
    }

    pub fn with_hint(mut self, key: &str, value: serde_json::Value) -> Self {
        self.hints.insert(key.to_string(), value);
        self
    }

    /// Calendar date of the activity
    ///
    /// A `start_date_local` that does not parse is returned verbatim so the
    /// window gate can report it as `bad_date_format`.
    pub fn activity_date(&self) -> Option<String> {
        if let Some(date) = &self.date {
            return Some(date.clone());
        }

        let start = self.start_date_local.as_ref()?;
        match NaiveDateTime::parse_from_str(start, LOCAL_START_FORMAT) {
            Ok(dt) => Some(dt.format(DATE_FORMAT).to_string()),
            Err(_) => Some(start.clone()),
        }
    }
}

/// Which extraction path produced a metrics record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    /// Cycling with a full power stream
    PowerStream,
    /// Cycling without power; estimated from metadata and heart rate
    #[serde(rename = "rough_from_metadata_and_hr")]
    RoughFromMetadataAndHr,
    #[serde(rename = "running_from_hr_and_velocity")]
    RunningFromHrAndVelocity,
    #[serde(rename = "strength_from_training_load_and_hr")]
    StrengthFromTrainingLoadAndHr,
    /// Activity type without a dedicated path
    NotImplemented,
    /// Record supplied pre-computed by the caller
    #[default]
    Supplied,
}

impl EstimateMethod {
    /// Precision is reduced compared to a full power stream
    pub fn is_estimate(&self) -> bool {
        matches!(self, EstimateMethod::RoughFromMetadataAndHr)
    }
}

/// Normalized strain record for one activity
///
/// Every numeric field is independently optional: a missing input nulls
/// the outputs that depend on it and nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrainMetrics {
    pub activity_id: Option<String>,
    pub activity_type: ActivityType,

    /// Calendar date as supplied, `YYYY-MM-DD`
    pub date: Option<String>,

    pub estimate_method: EstimateMethod,

    /// Total elapsed time in seconds
    pub total_time: Option<f64>,

    /// Duration in minutes, used only when `total_time` is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_minutes: Option<f64>,

    pub avg_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,

    /// Second-half minus first-half mean heart rate
    pub hr_drift: Option<f64>,

    pub avg_power: Option<f64>,
    pub normalized_power: Option<f64>,
    pub intensity_factor: Option<f64>,
    pub tss: Option<f64>,

    /// Externally supplied training load (primary signal for strength work)
    pub training_load: Option<f64>,

    /// Average heart rate per watt of average power
    pub cardiac_cost: Option<f64>,

    pub zone_times: Option<BTreeMap<String, f64>>,
    pub zone_percentages: Option<BTreeMap<String, f64>>,
    pub pace_zone_times: Option<BTreeMap<String, f64>>,
    pub pace_zone_percentages: Option<BTreeMap<String, f64>>,
    pub segment_times: BTreeMap<String, f64>,
    pub segment_percentages: BTreeMap<String, f64>,

    pub avg_velocity: Option<f64>,
    pub max_velocity: Option<f64>,
    pub avg_cadence: Option<f64>,
    pub elevation_gain: Option<f64>,
    pub elevation_loss: Option<f64>,
    pub distance: Option<f64>,

    /// Whether the record carries a power-derived intensity usable for strain
    pub strain_applicable: bool,

    /// Metadata values that were present but could not be used
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hint_issues: Vec<String>,

    /// Raw heart-rate series, used for drift when `hr_drift` is absent
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub heartrate_series: Vec<f64>,
}

impl StrainMetrics {
    /// Parse the calendar date, `None` when no date was supplied
    pub fn calendar_date(&self) -> Option<Result<NaiveDate, chrono::ParseError>> {
        self.date
            .as_deref()
            .map(|date| NaiveDate::parse_from_str(date, DATE_FORMAT))
    }

    /// Value of one strain metric, deriving it from related fields when absent
    pub fn strain_value(&self, metric: StrainMetric) -> Option<f64> {
        match metric {
            StrainMetric::AvgHeartrate => self.avg_heartrate,
            StrainMetric::HrDrift => self
                .hr_drift
                .or_else(|| series_drift(&self.heartrate_series)),
            StrainMetric::CardiacCost => match (self.avg_heartrate, self.avg_power) {
                (Some(hr), Some(power)) if power > 0.0 => Some(hr / power),
                _ => self.cardiac_cost,
            },
            StrainMetric::Tss => self.tss,
        }
    }
}

/// Drift from a bare series split by row count
fn series_drift(series: &[f64]) -> Option<f64> {
    let values: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    if values.len() < 2 {
        return None;
    }

    let mid = values.len() / 2;
    let (first, second) = values.split_at(mid);
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    Some(mean(second) - mean(first))
}

/// Metrics tracked in band baselines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrainMetric {
    AvgHeartrate,
    HrDrift,
    CardiacCost,
    Tss,
}

impl StrainMetric {
    pub const ALL: [StrainMetric; 4] = [
        StrainMetric::AvgHeartrate,
        StrainMetric::HrDrift,
        StrainMetric::CardiacCost,
        StrainMetric::Tss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrainMetric::AvgHeartrate => "avg_heartrate",
            StrainMetric::HrDrift => "hr_drift",
            StrainMetric::CardiacCost => "cardiac_cost",
            StrainMetric::Tss => "tss",
        }
    }
}

impl fmt::Display for StrainMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept string or numeric identifiers
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept numbers and numeric strings, anything else reads as absent
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity_type_serialization() {
        let json = serde_json::to_string(&ActivityType::VirtualRide).unwrap();
        assert_eq!(json, "\"VirtualRide\"");

        let parsed: ActivityType = serde_json::from_str("\"Hike\"").unwrap();
        assert_eq!(parsed, ActivityType::Other("Hike".to_string()));
        assert!(!parsed.is_cycling());
        assert!(ActivityType::Ride.is_cycling());
    }

    #[test]
    fn test_metadata_from_vendor_json() {
        let raw = json!({
            "id": 12345,
            "type": "Ride",
            "start_date_local": "2024-03-02T07:15:00",
            "ftp": "250",
            "lthr": null,
            "icu_training_load": 55,
            "icu_intensity": "61%"
        });

        let metadata: ActivityMetadata = serde_json::from_value(raw).unwrap();
        assert_eq!(metadata.id.as_deref(), Some("12345"));
        assert_eq!(metadata.activity_type, ActivityType::Ride);
        assert_eq!(metadata.ftp, Some(250.0));
        assert_eq!(metadata.lthr, None);
        assert_eq!(metadata.activity_date().as_deref(), Some("2024-03-02"));
        assert_eq!(metadata.hints.get("icu_training_load"), Some(&json!(55)));
        assert!(metadata.hints.contains_key("icu_intensity"));
    }

    #[test]
    fn test_unparseable_start_date_is_kept_verbatim() {
        let metadata = ActivityMetadata {
            start_date_local: Some("03/02/2024".to_string()),
            ..ActivityMetadata::default()
        };
        assert_eq!(metadata.activity_date().as_deref(), Some("03/02/2024"));
    }

    #[test]
    fn test_partial_strain_record_deserializes() {
        let metrics: StrainMetrics = serde_json::from_value(json!({
            "date": "2024-01-05",
            "intensity_factor": 0.55,
            "total_minutes": 75
        }))
        .unwrap();

        assert_eq!(metrics.intensity_factor, Some(0.55));
        assert_eq!(metrics.total_minutes, Some(75.0));
        assert_eq!(metrics.estimate_method, EstimateMethod::Supplied);
        assert_eq!(
            metrics.calendar_date().unwrap().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }

    #[test]
    fn test_strain_value_derivations() {
        let metrics = StrainMetrics {
            avg_heartrate: Some(130.0),
            avg_power: Some(200.0),
            heartrate_series: vec![120.0, 122.0, 130.0, 132.0],
            ..StrainMetrics::default()
        };

        assert_eq!(metrics.strain_value(StrainMetric::CardiacCost), Some(0.65));
        assert_eq!(metrics.strain_value(StrainMetric::HrDrift), Some(10.0));
        assert_eq!(metrics.strain_value(StrainMetric::Tss), None);
    }

    #[test]
    fn test_cardiac_cost_needs_positive_power() {
        let metrics = StrainMetrics {
            avg_heartrate: Some(130.0),
            avg_power: Some(0.0),
            ..StrainMetrics::default()
        };
        assert_eq!(metrics.strain_value(StrainMetric::CardiacCost), None);
    }

    #[test]
    fn test_estimate_method_tags() {
        let json = serde_json::to_string(&EstimateMethod::RoughFromMetadataAndHr).unwrap();
        assert_eq!(json, "\"rough_from_metadata_and_hr\"");
        assert!(EstimateMethod::RoughFromMetadataAndHr.is_estimate());
        assert!(!EstimateMethod::PowerStream.is_estimate());
    }
}
