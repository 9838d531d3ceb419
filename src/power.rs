//! Cycling strain from power streams, with a metadata fallback
//!
//! With a watts stream the activity gets the full treatment: normalized
//! power, intensity factor, TSS, power zones and rest/hard/drafting
//! segments. Without one, power is estimated from vendor metadata and the
//! activity is split by heart rate instead.

use crate::extractor::{split_by_heartrate, PathInput};
use crate::hints::{Hint, HintResolver};
use crate::models::{EstimateMethod, StrainMetrics};
use crate::streams::{bin_index, quantile, rolling_mean, Channel, PreparedStream};
use std::collections::BTreeMap;

/// Cadence below which a low-power row counts as resting, rpm
const REST_CADENCE: f64 = 60.0;
/// Rest and drafting rows sit below this fraction of FTP
const REST_POWER_FRACTION: f64 = 0.5;
/// Hard rows sit above this fraction of FTP
const HARD_POWER_FRACTION: f64 = 0.9;
/// Velocity percentile above which low-power rows count as drafting
const DRAFTING_VELOCITY_QUANTILE: f64 = 0.75;

/// `Z1..Zn` labels for `count` zones
pub fn zone_labels(count: usize) -> Vec<String> {
    (1..=count).map(|zone| format!("Z{}", zone)).collect()
}

/// Normalized power: 4th-power mean of the rolling-averaged power, time weighted
pub fn normalized_power(stream: &PreparedStream, watts: &[f64], window: usize) -> Option<f64> {
    let total = stream.total_time();
    if total <= 0.0 {
        return None;
    }

    let rolled = rolling_mean(watts, window);
    let fourth: f64 = rolled
        .iter()
        .zip(stream.dt())
        .map(|(p, dt)| p.powi(4) * dt)
        .sum();

    Some((fourth / total).powf(0.25))
}

/// TSS = duration x NP x IF / (FTP x 3600) x 100
pub fn training_stress_score(
    total_time: f64,
    normalized_power: f64,
    intensity_factor: f64,
    ftp: f64,
) -> Option<f64> {
    if total_time <= 0.0 || ftp <= 0.0 {
        return None;
    }
    Some(total_time * normalized_power * intensity_factor / (ftp * 3600.0) * 100.0)
}

/// Full power-stream path
pub(crate) fn stream_metrics(input: &PathInput<'_>, metrics: &mut StrainMetrics) {
    let stream = input.stream;
    let watts = stream.values(Channel::Watts);
    let watts_or_zero = stream.values_or_zero(Channel::Watts);

    metrics.estimate_method = EstimateMethod::PowerStream;
    metrics.avg_power = stream.time_weighted_mean(&watts_or_zero);
    metrics.normalized_power = normalized_power(stream, &watts_or_zero, input.rolling_window);

    let Some(ftp) = input.ftp else {
        return;
    };

    if let Some(np) = metrics.normalized_power {
        let intensity = np / ftp;
        metrics.intensity_factor = Some(intensity);
        metrics.tss = training_stress_score(stream.total_time(), np, intensity, ftp);
    }

    let ratios: Vec<Option<f64>> = watts.iter().map(|w| w.map(|w| w / ftp)).collect();
    let labels = zone_labels(input.power_zone_edges.len().saturating_sub(1));
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let zone_times = stream.binned_times(&ratios, &input.power_zone_edges, &label_refs);
    metrics.zone_percentages = Some(stream.percentages(&zone_times));
    metrics.zone_times = Some(zone_times);

    let cadence = stream.values_or_zero(Channel::Cadence);
    let below = |i: usize, fraction: f64| watts[i].map_or(false, |w| w < fraction * ftp);

    let mut segments = BTreeMap::new();
    segments.insert(
        "rest".to_string(),
        stream.time_where(|i| cadence[i] < REST_CADENCE && below(i, REST_POWER_FRACTION)),
    );
    segments.insert(
        "hard".to_string(),
        stream.time_where(|i| watts[i].map_or(false, |w| w > HARD_POWER_FRACTION * ftp)),
    );

    if stream.has(Channel::Velocity) {
        let velocity = stream.values(Channel::Velocity);
        let present: Vec<f64> = velocity.iter().flatten().copied().collect();
        if let Some(fast) = quantile(&present, DRAFTING_VELOCITY_QUANTILE) {
            segments.insert(
                "drafting".to_string(),
                stream.time_where(|i| {
                    velocity[i].map_or(false, |v| v > fast) && below(i, REST_POWER_FRACTION)
                }),
            );
        }
    }

    metrics.segment_times = segments;
}

/// Rough estimate for rides recorded without a power meter
pub(crate) fn metadata_estimate(
    input: &PathInput<'_>,
    hints: &mut HintResolver<'_>,
    metrics: &mut StrainMetrics,
) {
    let stream = input.stream;
    let total = stream.total_time();
    let ftp = input.ftp;

    metrics.estimate_method = EstimateMethod::RoughFromMetadataAndHr;

    let estimate = hints.resolve(Hint::AveragePower).or_else(|| {
        hints
            .resolve(Hint::PowerIntensity)
            .zip(ftp)
            .map(|(intensity, ftp)| intensity * ftp)
    });

    metrics.avg_power = estimate;
    metrics.normalized_power = estimate;
    metrics.intensity_factor = estimate.zip(ftp).map(|(np, ftp)| np / ftp);

    metrics.tss = hints.resolve(Hint::RideLoad).or_else(|| {
        match (estimate, metrics.intensity_factor, ftp) {
            (Some(np), Some(intensity), Some(ftp)) => {
                training_stress_score(total, np, intensity, ftp)
            }
            _ => None,
        }
    });

    if let (Some(intensity), Some(_)) = (metrics.intensity_factor, ftp) {
        let labels = zone_labels(input.power_zone_edges.len().saturating_sub(1));
        let zone = bin_index(intensity, &input.power_zone_edges);
        let zone_times: BTreeMap<String, f64> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let time = if Some(i) == zone { total } else { 0.0 };
                (label.clone(), time)
            })
            .collect();
        metrics.zone_percentages = Some(stream.percentages(&zone_times));
        metrics.zone_times = Some(zone_times);
    }

    let mut segments = BTreeMap::new();
    if stream.has(Channel::Heartrate) {
        let lthr = input.lthr(hints);
        let split = split_by_heartrate(stream, lthr, (0.6, 0.9), (0.25, 0.9));
        segments.insert("rest".to_string(), split.low);
        segments.insert("hard".to_string(), split.high);
    } else if let Some(intensity) = hints.resolve(Hint::SegmentIntensity) {
        let hard = intensity > HARD_POWER_FRACTION;
        segments.insert("rest".to_string(), if hard { 0.0 } else { total });
        segments.insert("hard".to_string(), if hard { total } else { 0.0 });
    }
    metrics.segment_times = segments;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractionConfig, StrainExtractor};
    use crate::models::{ActivityMetadata, ActivitySample, ActivityType};
    use serde_json::json;

    fn extract(samples: &[ActivitySample], metadata: &ActivityMetadata) -> StrainMetrics {
        StrainExtractor::new(&ExtractionConfig::default())
            .extract(samples, metadata)
            .unwrap()
    }

    fn ride(ftp: f64) -> ActivityMetadata {
        ActivityMetadata::new(ActivityType::Ride, "2024-02-01").with_ftp(ftp)
    }

    #[test]
    fn test_constant_power_np_equals_average() {
        let samples: Vec<ActivitySample> = (0..1800)
            .map(|t| ActivitySample::at(t as f64).with_watts(150.0))
            .collect();
        let metrics = extract(&samples, &ride(250.0));

        let np = metrics.normalized_power.unwrap();
        assert!((np - 150.0).abs() < 1e-6);
        assert!((metrics.intensity_factor.unwrap() - 0.6).abs() < 1e-9);
        // 1800 s at IF 0.6 -> 0.5 h * 0.36 * 100 = 18
        assert!((metrics.tss.unwrap() - 18.0).abs() < 1e-6);
    }

    #[test]
    fn test_variable_power_np_exceeds_average() {
        let samples: Vec<ActivitySample> = (0..1200)
            .map(|t| {
                let watts = if (t / 60) % 2 == 0 { 300.0 } else { 100.0 };
                ActivitySample::at(t as f64).with_watts(watts)
            })
            .collect();
        let metrics = extract(&samples, &ride(250.0));
        assert!(metrics.normalized_power.unwrap() > metrics.avg_power.unwrap());
    }

    #[test]
    fn test_zone_times_are_lower_inclusive() {
        // 0.55 * 200 = 110 lands in Z2, 109 in Z1
        let samples = vec![
            ActivitySample::at(0.0).with_watts(109.0),
            ActivitySample::at(1.0).with_watts(110.0),
            ActivitySample::at(2.0).with_watts(250.0),
            ActivitySample::at(3.0),
        ];
        let metrics = extract(&samples, &ride(200.0));
        let zones = metrics.zone_times.unwrap();

        assert_eq!(zones.len(), 6);
        assert_eq!(zones["Z1"], 1.0);
        assert_eq!(zones["Z2"], 1.0);
        assert_eq!(zones["Z6"], 1.0);
        assert_eq!(zones.values().sum::<f64>(), 3.0);
        assert_eq!(metrics.zone_percentages.unwrap()["Z1"], 25.0);
    }

    #[test]
    fn test_segments_with_velocity() {
        let samples: Vec<ActivitySample> = (0..8)
            .map(|t| {
                let (watts, velocity, cadence) = match t {
                    0 | 1 => (50.0, 12.0, 40.0),
                    2 | 3 => (200.0, 8.0, 90.0),
                    _ => (90.0, 9.0, 85.0),
                };
                ActivitySample::at(t as f64)
                    .with_watts(watts)
                    .with_velocity(velocity)
                    .with_cadence(cadence)
            })
            .collect();
        let metrics = extract(&samples, &ride(200.0));

        assert_eq!(metrics.segment_times["rest"], 2.0);
        assert_eq!(metrics.segment_times["hard"], 2.0);
        // q75 of velocity is 9.75; rows 0 and 1 are fast and easy
        assert_eq!(metrics.segment_times["drafting"], 2.0);
        assert_eq!(metrics.segment_percentages["hard"], 25.0);
    }

    #[test]
    fn test_missing_cadence_counts_as_zero() {
        let samples: Vec<ActivitySample> = (0..4)
            .map(|t| ActivitySample::at(t as f64).with_watts(50.0))
            .collect();
        let metrics = extract(&samples, &ride(200.0));
        assert_eq!(metrics.segment_times["rest"], 4.0);
        assert!(!metrics.segment_times.contains_key("drafting"));
    }

    #[test]
    fn test_fallback_uses_intensity_hint() {
        let metadata = ride(200.0).with_hint("icu_intensity", json!("55%"));
        let samples: Vec<ActivitySample> = (0..60).map(|t| ActivitySample::at(t as f64)).collect();
        let metrics = extract(&samples, &metadata);

        assert_eq!(metrics.estimate_method, EstimateMethod::RoughFromMetadataAndHr);
        assert!((metrics.avg_power.unwrap() - 110.0).abs() < 1e-9);
        assert!((metrics.intensity_factor.unwrap() - 0.55).abs() < 1e-9);

        let zones = metrics.zone_times.unwrap();
        assert_eq!(zones["Z2"], 60.0);
        assert_eq!(zones["Z1"], 0.0);
        // 55 % is below 0.9, so the whole ride is rest
        assert_eq!(metrics.segment_times["rest"], 60.0);
        assert_eq!(metrics.segment_times["hard"], 0.0);
    }

    #[test]
    fn test_fallback_hard_intensity_without_heart_rate() {
        let metadata = ride(200.0).with_hint("icu_intensity", json!(95));
        let samples: Vec<ActivitySample> = (0..60).map(|t| ActivitySample::at(t as f64)).collect();
        let metrics = extract(&samples, &metadata);

        assert!((metrics.intensity_factor.unwrap() - 0.95).abs() < 1e-9);
        assert_eq!(metrics.segment_times["hard"], 60.0);
        assert_eq!(metrics.segment_times["rest"], 0.0);
        assert_eq!(metrics.segment_percentages["hard"], 100.0);
    }

    #[test]
    fn test_fallback_vendor_percent_intensity_is_easy() {
        // 59.3 is a percentage, not 59x threshold
        let metadata = ride(200.0).with_hint("intensity", json!(59.3));
        let samples: Vec<ActivitySample> = (0..60).map(|t| ActivitySample::at(t as f64)).collect();
        let metrics = extract(&samples, &metadata);

        assert!((metrics.intensity_factor.unwrap() - 0.593).abs() < 1e-9);
        assert_eq!(metrics.segment_times["rest"], 60.0);
        assert_eq!(metrics.segment_times["hard"], 0.0);
    }

    #[test]
    fn test_fallback_heart_rate_percentiles_without_lthr() {
        let metadata = ride(200.0).with_hint("average_watts", json!(120));
        let samples: Vec<ActivitySample> = (0..10)
            .map(|t| ActivitySample::at(t as f64).with_heartrate(100.0 + 10.0 * t as f64))
            .collect();
        let metrics = extract(&samples, &metadata);

        // q25 = 122.5, q90 = 181
        assert_eq!(metrics.segment_times["rest"], 3.0);
        assert_eq!(metrics.segment_times["hard"], 1.0);
    }

    #[test]
    fn test_fallback_prefers_load_hint_for_tss() {
        let metadata = ride(200.0)
            .with_hint("average_watts", json!(120))
            .with_hint("icu_training_load", json!(48));
        let samples: Vec<ActivitySample> = (0..60).map(|t| ActivitySample::at(t as f64)).collect();
        let metrics = extract(&samples, &metadata);
        assert_eq!(metrics.tss, Some(48.0));
    }

    #[test]
    fn test_fallback_without_estimate_has_no_zones() {
        let samples: Vec<ActivitySample> = (0..60).map(|t| ActivitySample::at(t as f64)).collect();
        let metrics = extract(&samples, &ride(200.0));

        assert_eq!(metrics.avg_power, None);
        assert_eq!(metrics.intensity_factor, None);
        assert_eq!(metrics.zone_percentages, None);
        assert!(metrics.segment_times.is_empty());
        assert!(!metrics.strain_applicable);
    }

    #[test]
    fn test_fallback_heart_rate_segments_with_lthr() {
        let metadata = ride(200.0)
            .with_lthr(160.0)
            .with_hint("average_watts", json!(120));
        let samples: Vec<ActivitySample> = [90.0, 120.0, 150.0, 150.0]
            .iter()
            .enumerate()
            .map(|(t, hr)| ActivitySample::at(t as f64).with_heartrate(*hr))
            .collect();
        let metrics = extract(&samples, &metadata);
        // rest < 96, hard > 144
        assert_eq!(metrics.segment_times["rest"], 1.0);
        assert_eq!(metrics.segment_times["hard"], 2.0);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_zone_times_never_exceed_total(
            watts in proptest::collection::vec(0.0f64..600.0, 1..300),
            ftp in 150.0f64..350.0,
        ) {
            let samples: Vec<ActivitySample> = watts
                .iter()
                .enumerate()
                .map(|(t, w)| ActivitySample::at(t as f64).with_watts(*w))
                .collect();
            let metrics = extract(&samples, &ride(ftp));

            let total = metrics.total_time.unwrap();
            let zoned: f64 = metrics.zone_times.unwrap().values().sum();
            prop_assert!(zoned <= total + 1e-9);

            let np = metrics.normalized_power.unwrap();
            prop_assert!(np >= 0.0);
            prop_assert!(np <= 600.0);
        }
    }
}
