//! Running strain from heart rate and velocity streams

use crate::extractor::{split_by_heartrate, PathInput};
use crate::hints::{Hint, HintResolver};
use crate::models::{EstimateMethod, StrainMetrics};
use crate::power::zone_labels;
use crate::streams::{quantile, Channel};
use std::collections::BTreeMap;

/// Velocity percentiles separating pace zones Z1..Z5
const PACE_ZONE_QUANTILES: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

pub(crate) fn running_metrics(
    input: &PathInput<'_>,
    hints: &mut HintResolver<'_>,
    metrics: &mut StrainMetrics,
) {
    let stream = input.stream;
    metrics.estimate_method = EstimateMethod::RunningFromHrAndVelocity;

    if stream.has(Channel::Velocity) {
        let velocity = stream.values_or_zero(Channel::Velocity);
        metrics.avg_velocity = stream.time_weighted_mean(&velocity);
        metrics.max_velocity = velocity.iter().copied().reduce(f64::max);

        // Edges can repeat on steady runs; repeated edges leave empty zones
        let mut edges = vec![0.0];
        edges.extend(
            PACE_ZONE_QUANTILES
                .iter()
                .map(|q| quantile(&velocity, *q).unwrap_or(0.0)),
        );
        edges.push(f64::INFINITY);

        let labels = zone_labels(edges.len() - 1);
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let present: Vec<Option<f64>> = velocity.iter().map(|v| Some(*v)).collect();
        let pace_times = stream.binned_times(&present, &edges, &label_refs);
        metrics.pace_zone_percentages = Some(stream.percentages(&pace_times));
        metrics.pace_zone_times = Some(pace_times);
    }

    if stream.has(Channel::Cadence) {
        metrics.avg_cadence = stream.time_weighted_mean(&stream.values_or_zero(Channel::Cadence));
    }

    metrics.elevation_gain = hints.resolve(Hint::ElevationGain);
    metrics.elevation_loss = hints.resolve(Hint::ElevationLoss);
    metrics.training_load = hints.resolve(Hint::TrainingLoad);

    if stream.has(Channel::Heartrate) {
        let lthr = input.lthr(hints);
        let split = split_by_heartrate(stream, lthr, (0.75, 0.90), (0.40, 0.75));
        metrics.segment_times = BTreeMap::from([
            ("easy".to_string(), split.low),
            ("steady".to_string(), split.mid),
            ("hard".to_string(), split.high),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use crate::extractor::{ExtractionConfig, StrainExtractor};
    use crate::models::{ActivityMetadata, ActivitySample, ActivityType, EstimateMethod};
    use serde_json::json;

    fn run(samples: &[ActivitySample], metadata: ActivityMetadata) -> crate::models::StrainMetrics {
        StrainExtractor::new(&ExtractionConfig::default())
            .extract(samples, &metadata)
            .unwrap()
    }

    #[test]
    fn test_run_velocity_and_pace_zones() {
        let samples: Vec<ActivitySample> = (0..10)
            .map(|t| {
                ActivitySample::at(t as f64)
                    .with_velocity(2.0 + t as f64 * 0.2)
                    .with_cadence(170.0)
                    .with_heartrate(140.0)
            })
            .collect();
        let metadata = ActivityMetadata::new(ActivityType::Run, "2024-03-01")
            .with_hint("icu_training_load", json!(42))
            .with_hint("total_elevation_gain", json!("120"));
        let metrics = run(&samples, metadata);

        assert_eq!(metrics.estimate_method, EstimateMethod::RunningFromHrAndVelocity);
        assert!((metrics.max_velocity.unwrap() - 3.8).abs() < 1e-9);
        assert!((metrics.avg_velocity.unwrap() - 2.9).abs() < 1e-9);
        assert_eq!(metrics.avg_cadence, Some(170.0));
        assert_eq!(metrics.training_load, Some(42.0));
        assert_eq!(metrics.elevation_gain, Some(120.0));
        assert_eq!(metrics.intensity_factor, None);

        let zones = metrics.pace_zone_times.unwrap();
        assert_eq!(zones.len(), 5);
        assert!((zones.values().sum::<f64>() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_velocity_degenerate_edges() {
        let samples: Vec<ActivitySample> = (0..20)
            .map(|t| ActivitySample::at(t as f64).with_velocity(3.0))
            .collect();
        let metrics = run(&samples, ActivityMetadata::new(ActivityType::Run, "2024-03-01"));

        let zones = metrics.pace_zone_times.unwrap();
        assert_eq!(zones["Z1"], 0.0);
        assert_eq!(zones["Z5"], 20.0);
    }

    #[test]
    fn test_run_segments_from_lthr() {
        let samples: Vec<ActivitySample> = [120.0, 140.0, 150.0, 170.0]
            .iter()
            .enumerate()
            .map(|(t, hr)| ActivitySample::at(t as f64).with_heartrate(*hr))
            .collect();
        let metadata = ActivityMetadata::new(ActivityType::Run, "2024-03-01").with_lthr(170.0);
        let metrics = run(&samples, metadata);

        // easy < 127.5, steady 127.5..=153, hard > 153
        assert_eq!(metrics.segment_times["easy"], 1.0);
        assert_eq!(metrics.segment_times["steady"], 2.0);
        assert_eq!(metrics.segment_times["hard"], 1.0);
        assert_eq!(metrics.segment_percentages["steady"], 50.0);
        assert!(metrics.pace_zone_times.is_none());
    }

    #[test]
    fn test_run_segments_from_percentiles() {
        let samples: Vec<ActivitySample> = (0..10)
            .map(|t| ActivitySample::at(t as f64).with_heartrate(100.0 + 10.0 * t as f64))
            .collect();
        let metrics = run(&samples, ActivityMetadata::new(ActivityType::Run, "2024-03-02"));

        // q40 = 136, q75 = 167.5
        assert_eq!(metrics.segment_times["easy"], 4.0);
        assert_eq!(metrics.segment_times["steady"], 3.0);
        assert_eq!(metrics.segment_times["hard"], 3.0);
    }
}
