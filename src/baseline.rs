//! Band baselines and per-activity deviation from them

use crate::bands::IntensityBand;
use crate::models::{StrainMetric, StrainMetrics};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Mean, population standard deviation and sample count of one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub count: usize,
}

impl MetricStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        match samples {
            [] => Self::default(),
            [only] => Self {
                mean: Some(*only),
                stdev: Some(0.0),
                count: 1,
            },
            _ => Self {
                mean: Some(samples.iter().mean()),
                stdev: Some(samples.iter().population_std_dev()),
                count: samples.len(),
            },
        }
    }
}

/// Per band, per metric statistics; only real strain bands appear
pub type BaselineStats = BTreeMap<IntensityBand, BTreeMap<StrainMetric, MetricStats>>;

pub struct BaselineBuilder;

impl BaselineBuilder {
    pub fn build(activities: &[StrainMetrics]) -> BaselineStats {
        let mut grouped: BTreeMap<IntensityBand, Vec<&StrainMetrics>> = BTreeMap::new();
        for activity in activities {
            let band = IntensityBand::classify(activity.intensity_factor);
            if band.is_strain_band() {
                grouped.entry(band).or_default().push(activity);
            }
        }

        grouped
            .into_iter()
            .map(|(band, members)| {
                let stats = StrainMetric::ALL
                    .iter()
                    .map(|metric| {
                        let samples: Vec<f64> = members
                            .iter()
                            .filter_map(|a| a.strain_value(*metric))
                            .filter(|v| v.is_finite())
                            .collect();
                        (*metric, MetricStats::from_samples(&samples))
                    })
                    .collect();
                (band, stats)
            })
            .collect()
    }
}

/// One metric of an activity against its band baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDeviation {
    pub value: Option<f64>,
    pub delta: Option<f64>,
    pub zscore: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationResult {
    pub band: IntensityBand,
    /// `None` when the activity has no band or the band has no baseline
    pub comparison: Option<BTreeMap<StrainMetric, MetricDeviation>>,
}

pub struct DeviationComparator;

impl DeviationComparator {
    pub fn compare(activity: &StrainMetrics, baseline: &BaselineStats) -> DeviationResult {
        let band = IntensityBand::classify(activity.intensity_factor);
        let stats = match baseline.get(&band) {
            Some(stats) if band.is_strain_band() => stats,
            _ => {
                return DeviationResult {
                    band,
                    comparison: None,
                }
            }
        };

        let comparison = StrainMetric::ALL
            .iter()
            .map(|metric| {
                let value = activity.strain_value(*metric);
                let entry = stats.get(metric).copied().unwrap_or_default();
                let delta = value.zip(entry.mean).map(|(v, mean)| v - mean);
                let zscore = match (delta, entry.stdev) {
                    (Some(delta), Some(stdev)) if stdev > 0.0 => Some(delta / stdev),
                    _ => None,
                };
                (*metric, MetricDeviation { value, delta, zscore })
            })
            .collect();

        DeviationResult {
            band,
            comparison: Some(comparison),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(intensity: f64, hr: f64) -> StrainMetrics {
        StrainMetrics {
            intensity_factor: Some(intensity),
            avg_heartrate: Some(hr),
            ..StrainMetrics::default()
        }
    }

    #[test]
    fn test_ignored_bands_are_skipped() {
        let baseline = BaselineBuilder::build(&[
            activity(0.70, 150.0),
            activity(0.55, 120.0),
            activity(0.57, 124.0),
        ]);

        assert_eq!(baseline.len(), 1);
        let band = &baseline[&IntensityBand::If50To60];
        assert_eq!(band[&StrainMetric::AvgHeartrate].count, 2);
        assert_eq!(band[&StrainMetric::AvgHeartrate].mean, Some(122.0));
        assert!((band[&StrainMetric::AvgHeartrate].stdev.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(band[&StrainMetric::Tss], MetricStats::default());
    }

    #[test]
    fn test_single_sample_has_zero_stdev() {
        let stats = MetricStats::from_samples(&[130.0]);
        assert_eq!(stats.stdev, Some(0.0));
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn test_zero_stdev_gives_no_zscore() {
        let baseline = BaselineBuilder::build(&[activity(0.55, 120.0), activity(0.56, 120.0)]);
        let result = DeviationComparator::compare(&activity(0.58, 130.0), &baseline);

        let comparison = result.comparison.unwrap();
        let hr = comparison[&StrainMetric::AvgHeartrate];
        assert_eq!(hr.value, Some(130.0));
        assert_eq!(hr.delta, Some(10.0));
        assert_eq!(hr.zscore, None);
        assert_eq!(comparison[&StrainMetric::Tss].delta, None);
    }

    #[test]
    fn test_zscore() {
        let baseline = BaselineBuilder::build(&[activity(0.55, 120.0), activity(0.56, 130.0)]);
        let result = DeviationComparator::compare(&activity(0.52, 135.0), &baseline);
        let hr = result.comparison.unwrap()[&StrainMetric::AvgHeartrate];
        assert!((hr.zscore.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_without_baseline_band() {
        let baseline = BaselineBuilder::build(&[activity(0.55, 120.0)]);

        let result = DeviationComparator::compare(&activity(0.62, 120.0), &baseline);
        assert_eq!(result.band, IntensityBand::If60To65);
        assert!(result.comparison.is_none());

        let result = DeviationComparator::compare(&StrainMetrics::default(), &baseline);
        assert_eq!(result.band, IntensityBand::Unknown);
        assert!(result.comparison.is_none());
    }

    #[test]
    fn test_cardiac_cost_is_derived() {
        let mut ride = activity(0.55, 120.0);
        ride.avg_power = Some(100.0);
        let baseline = BaselineBuilder::build(&[ride]);
        let cost = baseline[&IntensityBand::If50To60][&StrainMetric::CardiacCost];
        assert_eq!(cost.mean, Some(1.2));
    }
}
