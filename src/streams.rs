//! Time-axis preparation and time-weighted statistics over activity streams
//!
//! Every extraction path starts from a [`PreparedStream`]: rows without a
//! usable time are dropped, rows are sorted, and each row gets a duration
//! `dt` so that all averages and zone times are weighted by elapsed time
//! rather than by sample count.

use crate::error::ExtractionError;
use crate::models::ActivitySample;
use statrs::statistics::{Data, Median};
use std::collections::BTreeMap;

/// Stream channels available on a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Watts,
    Heartrate,
    Cadence,
    Velocity,
}

impl Channel {
    fn read(&self, sample: &ActivitySample) -> Option<f64> {
        let value = match self {
            Channel::Watts => sample.watts,
            Channel::Heartrate => sample.heartrate,
            Channel::Cadence => sample.cadence,
            Channel::Velocity => sample.velocity,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Sorted activity rows with per-row durations
#[derive(Debug, Clone)]
pub struct PreparedStream {
    rows: Vec<ActivitySample>,
    dt: Vec<f64>,
    total_time: f64,
}

impl PreparedStream {
    /// Drop untimed rows, sort by time and compute row durations
    ///
    /// The final row has no successor, so its duration is the median of the
    /// positive deltas (1 s when there are none).
    pub fn prepare(samples: &[ActivitySample]) -> Result<Self, ExtractionError> {
        let mut rows: Vec<ActivitySample> = samples
            .iter()
            .filter(|s| s.time_seconds.map_or(false, f64::is_finite))
            .copied()
            .collect();

        if rows.is_empty() {
            return Err(ExtractionError::MissingTimeAxis {
                samples: samples.len(),
            });
        }

        rows.sort_by(|a, b| time_of(a).total_cmp(&time_of(b)));

        let mut dt: Vec<f64> = rows
            .windows(2)
            .map(|pair| time_of(&pair[1]) - time_of(&pair[0]))
            .collect();

        let positive: Vec<f64> = dt.iter().copied().filter(|d| *d > 0.0).collect();
        let last = if positive.is_empty() {
            1.0
        } else {
            Data::new(positive).median()
        };
        dt.push(last);

        for d in dt.iter_mut() {
            *d = d.max(0.0);
        }

        let total_time = dt.iter().sum();

        Ok(Self {
            rows,
            dt,
            total_time,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of row durations in seconds
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn dt(&self) -> &[f64] {
        &self.dt
    }

    /// True when at least one row carries a value for the channel
    pub fn has(&self, channel: Channel) -> bool {
        self.rows.iter().any(|row| channel.read(row).is_some())
    }

    /// Channel values per row, absent values kept as `None`
    pub fn values(&self, channel: Channel) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| channel.read(row)).collect()
    }

    /// Channel values per row with absent values read as zero
    pub fn values_or_zero(&self, channel: Channel) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| channel.read(row).unwrap_or(0.0))
            .collect()
    }

    /// `sum(value * dt) / total_time`, `None` when no time elapsed
    pub fn time_weighted_mean(&self, values: &[f64]) -> Option<f64> {
        if self.total_time <= 0.0 {
            return None;
        }
        let weighted: f64 = values.iter().zip(&self.dt).map(|(v, dt)| v * dt).sum();
        Some(weighted / self.total_time)
    }

    /// Total duration of rows matching the mask
    pub fn time_where(&self, mask: impl Fn(usize) -> bool) -> f64 {
        self.dt
            .iter()
            .enumerate()
            .filter(|(i, _)| mask(*i))
            .map(|(_, dt)| dt)
            .sum()
    }

    /// Unweighted mean and maximum of the channel over present values
    pub fn mean_and_max(&self, channel: Channel) -> (Option<f64>, Option<f64>) {
        let present: Vec<f64> = self.values(channel).into_iter().flatten().collect();
        if present.is_empty() {
            return (None, None);
        }
        let mean = present.iter().sum::<f64>() / present.len() as f64;
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (Some(mean), Some(max))
    }

    /// Second-half minus first-half mean heart rate, split by elapsed time
    pub fn hr_drift(&self) -> Option<f64> {
        let half = self.total_time / 2.0;
        let mut elapsed = 0.0;
        let (mut first_sum, mut first_n) = (0.0, 0usize);
        let (mut second_sum, mut second_n) = (0.0, 0usize);

        for (row, dt) in self.rows.iter().zip(&self.dt) {
            elapsed += dt;
            let Some(hr) = Channel::Heartrate.read(row) else {
                continue;
            };
            if elapsed <= half {
                first_sum += hr;
                first_n += 1;
            } else {
                second_sum += hr;
                second_n += 1;
            }
        }

        if first_n == 0 || second_n == 0 {
            return None;
        }
        Some(second_sum / second_n as f64 - first_sum / first_n as f64)
    }

    /// Time spent in each half-open bin `[edges[i], edges[i+1])`
    ///
    /// Rows without a value, or outside every bin, count toward no bin.
    /// Every label is present in the result, possibly with zero time.
    pub fn binned_times(
        &self,
        values: &[Option<f64>],
        edges: &[f64],
        labels: &[&str],
    ) -> BTreeMap<String, f64> {
        let mut times: BTreeMap<String, f64> =
            labels.iter().map(|label| (label.to_string(), 0.0)).collect();

        for (value, dt) in values.iter().zip(&self.dt) {
            let Some(value) = value else { continue };
            if let Some(bin) = bin_index(*value, edges) {
                if let Some(label) = labels.get(bin) {
                    *times.entry(label.to_string()).or_insert(0.0) += dt;
                }
            }
        }

        times
    }

    /// Convert absolute times to percentages of the total duration
    pub fn percentages(&self, times: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        times
            .iter()
            .map(|(label, t)| {
                let pct = if self.total_time > 0.0 {
                    t / self.total_time * 100.0
                } else {
                    0.0
                };
                (label.clone(), pct)
            })
            .collect()
    }
}

fn time_of(sample: &ActivitySample) -> f64 {
    sample.time_seconds.unwrap_or(0.0)
}

/// Index of the first bin with `edges[i] <= value < edges[i+1]`
pub fn bin_index(value: f64, edges: &[f64]) -> Option<usize> {
    edges
        .windows(2)
        .position(|bounds| value >= bounds[0] && value < bounds[1])
}

/// Quantile with linear interpolation between closest ranks
///
/// Non-finite values are ignored; `None` when nothing is left.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Trailing rolling mean over `window` rows, averaging fewer rows at the start
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }
        let count = (i + 1).min(window);
        out.push(sum / count as f64);
    }

    out
}
