//! Strength sessions: training load is the main signal, heart rate the split

use crate::extractor::{split_by_heartrate, PathInput};
use crate::hints::{Hint, HintResolver};
use crate::models::{EstimateMethod, StrainMetrics};
use crate::streams::Channel;
use std::collections::BTreeMap;

pub(crate) fn strength_metrics(
    input: &PathInput<'_>,
    hints: &mut HintResolver<'_>,
    metrics: &mut StrainMetrics,
) {
    let stream = input.stream;
    metrics.estimate_method = EstimateMethod::StrengthFromTrainingLoadAndHr;
    metrics.training_load = hints.resolve(Hint::TrainingLoad);
    metrics.distance = hints.resolve(Hint::Distance);
    metrics.elevation_gain = hints.resolve(Hint::ElevationGain);

    metrics.segment_times = if stream.has(Channel::Heartrate) {
        let lthr = input.lthr(hints);
        let split = split_by_heartrate(stream, lthr, (0.70, 0.85), (0.33, 0.67));
        BTreeMap::from([
            ("easy".to_string(), split.low),
            ("moderate".to_string(), split.mid),
            ("intense".to_string(), split.high),
        ])
    } else {
        BTreeMap::from([("unknown".to_string(), stream.total_time())])
    };
}
