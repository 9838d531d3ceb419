//! One-call window assessment
//!
//! Wires the gates, baseline, classifier and renderer together from an
//! [`AnalysisConfig`].

use crate::baseline::{BaselineBuilder, BaselineStats, DeviationComparator, DeviationResult};
use crate::classifier::{Classification, FatigueClassifier};
use crate::config::AnalysisConfig;
use crate::easy::EasyActivityGate;
use crate::gating::{LoadContextGate, WindowGate};
use crate::models::StrainMetrics;
use crate::summary::SummaryRenderer;
use serde::Serialize;
use tracing::{info, instrument};

pub use crate::gating::select_window;

/// Everything the pipeline produced for one window
#[derive(Debug, Clone, Serialize)]
pub struct WindowAssessment {
    pub metrics: Vec<StrainMetrics>,
    pub baseline: BaselineStats,
    pub deviations: Vec<DeviationResult>,
    pub classification: Classification,
    pub summary: String,
}

/// Classifier with every gate built from the configuration
pub fn build_classifier(config: &AnalysisConfig) -> FatigueClassifier {
    let easy_gate = EasyActivityGate::new(&config.easy_gate);
    FatigueClassifier::new(
        &config.classifier,
        easy_gate.clone(),
        WindowGate::new(&config.window_gate, easy_gate),
        LoadContextGate::new(&config.load_gate),
    )
}

/// Run the whole analysis over an already selected window
#[instrument(skip_all, fields(activities = activities.len()))]
pub fn assess_window(activities: &[StrainMetrics], config: &AnalysisConfig) -> WindowAssessment {
    let baseline = BaselineBuilder::build(activities);
    let deviations = activities
        .iter()
        .map(|activity| DeviationComparator::compare(activity, &baseline))
        .collect();

    let classification = build_classifier(config).classify_with_baseline(activities, &baseline);
    let summary = SummaryRenderer::render(&classification, &baseline, activities);

    info!(
        label = %classification.label,
        flagged_rides = classification.flagged_rides,
        "Window assessed"
    );

    WindowAssessment {
        metrics: activities.to_vec(),
        baseline,
        deviations,
        classification,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FatigueLabel;
    use crate::gating::NO_RIDES_IN_WINDOW;

    #[test]
    fn test_empty_window() {
        let assessment = assess_window(&[], &AnalysisConfig::default());
        assert_eq!(assessment.classification.label, FatigueLabel::NeutralNoisy);
        assert!(assessment
            .classification
            .reasons
            .iter()
            .any(|r| r == NO_RIDES_IN_WINDOW));
        assert!(assessment.baseline.is_empty());
        assert!(assessment.summary.contains("Not enough recent history"));
    }

    #[test]
    fn test_config_thresholds_reach_gates() {
        let rides: Vec<StrainMetrics> = (1..=3)
            .map(|day| StrainMetrics {
                date: Some(format!("2024-03-{:02}", day)),
                intensity_factor: Some(0.55),
                total_time: Some(4000.0),
                avg_heartrate: Some(120.0),
                tss: Some(40.0),
                ..StrainMetrics::default()
            })
            .collect();

        let mut config = AnalysisConfig::default();
        config.window_gate.min_activities = 3;
        config.window_gate.min_easy_activities = 0;

        let assessment = assess_window(&rides, &config);
        assert!(assessment.classification.window_gate.eligible);
        assert_eq!(assessment.deviations.len(), 3);

        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["classification"]["label"], "neutral_noisy");
        assert!(json["summary"].as_str().unwrap().contains("Assessment: neutral_noisy"));
    }
}
