use gapfill_model::{ExpectedGap, PlaceholderKind};
use gapfill_quality::{QualityValidator, Trend, Upstream};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const TEMPLATE: &str = "Write about {primary_keyword} for {target_audience}.";

#[tokio::test]
async fn no_ground_truth_and_no_history_gives_low_confidence() {
    let upstream = Upstream::heuristic().unwrap();
    let validator = QualityValidator::default();
    let report = validator.assess_text(&upstream, TEMPLATE, &[]).await;

    assert_eq!(report.confidence_level, 0.3);
    assert!(!report.ground_truth_used);
    assert_eq!(report.gaps_evaluated, 2);
    assert_eq!(report.trend, Trend::InsufficientData);
    assert!((0.0..=1.0).contains(&report.overall_score));
    for stage in ["detection", "semantic_analysis", "context_validation", "semantic_matching"] {
        assert!(report.performance_breakdown.contains_key(stage), "{stage} missing");
    }
}

#[tokio::test]
async fn exact_ground_truth_scores_perfect_detection() {
    let upstream = Upstream::heuristic().unwrap();
    let validator = QualityValidator::default();
    let expected = [
        ExpectedGap::new(12, 29, Some(PlaceholderKind::PrimaryKeyword)),
        ExpectedGap::new(34, 51, Some(PlaceholderKind::TargetAudience)),
    ];
    let report = validator.assess_text(&upstream, TEMPLATE, &expected).await;

    assert!(report.ground_truth_used);
    assert_eq!(report.confidence_level, 0.5);
    assert_eq!(report.metrics.precision, 1.0);
    assert_eq!(report.metrics.recall, 1.0);
    assert_eq!(report.metrics.f1, 1.0);
    assert_eq!(report.metrics.accuracy, 1.0);
    assert_eq!(report.metrics.reliability, 1.0);
}

#[tokio::test]
async fn missed_gap_lowers_recall_and_raises_an_issue() {
    let upstream = Upstream::heuristic().unwrap();
    let validator = QualityValidator::default();
    let expected = [
        ExpectedGap::new(12, 29, None),
        ExpectedGap::new(34, 51, None),
        ExpectedGap::new(0, 5, None),
    ];
    let report = validator.assess_text(&upstream, TEMPLATE, &expected).await;

    assert!((report.metrics.recall - 2.0 / 3.0).abs() < 1e-9);
    assert!(report
        .issues
        .iter()
        .any(|issue| issue.metric == gapfill_quality::Metric::Recall));
    assert!(!report.recommendations.is_empty());
}

#[tokio::test]
async fn gap_without_candidates_counts_as_a_failed_matching_stage() {
    let upstream = Upstream::heuristic().unwrap();
    let validator = QualityValidator::default();
    let report = validator.assess_text(&upstream, "{x}", &[]).await;

    assert_eq!(report.gaps_evaluated, 1);
    assert!(report.metrics.reliability < 1.0);
    assert!(report
        .issues
        .iter()
        .any(|issue| issue.metric == gapfill_quality::Metric::Reliability));
}

proptest! {
    #[test]
    fn overall_score_stays_in_unit_range(text in "[a-z {}_]{0,80}") {
        let upstream = Upstream::heuristic().unwrap();
        let validator = QualityValidator::default();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = runtime.block_on(validator.assess_text(&upstream, &text, &[]));
        prop_assert!((0.0..=1.0).contains(&report.overall_score));
        prop_assert!((0.3..=1.0).contains(&report.confidence_level));
    }
}
