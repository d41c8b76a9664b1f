use gapfill_detector::{BasicValidator, DetectorConfig, PatternDetector};
use gapfill_fallback::{
    FallbackConfig, FallbackMode, FallbackStrategy, FallbackSystem, HistorySnapshot, QualityBucket,
};
use gapfill_model::{DetectedGap, PlaceholderKind};
use gapfill_semantic::SemanticContext;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

const AUDIENCE: &str = "Write about the marketing campaign and brand funnel for {target_audience}.";

fn detect(text: &str) -> Vec<DetectedGap> {
    PatternDetector::new(DetectorConfig::default())
        .unwrap()
        .detect(text)
        .unwrap()
}

fn fallback(mode: FallbackMode) -> FallbackSystem {
    FallbackSystem::new(
        FallbackConfig {
            mode,
            ..FallbackConfig::default()
        },
        Arc::new(BasicValidator::default()),
    )
    .unwrap()
}

#[test]
fn hybrid_prefers_topic_keyed_audience() {
    let gaps = detect(AUDIENCE);
    assert_eq!(gaps[0].kind, PlaceholderKind::TargetAudience);
    let system = fallback(FallbackMode::Hybrid);
    let context = SemanticContext::from_window(AUDIENCE, 10);

    let result = system.generate(&gaps[0], Some(&context));
    assert!(!result.exhausted);
    assert!(result.warnings.is_empty());
    assert_eq!(result.selected.value, "marketing professionals");
    assert_eq!(result.selected.strategy, FallbackStrategy::Contextual);
    assert_eq!(result.selected.quality_bucket, QualityBucket::Excellent);
    assert!(result.options.len() <= system.config().max_options);
    assert_eq!(
        system
            .history()
            .count(PlaceholderKind::TargetAudience, "marketing professionals"),
        1
    );
}

#[test]
fn history_survives_a_snapshot_round_trip() {
    let gaps = detect(AUDIENCE);
    let first = fallback(FallbackMode::Hybrid);
    first.generate(&gaps[0], None);
    first.generate(&gaps[0], None);
    let json = serde_json::to_string(&first.snapshot()).unwrap();

    let second = fallback(FallbackMode::Historical);
    let snapshot: HistorySnapshot = serde_json::from_str(&json).unwrap();
    second.restore(&snapshot);
    let result = second.generate(&gaps[0], None);
    assert_eq!(result.selected.strategy, FallbackStrategy::Historical);
    assert_eq!(result.selected.value, "marketing professionals");
    assert_eq!(second.snapshot().total(), 3);
}

#[test]
fn selection_recording_can_be_switched_off() {
    let gaps = detect(AUDIENCE);
    let system = FallbackSystem::new(
        FallbackConfig {
            record_selection: false,
            ..FallbackConfig::default()
        },
        Arc::new(BasicValidator::default()),
    )
    .unwrap();
    system.generate(&gaps[0], None);
    assert!(system.history().is_empty());
}

proptest! {
    #[test]
    fn buckets_are_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(QualityBucket::from_quality(low) <= QualityBucket::from_quality(high));
    }
}
