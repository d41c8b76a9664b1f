use gapfill_detector::{DetectorConfig, PatternDetector};
use gapfill_model::{DetectionMethod, PlaceholderKind, Span};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn detector() -> PatternDetector {
    PatternDetector::new(DetectorConfig::default()).expect("default config is valid")
}

#[test]
fn write_about_template_yields_two_gaps() {
    let text = "Write about {primary_keyword} for {target_audience}.";
    let gaps = detector().detect(text).unwrap();
    assert_eq!(gaps.len(), 2);

    assert_eq!(gaps[0].kind, PlaceholderKind::PrimaryKeyword);
    assert_eq!(gaps[0].span, Span { start: 12, end: 29 });
    assert_eq!(&text[12..29], "{primary_keyword}");

    assert_eq!(gaps[1].kind, PlaceholderKind::TargetAudience);
    assert_eq!(gaps[1].span, Span { start: 34, end: 51 });
    assert_eq!(&text[34..51], "{target_audience}");

    assert!(gaps
        .iter()
        .all(|g| g.detection_method == DetectionMethod::KindPattern));
}

#[test]
fn repeated_placeholders_are_separate_gaps() {
    let text = "{tone} first, then {tone} again";
    let gaps = detector().detect(text).unwrap();
    assert_eq!(gaps.len(), 2);
    assert!(!gaps[0].span.overlaps(&gaps[1].span));
}

#[test]
fn detection_is_deterministic() {
    let text = "Guide on {primary_keyword} in a {tone} voice for {target_audience} ({length} words).";
    let first = detector().detect(text).unwrap();
    let second = detector().detect(text).unwrap();
    assert_eq!(first, second);
}

#[test]
fn no_placeholders_no_gaps() {
    assert!(detector().detect("Plain prose only.").unwrap().is_empty());
    assert!(detector().detect("").unwrap().is_empty());
}

#[test]
fn invalid_config_is_rejected() {
    let config = DetectorConfig {
        context_radius: 0,
        ..DetectorConfig::default()
    };
    assert!(PatternDetector::new(config).is_err());
}

proptest! {
    #[test]
    fn spans_match_placeholders_and_stay_ordered(
        pieces in proptest::collection::vec(
            prop_oneof![
                "[a-zA-Zà-ú ,.]{0,30}",
                Just("{primary_keyword}".to_string()),
                Just("{tone}".to_string()),
                Just("{ niche }".to_string()),
                "\\{[a-z_]{1,12}\\}",
            ],
            0..20,
        )
    ) {
        let text = pieces.concat();
        let gaps = detector().detect(&text).unwrap();
        for gap in &gaps {
            prop_assert_eq!(&text[gap.span.start..gap.span.end], gap.placeholder());
            prop_assert!((0.0..=1.0).contains(&gap.confidence));
            prop_assert!(gap.local_context.chars().count() <= 200);
        }
        for pair in gaps.windows(2) {
            prop_assert!(pair[0].span.start < pair[1].span.start);
            prop_assert!(!pair[0].span.overlaps(&pair[1].span));
        }
    }
}
