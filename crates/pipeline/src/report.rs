use std::collections::BTreeSet;

use crate::result::PipelineResult;

/// Human-readable observations about a run
pub(crate) fn insights(result: &PipelineResult) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(migration) = &result.migration {
        if !migration.migrations_applied.is_empty() {
            insights.push(format!(
                "Migrated {} legacy placeholder pattern(s) from {:?} notation",
                migration.migrations_applied.len(),
                migration.format_detected
            ));
        }
    }

    let kinds: BTreeSet<&str> = result.gaps.iter().map(|gap| gap.kind.as_str()).collect();
    insights.push(format!(
        "Detected {} gap(s) across {} kind(s)",
        result.gaps.len(),
        kinds.len()
    ));

    if let Some(implied) = result.implied_gaps.as_ref().filter(|gaps| !gaps.is_empty()) {
        insights.push(format!("{} implied gap(s) found in the prose", implied.len()));
    }

    if let Some(validation) = &result.context_validation {
        insights.push(format!(
            "Context score {:.2} with {} issue(s)",
            validation.overall_score,
            validation.issues.len()
        ));
    }

    if let Some(matches) = &result.matches {
        let accepted = matches.iter().filter(|outcome| outcome.accepted.is_some()).count();
        insights.push(format!("{accepted} of {} gap(s) matched semantically", matches.len()));
    }

    if let Some(fallbacks) = &result.fallbacks {
        let exhausted = fallbacks.iter().filter(|fallback| fallback.exhausted).count();
        if exhausted > 0 {
            insights.push(format!(
                "{} gap(s) filled by fallback, {exhausted} with a generic value",
                fallbacks.len()
            ));
        } else if !fallbacks.is_empty() {
            insights.push(format!("{} gap(s) filled by fallback", fallbacks.len()));
        }
    }

    if let Some(quality) = &result.quality {
        insights.push(format!(
            "Quality {:?} ({:.2}), trend {:?}",
            quality.quality_level, quality.overall_score, quality.trend
        ));
    }

    insights
}

/// Suggested next steps, without duplicates, most important first
pub(crate) fn recommendations(result: &PipelineResult, min_quality_score: f64) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |item: String| {
        if !out.contains(&item) {
            out.push(item);
        }
    };

    if let Some(migration) = &result.migration {
        for name in &migration.validation.required_missing {
            push(format!("Add the required placeholder {{{name}}}"));
        }
        for malformed in &migration.validation.malformed {
            push(format!("Fix the malformed placeholder at byte {}", malformed.position));
        }
    }

    if let Some(quality) = &result.quality {
        if quality.overall_score < min_quality_score {
            push(format!(
                "Quality {:.2} is below the {min_quality_score:.2} minimum",
                quality.overall_score
            ));
        }
        for recommendation in &quality.recommendations {
            push(recommendation.clone());
        }
    }

    if let Some(validation) = &result.context_validation {
        for suggestion in &validation.suggestions {
            push(suggestion.clone());
        }
    }

    if let Some(fallbacks) = &result.fallbacks {
        for fallback in fallbacks.iter().filter(|fallback| fallback.exhausted) {
            push(format!(
                "Supply candidate values for {} gaps; only a generic value was available",
                fallback.gap_ref.kind
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_unifier::Unifier;

    #[test]
    fn empty_run_still_reports_gap_count() {
        let result = PipelineResult::empty("hash".into(), "no placeholders");
        assert_eq!(insights(&result), vec!["Detected 0 gap(s) across 0 kind(s)".to_string()]);
        assert!(recommendations(&result, 0.7).is_empty());
    }

    #[test]
    fn missing_required_placeholder_is_recommended_once() {
        let mut result = PipelineResult::empty("hash".into(), "A post in a [TOM] voice");
        result.migration = Some(Unifier::default().migrate("A post in a [TOM] voice", false));

        let recs = recommendations(&result, 0.7);
        assert_eq!(recs, vec!["Add the required placeholder {primary_keyword}".to_string()]);
        assert!(insights(&result)[0].starts_with("Migrated 1 legacy"));
    }
}
