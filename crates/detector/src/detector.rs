use gapfill_model::text::{centered_excerpt, normalize_whitespace, window_bounds};
use gapfill_model::{
    clamp_unit, DetectedGap, DetectionMethod, GapError, PlaceholderKind, Result, Span,
    ValidationLevel,
};
use regex::Regex;
use std::collections::BTreeMap;

use crate::config::DetectorConfig;

/// Pattern of the generic `{name}` catcher
pub const GENERIC_PATTERN: &str = r"\{([^{}]+)\}";

/// Regex scanner that turns canonical placeholders into [`DetectedGap`] records
#[derive(Debug)]
pub struct PatternDetector {
    config: DetectorConfig,
    kind_patterns: Vec<(PlaceholderKind, Regex)>,
    generic: Regex,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate().map_err(GapError::config)?;

        let mut kind_patterns = Vec::new();
        for kind in PlaceholderKind::canonical() {
            let pattern = format!(r"\{{\s*({})\s*\}}", regex::escape(kind.as_str()));
            let regex = Regex::new(&pattern).map_err(|err| {
                GapError::detection(format!("pattern for {kind} failed to compile: {err}"))
            })?;
            kind_patterns.push((kind, regex));
        }
        let generic = Regex::new(GENERIC_PATTERN)
            .map_err(|err| GapError::detection(format!("generic pattern: {err}")))?;

        Ok(Self {
            config,
            kind_patterns,
            generic,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect every placeholder in canonical text, sorted by span start
    pub fn detect(&self, text: &str) -> Result<Vec<DetectedGap>> {
        if text.len() > self.config.max_input_bytes {
            return Err(GapError::detection(format!(
                "input is {} bytes, limit is {}",
                text.len(),
                self.config.max_input_bytes
            )));
        }

        let all_spans: Vec<Span> = self
            .generic
            .find_iter(text)
            .filter_map(|m| Span::new(m.start(), m.end()))
            .collect();

        let mut matches: Vec<(PlaceholderKind, Span, DetectionMethod)> = Vec::new();
        for (kind, regex) in &self.kind_patterns {
            for m in regex.find_iter(text) {
                if let Some(span) = Span::new(m.start(), m.end()) {
                    matches.push((*kind, span, DetectionMethod::KindPattern));
                }
            }
        }
        for span in &all_spans {
            if matches.iter().any(|(_, taken, _)| taken.overlaps(span)) {
                continue;
            }
            let name = &text[span.start + 1..span.end - 1];
            matches.push((
                PlaceholderKind::from_name(name),
                *span,
                DetectionMethod::GenericCatcher,
            ));
        }
        matches.sort_by_key(|(_, span, _)| span.start);

        let gaps: Vec<DetectedGap> = matches
            .into_iter()
            .map(|(kind, span, method)| self.build_gap(text, kind, span, method, &all_spans))
            .collect();

        log::debug!("detected {} gap(s)", gaps.len());
        Ok(gaps)
    }

    fn build_gap(
        &self,
        text: &str,
        kind: PlaceholderKind,
        span: Span,
        method: DetectionMethod,
        all_spans: &[Span],
    ) -> DetectedGap {
        let radius = self.config.context_radius;
        let (ws, we) = window_bounds(text, span, radius);

        let prose = normalize_whitespace(&format!("{} {}", &text[ws..span.start], &text[span.end..we]));
        let context_chars = prose.chars().count();

        let window_chars = text[ws..we].chars().count().max(1);
        let before_chars = text[ws..span.start].chars().count();
        let position = before_chars as f32 / window_chars as f32;

        let window = Span { start: ws, end: we };
        let co_occurring = all_spans
            .iter()
            .filter(|other| **other != span && window.overlaps(other))
            .count();

        let adj = &self.config.adjustments;
        let base = if method == DetectionMethod::KindPattern {
            kind.profile().base_confidence
        } else {
            PlaceholderKind::Custom.profile().base_confidence
        };
        let mut confidence = base;
        if context_chars < adj.short_context_chars {
            confidence *= adj.short_context_factor;
        }
        if context_chars > adj.long_context_chars {
            confidence *= adj.long_context_factor;
        }
        if position >= 1.0 - adj.tail_fraction {
            confidence *= adj.tail_position_factor;
        }
        if co_occurring >= adj.co_occurrence_min {
            confidence *= adj.co_occurrence_factor;
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("context_chars".to_string(), context_chars.to_string());
        metadata.insert("window_position".to_string(), format!("{position:.2}"));
        metadata.insert("co_occurring".to_string(), co_occurring.to_string());

        DetectedGap {
            kind,
            name: text[span.start + 1..span.end - 1].to_string(),
            span,
            local_context: centered_excerpt(text, span, radius, self.config.max_context_chars),
            confidence: clamp_unit(confidence),
            detection_method: method,
            validation_level: ValidationLevel::None,
            suggested_value: None,
            validation_score: None,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn detector() -> PatternDetector {
        PatternDetector::new(DetectorConfig::default()).unwrap()
    }

    #[test]
    fn finds_kind_and_generic_placeholders() {
        let text = "Use {tone} and {brand_voice} for {niche}.";
        let gaps = detector().detect(text).unwrap();
        let summary: Vec<_> = gaps
            .iter()
            .map(|g| (g.kind, g.name.as_str(), g.detection_method))
            .collect();
        assert_eq!(
            summary,
            vec![
                (PlaceholderKind::Tone, "tone", DetectionMethod::KindPattern),
                (
                    PlaceholderKind::Custom,
                    "brand_voice",
                    DetectionMethod::GenericCatcher
                ),
                (PlaceholderKind::Niche, "niche", DetectionMethod::KindPattern),
            ]
        );
    }

    #[test]
    fn padded_names_keep_span_correct() {
        let text = "Write { primary_keyword } now";
        let gaps = detector().detect(text).unwrap();
        assert_eq!(gaps.len(), 1);
        let gap = &gaps[0];
        assert_eq!(gap.kind, PlaceholderKind::PrimaryKeyword);
        assert_eq!(&text[gap.span.start..gap.span.end], gap.placeholder());
    }

    #[test]
    fn thin_context_lowers_confidence() {
        let gaps = detector().detect("{tone}").unwrap();
        // Base 0.92 with thin context (×0.9); start at 0 is not in the tail
        assert!((gaps[0].confidence - 0.92 * 0.9).abs() < 1e-5);
    }

    #[test]
    fn tail_position_raises_confidence_but_stays_bounded() {
        let text = format!("{} {{primary_keyword}}", "words ".repeat(40));
        let gaps = detector().detect(&text).unwrap();
        assert!((gaps[0].confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn oversized_input_fails_detection() {
        let config = DetectorConfig {
            max_input_bytes: 4,
            ..DetectorConfig::default()
        };
        let detector = PatternDetector::new(config).unwrap();
        assert!(matches!(
            detector.detect("{tone} text"),
            Err(GapError::Detection(_))
        ));
    }

    #[test]
    fn local_context_is_bounded() {
        let text = format!("{} {{tone}} {}", "a ".repeat(300), "b ".repeat(300));
        let gaps = detector().detect(&text).unwrap();
        assert!(gaps[0].local_context.chars().count() <= 200);
        assert!(gaps[0].local_context.contains("{tone}"));
    }
}
