//! Gaps implied by the prose itself rather than marked with a placeholder.

use gapfill_model::lexicon::{
    Signals, ACTION_VERBS, CASUAL_MARKERS, FORMAL_MARKERS, PREPOSITIONS, REFERENCE_TERMS,
};
use gapfill_model::text::{split_sentences, tokenize, Sentence};
use gapfill_model::{clamp_unit, DetectedGap, Span};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ImpliedGapConfig;
use crate::context::extract_entities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpliedGapKind {
    /// Sentence closes on an action verb or preposition
    IncompleteSentence,
    /// Entity named with too little surrounding detail
    UnderspecifiedEntity,
    /// Paragraph opens with a pronoun or demonstrative
    AmbiguousReference,
    /// Formal and casual registers mixed
    ToneInconsistency,
    /// Question or request for detail left unanswered
    DetailRequest,
}

impl ImpliedGapKind {
    #[must_use]
    pub const fn base_confidence(self) -> f32 {
        match self {
            Self::IncompleteSentence => 0.75,
            Self::UnderspecifiedEntity => 0.6,
            Self::AmbiguousReference => 0.65,
            Self::ToneInconsistency | Self::DetailRequest => 0.7,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncompleteSentence => "incomplete_sentence",
            Self::UnderspecifiedEntity => "underspecified_entity",
            Self::AmbiguousReference => "ambiguous_reference",
            Self::ToneInconsistency => "tone_inconsistency",
            Self::DetailRequest => "detail_request",
        }
    }
}

/// A prose gap; kept apart from [`DetectedGap`] because its span is not a placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpliedGap {
    pub kind: ImpliedGapKind,
    pub span: Span,
    pub excerpt: String,
    pub confidence: f32,
    pub suggestion: String,
}

static DETAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:specify|especifique|how many|how much|quantos|quantas|where|when|how|why|onde|quando|como)\b",
    )
    .expect("valid detail regex")
});

static SPECIFY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:specify|especifique)\b").expect("valid specify regex"));

struct Candidate {
    kind: ImpliedGapKind,
    span: Span,
    excerpt: String,
    suggestion: String,
    words: usize,
}

/// Find implied gaps in `text`, skipping any within reach of a detected placeholder
#[must_use]
pub fn detect_implied_gaps(
    text: &str,
    detected: &[DetectedGap],
    config: &ImpliedGapConfig,
) -> Vec<ImpliedGap> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    incomplete_sentences(&sentences, &mut candidates);
    underspecified_entities(text, &sentences, config, &mut candidates);
    ambiguous_references(&sentences, &mut candidates);
    tone_inconsistency(&sentences, config, &mut candidates);
    detail_requests(&sentences, &mut candidates);

    let mut per_kind: HashMap<ImpliedGapKind, usize> = HashMap::new();
    for candidate in &candidates {
        *per_kind.entry(candidate.kind).or_default() += 1;
    }

    let text_len = text.len().max(1);
    let mut gaps: Vec<ImpliedGap> = candidates
        .into_iter()
        .filter(|candidate| {
            !detected
                .iter()
                .any(|gap| gap.span.distance(&candidate.span) <= config.duplicate_distance)
        })
        .map(|candidate| {
            let mut confidence = candidate.kind.base_confidence();
            if candidate.words >= 8 {
                confidence += 0.05;
            }
            if candidate.span.start as f32 / text_len as f32 >= 0.5 {
                confidence += 0.05;
            }
            let repeats = per_kind.get(&candidate.kind).copied().unwrap_or(1);
            confidence -= 0.05 * repeats.saturating_sub(1) as f32;
            ImpliedGap {
                kind: candidate.kind,
                span: candidate.span,
                excerpt: candidate.excerpt,
                confidence: clamp_unit(
                    confidence.clamp(config.min_confidence, config.max_confidence),
                ),
                suggestion: candidate.suggestion,
            }
        })
        .collect();

    gaps.sort_by_key(|gap| (gap.span.start, gap.span.end));
    gaps
}

fn sentence_span(sentence: &Sentence<'_>) -> Option<Span> {
    Span::new(sentence.start, sentence.end)
}

fn incomplete_sentences(sentences: &[Sentence<'_>], out: &mut Vec<Candidate>) {
    for sentence in sentences {
        let body = sentence.text.trim_end_matches(['.', '!', '?', ':', ';', ',']);
        if body.ends_with('}') {
            continue;
        }
        let tokens = tokenize(body);
        let Some(last) = tokens.last() else {
            continue;
        };
        let dangling = ACTION_VERBS.contains(&last.as_str())
            || PREPOSITIONS.contains(&last.as_str());
        if !dangling {
            continue;
        }
        if let Some(span) = sentence_span(sentence) {
            out.push(Candidate {
                kind: ImpliedGapKind::IncompleteSentence,
                span,
                excerpt: sentence.text.to_string(),
                suggestion: format!("Complete the sentence after '{last}'"),
                words: tokens.len(),
            });
        }
    }
}

fn underspecified_entities(
    text: &str,
    sentences: &[Sentence<'_>],
    config: &ImpliedGapConfig,
    out: &mut Vec<Candidate>,
) {
    let mut paragraphs: Vec<(usize, usize)> = Vec::new();
    for sentence in sentences {
        match paragraphs.last_mut() {
            Some(last) if sentence.index > 0 => last.1 = sentence.end,
            _ => paragraphs.push((sentence.start, sentence.end)),
        }
    }

    for (start, end) in paragraphs {
        let paragraph = &text[start..end];
        if paragraph.chars().count() >= config.entity_context_chars {
            continue;
        }
        for entity in extract_entities(paragraph) {
            let Some(span) = Span::new(start + entity.start, start + entity.end) else {
                continue;
            };
            out.push(Candidate {
                kind: ImpliedGapKind::UnderspecifiedEntity,
                span,
                excerpt: paragraph.to_string(),
                suggestion: format!("Add detail about '{}'", entity.text),
                words: tokenize(paragraph).len(),
            });
        }
    }
}

fn ambiguous_references(sentences: &[Sentence<'_>], out: &mut Vec<Candidate>) {
    for sentence in sentences.iter().filter(|s| s.opens_paragraph()) {
        let Some(first) = tokenize(sentence.text).into_iter().next() else {
            continue;
        };
        if !REFERENCE_TERMS.contains(&first.as_str()) {
            continue;
        }
        let lead = sentence.text.len() - sentence.text.trim_start_matches(|c: char| !c.is_alphanumeric()).len();
        let word_end = sentence.start + lead + first.len();
        if let Some(span) = Span::new(sentence.start + lead, word_end.min(sentence.end)) {
            out.push(Candidate {
                kind: ImpliedGapKind::AmbiguousReference,
                span,
                excerpt: sentence.text.to_string(),
                suggestion: format!("Say what '{first}' refers to"),
                words: tokenize(sentence.text).len(),
            });
        }
    }
}

fn tone_inconsistency(
    sentences: &[Sentence<'_>],
    config: &ImpliedGapConfig,
    out: &mut Vec<Candidate>,
) {
    let mut formal = 0usize;
    let mut casual = 0usize;
    let mut per_sentence = Vec::with_capacity(sentences.len());
    for sentence in sentences {
        let signals = Signals::new(sentence.text);
        let f = signals.bag_occurrences(FORMAL_MARKERS);
        let c = signals.bag_occurrences(CASUAL_MARKERS);
        formal += f;
        casual += c;
        per_sentence.push((f, c));
    }
    let total = formal + casual;
    if formal == 0 || casual == 0 {
        return;
    }
    let minority = formal.min(casual);
    let ratio = minority as f32 / total as f32;
    if ratio <= config.tone_minority_ratio {
        return;
    }
    let minority_is_casual = casual <= formal;
    let position = per_sentence
        .iter()
        .position(|(f, c)| if minority_is_casual { *c > 0 } else { *f > 0 });
    let Some(sentence) = position.and_then(|idx| sentences.get(idx)) else {
        return;
    };
    if let Some(span) = sentence_span(sentence) {
        let register = if minority_is_casual { "casual" } else { "formal" };
        out.push(Candidate {
            kind: ImpliedGapKind::ToneInconsistency,
            span,
            excerpt: sentence.text.to_string(),
            suggestion: format!(
                "Settle on one register; {:.0}% of tone markers are {register}",
                ratio * 100.0
            ),
            words: tokenize(sentence.text).len(),
        });
    }
}

fn detail_requests(sentences: &[Sentence<'_>], out: &mut Vec<Candidate>) {
    for (idx, sentence) in sentences.iter().enumerate() {
        if sentence.text.contains('{') || !DETAIL_RE.is_match(sentence.text) {
            continue;
        }
        let asks = sentence.text.ends_with('?')
            || sentence.text.ends_with(':')
            || SPECIFY_RE.is_match(sentence.text);
        if !asks {
            continue;
        }
        let answered = sentences
            .get(idx + 1)
            .is_some_and(|next| next.paragraph == sentence.paragraph);
        if answered {
            continue;
        }
        if let Some(span) = sentence_span(sentence) {
            out.push(Candidate {
                kind: ImpliedGapKind::DetailRequest,
                span,
                excerpt: sentence.text.to_string(),
                suggestion: "Provide the requested detail or add a placeholder for it".to_string(),
                words: tokenize(sentence.text).len(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_model::{DetectionMethod, PlaceholderKind, ValidationLevel};
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<ImpliedGapKind> {
        detect_implied_gaps(text, &[], &ImpliedGapConfig::default())
            .into_iter()
            .map(|gap| gap.kind)
            .collect()
    }

    #[test]
    fn dangling_preposition_is_incomplete() {
        let gaps = detect_implied_gaps(
            "Write a detailed post about.",
            &[],
            &ImpliedGapConfig::default(),
        );
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].kind, ImpliedGapKind::IncompleteSentence);
        assert_eq!(gaps[0].span, Span { start: 0, end: 28 });
    }

    #[test]
    fn placeholder_closes_sentence() {
        assert!(kinds("Create content for {target_audience}.").is_empty());
    }

    #[test]
    fn paragraph_opening_reference_is_ambiguous() {
        let found = kinds("The launch went well overall and sales grew.\n\nThis should be repeated.");
        assert_eq!(found, vec![ImpliedGapKind::AmbiguousReference]);
    }

    #[test]
    fn unanswered_request_for_detail() {
        let found = kinds("Please specify the monthly budget:");
        assert_eq!(found, vec![ImpliedGapKind::DetailRequest]);
        // An answer in the same paragraph resolves it
        assert!(kinds("How many posts per week? Three posts per week.").is_empty());
    }

    #[test]
    fn mixed_register_is_flagged_once() {
        let found = kinds("Therefore, regarding pricing, we proceed. Hey guys, this is cool stuff!");
        assert_eq!(found, vec![ImpliedGapKind::ToneInconsistency]);
    }

    #[test]
    fn short_paragraph_entity_is_underspecified() {
        let gaps = detect_implied_gaps("Partner with Acme Corp.", &[], &ImpliedGapConfig::default());
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].kind, ImpliedGapKind::UnderspecifiedEntity);
        assert!(gaps[0].suggestion.contains("Acme Corp"));
    }

    #[test]
    fn gaps_near_placeholders_are_dropped() {
        let text = "Write a post about. {primary_keyword}";
        let detected = DetectedGap {
            kind: PlaceholderKind::PrimaryKeyword,
            name: "primary_keyword".to_string(),
            span: Span { start: 20, end: 37 },
            local_context: text.to_string(),
            confidence: 0.98,
            detection_method: DetectionMethod::KindPattern,
            validation_level: ValidationLevel::None,
            suggested_value: None,
            validation_score: None,
            metadata: Default::default(),
        };
        let gaps = detect_implied_gaps(text, &[detected], &ImpliedGapConfig::default());
        assert!(gaps.is_empty());
    }

    #[test]
    fn confidence_stays_in_band() {
        let text = "Write about. Describe the plan for. Explain the idea to. Add it to.";
        for gap in detect_implied_gaps(text, &[], &ImpliedGapConfig::default()) {
            assert!((0.6..=0.8).contains(&gap.confidence), "{}", gap.confidence);
        }
    }
}
