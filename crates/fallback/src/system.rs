use gapfill_detector::BasicValidator;
use gapfill_model::lexicon::{
    lookup, topic_tone, Intent, Tone, TOPICS, TOPIC_AUDIENCES, TOPIC_CONTENT_TYPES,
};
use gapfill_model::{clamp_unit, DetectedGap, GapError, GapId, PlaceholderKind, Result, StageIssue};
use gapfill_semantic::{contextual_score, HeuristicBackend, SemanticContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{FallbackConfig, FallbackMode};
use crate::history::{HistorySnapshot, UsageHistory};

/// Quality ceiling for the generic last-resort token
const GENERIC_QUALITY_CAP: f32 = 0.45;
const GENERIC_CONFIDENCE: f32 = 0.3;

/// Where a fallback option came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Topic-keyed audience, tone and keyword tables
    Contextual,
    /// Keywords, topic and intent read straight from the gap context
    Semantic,
    /// The kind's static "most common" list
    Frequency,
    /// Values picked in earlier runs
    Historical,
    /// Per-kind generic token, used when every strategy came back empty
    Generic,
}

impl FallbackStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contextual => "contextual",
            Self::Semantic => "semantic",
            Self::Frequency => "frequency",
            Self::Historical => "historical",
            Self::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBucket {
    Minimal,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityBucket {
    #[must_use]
    pub fn from_quality(quality: f32) -> Self {
        if quality >= 0.95 {
            Self::Excellent
        } else if quality >= 0.85 {
            Self::Good
        } else if quality >= 0.70 {
            Self::Fair
        } else if quality >= 0.50 {
            Self::Poor
        } else {
            Self::Minimal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackOption {
    pub value: String,
    /// Basic-validator score of the value
    pub quality: f32,
    pub quality_bucket: QualityBucket,
    pub strategy: FallbackStrategy,
    pub confidence: f32,
    pub context_relevance: f32,
    pub reasoning: String,
    /// Filled on the selected option only: the other ranked values, best first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackResult {
    pub gap_ref: GapId,
    pub selected: FallbackOption,
    /// Ranked options, the selected one first
    pub options: Vec<FallbackOption>,
    /// Every strategy was empty and the generic token was used
    pub exhausted: bool,
    pub warnings: Vec<StageIssue>,
}

/// Unranked option produced by one strategy
struct Proposal {
    value: String,
    strategy: FallbackStrategy,
    confidence: f32,
    context_relevance: f32,
    reasoning: String,
}

/// Synthesizes ranked fill values for gaps that have no accepted match
#[derive(Debug)]
pub struct FallbackSystem {
    config: FallbackConfig,
    validator: Arc<BasicValidator>,
    history: UsageHistory,
}

impl FallbackSystem {
    pub fn new(config: FallbackConfig, validator: Arc<BasicValidator>) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        Ok(Self {
            history: UsageHistory::new(config.history_capacity),
            validator,
            config,
        })
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    pub fn history(&self) -> &UsageHistory {
        &self.history
    }

    /// Produce ranked options for `gap`. Never fails: when no strategy proposes anything the
    /// kind's generic token is returned with a `FallbackExhausted` warning.
    ///
    /// Without a `context` the gap's own local excerpt is classified.
    pub fn generate(&self, gap: &DetectedGap, context: Option<&SemanticContext>) -> FallbackResult {
        let derived;
        let context = match context {
            Some(context) => context,
            None => {
                derived =
                    SemanticContext::from_window(&gap.local_context, self.config.keyword_limit);
                &derived
            }
        };

        let mut proposals = Vec::new();
        for strategy in self.strategies() {
            let before = proposals.len();
            match strategy {
                FallbackStrategy::Contextual => self.contextual(gap.kind, context, &mut proposals),
                FallbackStrategy::Semantic => self.semantic(gap.kind, context, &mut proposals),
                FallbackStrategy::Frequency => self.frequency(gap.kind, &mut proposals),
                FallbackStrategy::Historical => self.historical(gap.kind, &mut proposals),
                FallbackStrategy::Generic => {}
            }
            log::trace!(
                "{} strategy proposed {} values for {}",
                strategy.as_str(),
                proposals.len() - before,
                gap.id()
            );
        }

        let mut options = self.rank(gap.kind, proposals);
        let mut warnings = Vec::new();
        let exhausted = options.is_empty();
        if exhausted {
            let err = GapError::FallbackExhausted {
                kind: gap.kind.as_str().to_string(),
            };
            log::warn!("{err} at {}", gap.span);
            warnings.push(StageIssue::from(&err));
            options.push(self.generic_option(gap.kind));
        }

        let alternatives: Vec<String> = options.iter().skip(1).map(|o| o.value.clone()).collect();
        let mut selected = options[0].clone();
        selected.alternatives = alternatives;
        if !exhausted && self.config.record_selection {
            self.history.record(gap.kind, &selected.value);
        }

        FallbackResult {
            gap_ref: gap.id(),
            selected,
            options,
            exhausted,
            warnings,
        }
    }

    /// Count an externally chosen value in the usage history
    pub fn record_selection(&self, kind: PlaceholderKind, value: &str) {
        if !value.trim().is_empty() {
            self.history.record(kind, value.trim());
        }
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    pub fn restore(&self, snapshot: &HistorySnapshot) {
        self.history.restore(snapshot);
    }

    fn strategies(&self) -> &'static [FallbackStrategy] {
        match self.config.mode {
            FallbackMode::Contextual => &[FallbackStrategy::Contextual],
            FallbackMode::Semantic => &[FallbackStrategy::Semantic],
            FallbackMode::Frequency => &[FallbackStrategy::Frequency],
            FallbackMode::Historical => &[FallbackStrategy::Historical],
            FallbackMode::Hybrid => &[
                FallbackStrategy::Contextual,
                FallbackStrategy::Semantic,
                FallbackStrategy::Frequency,
                FallbackStrategy::Historical,
            ],
        }
    }

    fn contextual(&self, kind: PlaceholderKind, context: &SemanticContext, out: &mut Vec<Proposal>) {
        let Some(topic) = context.topic.as_deref() else {
            return;
        };
        let profile = kind.profile();
        let values: Vec<String> = match kind {
            PlaceholderKind::TargetAudience => owned(lookup(TOPIC_AUDIENCES, topic)),
            PlaceholderKind::Tone => topic_tone(topic).map(str::to_string).into_iter().collect(),
            PlaceholderKind::ContentType => owned(lookup(TOPIC_CONTENT_TYPES, topic)),
            PlaceholderKind::SecondaryKeywords => lookup(TOPICS, topic)
                .map(|bag| vec![bag.iter().take(3).copied().collect::<Vec<_>>().join(", ")])
                .unwrap_or_default(),
            _ if profile.keyword_like => {
                let mut values = vec![topic.to_string()];
                values.extend(owned(lookup(TOPICS, topic)).into_iter().take(3));
                values
            }
            _ => Vec::new(),
        };
        for (rank, value) in values.into_iter().enumerate() {
            out.push(Proposal {
                reasoning: format!("typical {kind} for the '{topic}' topic"),
                value,
                strategy: FallbackStrategy::Contextual,
                confidence: self.config.confidence.contextual,
                context_relevance: clamp_unit(0.9 - 0.05 * rank as f32).max(0.5),
            });
        }
    }

    fn semantic(&self, kind: PlaceholderKind, context: &SemanticContext, out: &mut Vec<Proposal>) {
        let profile = kind.profile();
        let mut values: Vec<String> = Vec::new();
        match kind {
            PlaceholderKind::SecondaryKeywords => {
                if context.keywords.len() >= 2 {
                    values.push(context.keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", "));
                }
            }
            PlaceholderKind::TargetAudience => values.extend(context.target_audience.clone()),
            PlaceholderKind::Tone => {
                if context.tone != Tone::Neutral {
                    values.push(context.tone.as_str().to_string());
                }
            }
            PlaceholderKind::ContentType => {
                values.extend(context.content_type.clone());
                values.extend(intent_content_type(context.intent).map(str::to_string));
            }
            _ if profile.keyword_like || kind == PlaceholderKind::Custom => {
                values.extend(context.keywords.iter().take(3).cloned());
                values.extend(context.topic.clone());
            }
            _ => {}
        }
        for value in values {
            let overlap = contextual_score(&value, &context.window_text)
                .max(HeuristicBackend::score(&context.window_text, &value));
            out.push(Proposal {
                reasoning: format!("taken from the surrounding text (intent {})", context.intent.as_str()),
                value,
                strategy: FallbackStrategy::Semantic,
                confidence: self.config.confidence.semantic,
                context_relevance: clamp_unit(0.6 + 0.4 * overlap),
            });
        }
    }

    fn frequency(&self, kind: PlaceholderKind, out: &mut Vec<Proposal>) {
        for (rank, value) in kind.profile().fallback_pool.iter().enumerate() {
            out.push(Proposal {
                value: (*value).to_string(),
                strategy: FallbackStrategy::Frequency,
                confidence: self.config.confidence.frequency,
                context_relevance: clamp_unit(0.5 - 0.05 * rank as f32),
                reasoning: format!("common {kind} value (#{})", rank + 1),
            });
        }
    }

    fn historical(&self, kind: PlaceholderKind, out: &mut Vec<Proposal>) {
        let top = self.history.top(kind, self.config.max_options);
        let Some(max) = top.first().map(|(_, count)| *count) else {
            return;
        };
        for (value, count) in top {
            let share = count as f32 / max.max(1) as f32;
            out.push(Proposal {
                reasoning: format!("used {count} time(s) before"),
                value,
                strategy: FallbackStrategy::Historical,
                confidence: clamp_unit(self.config.confidence.historical + 0.3 * share),
                context_relevance: 0.5,
            });
        }
    }

    /// Score, dedupe case-insensitively keeping the best quality, sort by composite score
    fn rank(&self, kind: PlaceholderKind, proposals: Vec<Proposal>) -> Vec<FallbackOption> {
        let mut best: HashMap<String, FallbackOption> = HashMap::new();
        for proposal in proposals {
            let value = proposal.value.trim();
            if value.is_empty() {
                continue;
            }
            let quality = self.validator.validate(kind, value).validation_score;
            let option = FallbackOption {
                value: value.to_string(),
                quality,
                quality_bucket: QualityBucket::from_quality(quality),
                strategy: proposal.strategy,
                confidence: proposal.confidence,
                context_relevance: proposal.context_relevance,
                reasoning: proposal.reasoning,
                alternatives: Vec::new(),
            };
            let key = value.to_lowercase();
            let replace = best.get(&key).map_or(true, |current| {
                option.quality > current.quality
                    || (option.quality == current.quality
                        && self.composite(&option) > self.composite(current))
            });
            if replace {
                best.insert(key, option);
            }
        }

        let mut options: Vec<FallbackOption> = best.into_values().collect();
        options.sort_by(|a, b| {
            self.composite(b)
                .total_cmp(&self.composite(a))
                .then_with(|| a.value.cmp(&b.value))
        });
        options.truncate(self.config.max_options);
        options
    }

    fn composite(&self, option: &FallbackOption) -> f32 {
        let w = &self.config.ranking;
        w.quality * option.quality + w.confidence * option.confidence
            + w.context_relevance * option.context_relevance
    }

    fn generic_option(&self, kind: PlaceholderKind) -> FallbackOption {
        let value = kind.profile().generic_token;
        let quality = self
            .validator
            .validate(kind, value)
            .validation_score
            .min(GENERIC_QUALITY_CAP);
        FallbackOption {
            value: value.to_string(),
            quality,
            quality_bucket: QualityBucket::from_quality(quality),
            strategy: FallbackStrategy::Generic,
            confidence: GENERIC_CONFIDENCE,
            context_relevance: 0.0,
            reasoning: format!("no {kind} candidates; generic placeholder value"),
            alternatives: Vec::new(),
        }
    }
}

fn owned(bag: Option<&'static [&'static str]>) -> Vec<String> {
    bag.unwrap_or_default().iter().map(|v| (*v).to_string()).collect()
}

/// Content type that usually serves an intent
const fn intent_content_type(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::Instruct => Some("tutorial"),
        Intent::Compare => Some("review"),
        Intent::Persuade => Some("landing_page"),
        Intent::Entertain => Some("listicle"),
        Intent::Inform => Some("article"),
        Intent::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_model::{DetectionMethod, Span, ValidationLevel};
    use pretty_assertions::assert_eq;

    fn gap(kind: PlaceholderKind, name: &str, local_context: &str) -> DetectedGap {
        DetectedGap {
            kind,
            name: name.to_string(),
            span: Span { start: 0, end: name.len() + 2 },
            local_context: local_context.to_string(),
            confidence: 0.9,
            detection_method: DetectionMethod::KindPattern,
            validation_level: ValidationLevel::Basic,
            suggested_value: None,
            validation_score: None,
            metadata: Default::default(),
        }
    }

    fn system(mode: FallbackMode) -> FallbackSystem {
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
    fn quality_buckets_follow_thresholds() {
        assert_eq!(QualityBucket::from_quality(0.95), QualityBucket::Excellent);
        assert_eq!(QualityBucket::from_quality(0.9), QualityBucket::Good);
        assert_eq!(QualityBucket::from_quality(0.7), QualityBucket::Fair);
        assert_eq!(QualityBucket::from_quality(0.5), QualityBucket::Poor);
        assert_eq!(QualityBucket::from_quality(0.49), QualityBucket::Minimal);
    }

    #[test]
    fn frequency_mode_keeps_pool_order() {
        let fallback = system(FallbackMode::Frequency);
        let result = fallback.generate(&gap(PlaceholderKind::Length, "length", "{length}"), None);
        assert!(!result.exhausted);
        assert_eq!(result.selected.value, "1000");
        assert_eq!(result.selected.strategy, FallbackStrategy::Frequency);
        assert_eq!(result.options.len(), 5);
        assert_eq!(result.selected.alternatives.len(), 4);
    }

    #[test]
    fn custom_gap_without_context_gets_generic_token() {
        let fallback = system(FallbackMode::Hybrid);
        let result = fallback.generate(&gap(PlaceholderKind::Custom, "foo_bar", "{foo_bar}"), None);
        assert!(result.exhausted);
        assert_eq!(result.selected.value, "valor_padrão");
        assert_eq!(result.selected.strategy, FallbackStrategy::Generic);
        assert_eq!(result.selected.quality_bucket, QualityBucket::Minimal);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, gapfill_model::ErrorKind::FallbackExhausted);
        assert!(fallback.history().is_empty());
    }

    #[test]
    fn historical_mode_prefers_most_used_value() {
        let fallback = system(FallbackMode::Historical);
        for _ in 0..3 {
            fallback.record_selection(PlaceholderKind::Length, "2500");
        }
        fallback.record_selection(PlaceholderKind::Length, "900");
        let result = fallback.generate(&gap(PlaceholderKind::Length, "length", "{length}"), None);
        assert_eq!(result.selected.value, "2500");
        assert!((result.selected.confidence - 0.9).abs() < 1e-6);
        assert_eq!(result.options[1].value, "900");
        assert_eq!(fallback.history().count(PlaceholderKind::Length, "2500"), 4);
    }

    #[test]
    fn duplicates_collapse_to_one_option() {
        let fallback = system(FallbackMode::Hybrid);
        let context = SemanticContext::from_window("A marketing campaign plan for {tone} posts.", 10);
        let result = fallback.generate(&gap(PlaceholderKind::Tone, "tone", "{tone}"), Some(&context));
        let mut values: Vec<_> = result.options.iter().map(|o| o.value.to_lowercase()).collect();
        let total = values.len();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), total);
    }
}
