use gapfill_detector::BasicValidator;
use gapfill_model::lexicon::{lookup, topic_tone, Complexity, Tone, TOPIC_AUDIENCES, TOPIC_CONTENT_TYPES};
use gapfill_model::text::{content_hash, window_text};
use gapfill_model::{
    CacheStats, DetectedGap, GapError, PlaceholderKind, Result, Span, StageIssue, TtlCache,
    ValidationLevel,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::SemanticBackend;
use crate::config::AnalyzerConfig;
use crate::context::{context_relevance, intent_alignment, GeneralContext, SemanticContext};
use crate::implied::{detect_implied_gaps, ImpliedGap};

/// A detected gap enriched with the meaning of its surroundings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticGap {
    pub gap: DetectedGap,
    pub context: SemanticContext,
    pub semantic_confidence: f32,
    pub suggested_value: Option<String>,
    /// At most five values, best first, never repeating the suggestion
    pub alternatives: Vec<String>,
    pub validation_score: Option<f32>,
    pub context_relevance: f32,
    pub intent_alignment: f32,
}

/// Everything one analysis pass produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub semantic_gaps: Vec<SemanticGap>,
    pub implied_gaps: Vec<ImpliedGap>,
    pub warnings: Vec<StageIssue>,
}

/// Per-gap context classification and kind-driven suggestions
#[derive(Debug)]
pub struct SemanticAnalyzer {
    config: AnalyzerConfig,
    validator: Arc<BasicValidator>,
    backend_name: &'static str,
    model_backed: bool,
    contexts: TtlCache<(String, Span), SemanticContext>,
}

impl SemanticAnalyzer {
    pub fn new(
        config: AnalyzerConfig,
        validator: Arc<BasicValidator>,
        backend: &dyn SemanticBackend,
    ) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        Ok(Self {
            contexts: TtlCache::new(config.cache),
            backend_name: backend.name(),
            model_backed: backend.is_model_backed(),
            validator,
            config,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Warning carried by every run that has no model-backed similarity
    pub fn backend_warning(&self) -> Option<StageIssue> {
        if self.model_backed {
            return None;
        }
        let err = GapError::backend_unavailable(format!(
            "no embedding backend selected; semantic analysis uses {} heuristics",
            self.backend_name
        ));
        Some(StageIssue::from(err))
    }

    /// Context of one gap, cached by text hash and span
    pub fn context_for(&self, text: &str, text_hash: &str, gap: &DetectedGap) -> SemanticContext {
        let key = (text_hash.to_string(), gap.span);
        if let Some(cached) = self.contexts.get(&key) {
            return cached;
        }
        let window = window_text(text, gap.span, self.config.context_radius);
        let context = SemanticContext::from_window(&window, self.config.keyword_limit);
        self.contexts.insert(key, context.clone());
        context
    }

    pub fn analyze_gap(&self, text: &str, text_hash: &str, gap: &DetectedGap) -> SemanticGap {
        let context = self.context_for(text, text_hash, gap);
        let local = GeneralContext::from_text(&context.window_text);
        let relevance = context_relevance(gap.kind, &gap.name, &local);
        let alignment = intent_alignment(gap.kind, &[context.intent]);

        let mut candidates = suggestions(gap.kind, &context).into_iter();
        let suggested_value = candidates.next();
        let alternatives: Vec<String> = candidates.take(self.config.max_alternatives).collect();

        let validation_score = suggested_value
            .as_deref()
            .map(|value| self.validator.validate(gap.kind, value).validation_score);

        let mut enriched = gap.clone();
        enriched.validation_level = enriched.validation_level.max(ValidationLevel::Semantic);
        enriched.suggested_value.clone_from(&suggested_value);
        enriched.validation_score = validation_score;

        SemanticGap {
            gap: enriched,
            semantic_confidence: (relevance + alignment) / 2.0,
            suggested_value,
            alternatives,
            validation_score,
            context_relevance: relevance,
            intent_alignment: alignment,
            context,
        }
    }

    pub fn implied_gaps(&self, text: &str, detected: &[DetectedGap]) -> Vec<ImpliedGap> {
        if !self.config.detect_implied_gaps {
            return Vec::new();
        }
        detect_implied_gaps(text, detected, &self.config.implied)
    }

    /// Sequential pass over every gap
    pub fn analyze(&self, text: &str, gaps: &[DetectedGap]) -> AnalysisOutput {
        let hash = content_hash(text);
        let semantic_gaps = gaps
            .iter()
            .map(|gap| self.analyze_gap(text, &hash, gap))
            .collect();
        AnalysisOutput {
            semantic_gaps,
            implied_gaps: self.implied_gaps(text, gaps),
            warnings: self.backend_warning().into_iter().collect(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.contexts.stats()
    }

    pub fn clear_cache(&self) {
        self.contexts.clear();
    }
}

/// Candidate values for a kind, best first, deduplicated
#[must_use]
pub fn suggestions(kind: PlaceholderKind, context: &SemanticContext) -> Vec<String> {
    let profile = kind.profile();
    let topic = context.topic.as_deref();
    let mut values: Vec<String> = Vec::new();

    match kind {
        PlaceholderKind::PrimaryKeyword | PlaceholderKind::Custom => {
            values.extend(context.keywords.iter().take(3).cloned());
            values.extend(topic.map(str::to_string));
        }
        PlaceholderKind::SecondaryKeywords => {
            if context.keywords.len() >= 2 {
                values.push(context.keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", "));
            }
        }
        PlaceholderKind::Categoria | PlaceholderKind::Niche | PlaceholderKind::ClusterName => {
            values.extend(topic.map(str::to_string));
            values.extend(context.keywords.iter().take(2).cloned());
        }
        PlaceholderKind::ContentType => {
            values.extend(context.content_type.clone());
            if let Some(types) = topic.and_then(|t| lookup(TOPIC_CONTENT_TYPES, t)) {
                values.extend(types.iter().map(|v| (*v).to_string()));
            }
        }
        PlaceholderKind::Tone => {
            if context.tone != Tone::Neutral {
                values.push(context.tone.as_str().to_string());
            }
            values.extend(topic.and_then(topic_tone).map(str::to_string));
        }
        PlaceholderKind::TargetAudience => {
            values.extend(context.target_audience.clone());
            if let Some(audiences) = topic.and_then(|t| lookup(TOPIC_AUDIENCES, t)) {
                values.extend(audiences.iter().map(|v| (*v).to_string()));
            }
        }
        PlaceholderKind::Length => {
            values.push(length_for(context.content_type.as_deref(), context.complexity).to_string());
        }
        PlaceholderKind::ClusterId => {}
    }
    values.extend(profile.fallback_pool.iter().map(|v| (*v).to_string()));

    let mut seen = std::collections::HashSet::new();
    values.retain(|value| !value.trim().is_empty() && seen.insert(value.to_lowercase()));
    values
}

/// Word count suited to a content type, falling back to text complexity
fn length_for(content_type: Option<&str>, complexity: Complexity) -> &'static str {
    match content_type {
        Some("listicle" | "social_post" | "product_description" | "newsletter") => "800",
        Some("blog_post" | "article" | "review") => "1200",
        Some("guide" | "tutorial" | "landing_page") => "1500",
        _ => match complexity {
            Complexity::Low => "800",
            Complexity::Medium => "1200",
            Complexity::High => "2000",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendConfig, BackendKind, HashingEmbeddingBackend, HeuristicBackend};
    use gapfill_detector::{DetectorConfig, PatternDetector};
    use pretty_assertions::assert_eq;

    fn analyzer() -> SemanticAnalyzer {
        SemanticAnalyzer::new(
            AnalyzerConfig::default(),
            Arc::new(BasicValidator::default()),
            &HeuristicBackend,
        )
        .unwrap()
    }

    fn gaps(text: &str) -> Vec<DetectedGap> {
        PatternDetector::new(DetectorConfig::default())
            .unwrap()
            .detect(text)
            .unwrap()
    }

    #[test]
    fn primary_keyword_suggests_top_keyword() {
        let text = "Create a digital marketing strategy post about {primary_keyword}. Marketing matters.";
        let output = analyzer().analyze(text, &gaps(text));
        let gap = &output.semantic_gaps[0];
        assert_eq!(gap.suggested_value.as_deref(), Some("marketing"));
        assert_eq!(gap.context.topic.as_deref(), Some("marketing"));
        assert!(gap.alternatives.len() <= 5);
        assert!(!gap.alternatives.contains(&"marketing".to_string()));
        assert_eq!(gap.gap.validation_level, ValidationLevel::Semantic);
        assert!(gap.validation_score.is_some_and(|s| s > 0.9));
    }

    #[test]
    fn audience_and_tone_follow_topic_tables() {
        let text = "A fitness plan for {target_audience} in a {tone} voice.";
        let output = analyzer().analyze(text, &gaps(text));
        let audience = &output.semantic_gaps[0];
        assert_eq!(audience.suggested_value.as_deref(), Some("health-conscious adults"));
        let tone = &output.semantic_gaps[1];
        assert_eq!(tone.suggested_value.as_deref(), Some("friendly"));
    }

    #[test]
    fn length_follows_content_type() {
        let text = "Write a step by step tutorial of {length} words on cloud code.";
        let output = analyzer().analyze(text, &gaps(text));
        assert_eq!(output.semantic_gaps[0].suggested_value.as_deref(), Some("1500"));
    }

    #[test]
    fn heuristic_backend_adds_warning() {
        let text = "About {niche}.";
        let output = analyzer().analyze(text, &gaps(text));
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(
            output.warnings[0].kind,
            gapfill_model::ErrorKind::SemanticBackendUnavailable
        );

        let hashing = HashingEmbeddingBackend::new(&BackendConfig {
            kind: BackendKind::Hashing,
            ..BackendConfig::default()
        })
        .unwrap();
        let analyzer = SemanticAnalyzer::new(
            AnalyzerConfig::default(),
            Arc::new(BasicValidator::default()),
            &hashing,
        )
        .unwrap();
        assert!(analyzer.analyze(text, &gaps(text)).warnings.is_empty());
    }

    #[test]
    fn contexts_are_cached_per_span() {
        let analyzer = analyzer();
        let text = "Marketing plan for {target_audience}.";
        let detected = gaps(text);
        analyzer.analyze(text, &detected);
        analyzer.analyze(text, &detected);
        assert_eq!(analyzer.cache_stats().hits, 1);
    }

    #[test]
    fn scores_are_bounded() {
        let text = "{custom_field} {primary_keyword} {cluster_id}";
        for gap in analyzer().analyze(text, &gaps(text)).semantic_gaps {
            for score in [gap.semantic_confidence, gap.context_relevance, gap.intent_alignment] {
                assert!((0.0..=1.0).contains(&score));
            }
        }
    }
}
