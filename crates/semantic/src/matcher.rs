//! Ranks fill-in candidates for a gap by blended similarity.
//!
//! Three axes are scored per candidate and blended into a hybrid score:
//!
//! ```text
//! semantic    backend similarity to the gap's context keywords
//! contextual  topic overlap with an expanded window around the gap
//! keyword     rank- and length-weighted bigram similarity to each keyword
//! ```

use gapfill_model::lexicon::{Signals, AUDIENCES, CONTENT_TYPES};
use gapfill_model::text::{
    bigram_similarity, content_hash, content_tokens, jaccard, strip_placeholders, token_set,
    window_text,
};
use gapfill_model::{
    clamp_unit, CacheStats, DetectedGap, GapError, GapId, PlaceholderKind, Result, StageIssue,
    TtlCache, TONE_VALUES,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{HeuristicBackend, SemanticBackend};
use crate::config::MatcherConfig;
use crate::context::SemanticContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Semantic,
    Contextual,
    Keyword,
    Hybrid,
    Fallback,
}

impl MatchStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Contextual => "contextual",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
            Self::Fallback => "fallback",
        }
    }
}

/// One candidate with its per-axis scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub value: String,
    pub semantic: f32,
    pub contextual: f32,
    pub keyword: f32,
    pub hybrid: f32,
    pub strategy: MatchStrategy,
    pub confidence: f32,
}

/// An accepted match for a gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub gap_ref: GapId,
    pub suggested_value: String,
    /// Hybrid score of the accepted candidate
    pub match_quality: f32,
    pub strategy: MatchStrategy,
    pub confidence: f32,
    /// Semantic axis score
    pub relevance: f32,
    /// Contextual axis score
    pub context_alignment: f32,
    pub alternatives: Vec<(String, f32)>,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub gap_ref: GapId,
    pub accepted: Option<SemanticMatch>,
    /// Every scored candidate, best first
    pub ranked: Vec<ScoredCandidate>,
    pub filtered_out: Vec<String>,
    pub reasoning: String,
    pub warnings: Vec<StageIssue>,
}

impl MatchOutcome {
    #[must_use]
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.ranked.first()
    }
}

type MatchKey = (String, GapId, String);

/// Candidate ranking against a gap's context
#[derive(Debug)]
pub struct SemanticMatcher {
    config: MatcherConfig,
    backend: Arc<dyn SemanticBackend>,
    cache: TtlCache<MatchKey, MatchOutcome>,
}

impl SemanticMatcher {
    pub fn new(config: MatcherConfig, backend: Arc<dyn SemanticBackend>) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        Ok(Self {
            cache: TtlCache::new(config.cache),
            backend,
            config,
        })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn SemanticBackend> {
        &self.backend
    }

    /// Rank `candidates` (or candidates derived from the context) for `gap`.
    ///
    /// A best candidate below `similarity_threshold` is ranked but not accepted; the outcome
    /// then carries a `NoAcceptedMatch` warning.
    pub async fn match_gap(
        &self,
        text: &str,
        gap: &DetectedGap,
        context: &SemanticContext,
        candidates: Option<&[String]>,
    ) -> MatchOutcome {
        let pool: Vec<String> = match candidates {
            Some(values) => values.to_vec(),
            None => derive_candidates(gap.kind, context),
        };
        let key = (content_hash(text), gap.id(), pool.join("\u{1f}"));
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let outcome = self.rank(text, gap, context, pool).await;
        self.cache.insert(key, outcome.clone());
        outcome
    }

    async fn rank(
        &self,
        text: &str,
        gap: &DetectedGap,
        context: &SemanticContext,
        pool: Vec<String>,
    ) -> MatchOutcome {
        let gap_ref = gap.id();
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let pool: Vec<String> = pool
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| seen.insert(value.to_lowercase()))
            .collect();

        let (kept, filtered_out): (Vec<String>, Vec<String>) = pool
            .iter()
            .cloned()
            .partition(|value| self.passes_filters(value, context));

        let (scoring, forced_fallback) = if kept.is_empty() {
            let usable: Vec<String> = pool
                .iter()
                .filter(|value| self.is_usable(value))
                .cloned()
                .collect();
            (usable, true)
        } else {
            (kept, false)
        };

        if scoring.is_empty() {
            let err = GapError::NoAcceptedMatch {
                gap: gap.placeholder(),
            };
            warnings.push(StageIssue::from(&err));
            return MatchOutcome {
                gap_ref,
                accepted: None,
                ranked: Vec::new(),
                filtered_out,
                reasoning: "no usable candidates".to_string(),
                warnings,
            };
        }

        let expanded = strip_placeholders(&window_text(text, gap.span, self.config.expanded_radius));
        let semantic = self.semantic_scores(context, &scoring, &mut warnings).await;

        let mut ranked: Vec<ScoredCandidate> = scoring
            .iter()
            .zip(semantic)
            .map(|(value, semantic)| {
                let contextual = contextual_score(value, &expanded);
                let keyword = keyword_score(value, &context.keywords);
                self.finish(value, semantic, contextual, keyword, forced_fallback)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.hybrid
                .partial_cmp(&a.hybrid)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.value.cmp(&b.value))
        });

        let best = &ranked[0];
        let reasoning = format!(
            "best '{}' via {} (semantic {:.2}, contextual {:.2}, keyword {:.2}, hybrid {:.2}); {} filtered",
            best.value,
            best.strategy.as_str(),
            best.semantic,
            best.contextual,
            best.keyword,
            best.hybrid,
            filtered_out.len()
        );

        let accepted = if best.hybrid >= self.config.similarity_threshold {
            Some(SemanticMatch {
                gap_ref,
                suggested_value: best.value.clone(),
                match_quality: best.hybrid,
                strategy: best.strategy,
                confidence: best.confidence,
                relevance: best.semantic,
                context_alignment: best.contextual,
                alternatives: ranked
                    .iter()
                    .skip(1)
                    .take(self.config.max_alternatives)
                    .map(|c| (c.value.clone(), c.hybrid))
                    .collect(),
                reasoning: reasoning.clone(),
            })
        } else {
            let err = GapError::NoAcceptedMatch {
                gap: gap.placeholder(),
            };
            log::debug!("{err}: best hybrid {:.2}", best.hybrid);
            warnings.push(StageIssue::from(&err));
            None
        };

        MatchOutcome {
            gap_ref,
            accepted,
            ranked,
            filtered_out,
            reasoning,
            warnings,
        }
    }

    /// Score one candidate without filters or caching
    pub async fn score_candidate(
        &self,
        text: &str,
        gap: &DetectedGap,
        context: &SemanticContext,
        value: &str,
    ) -> ScoredCandidate {
        let mut warnings = Vec::new();
        let candidates = [value.to_string()];
        let semantic = self
            .semantic_scores(context, &candidates, &mut warnings)
            .await
            .first()
            .copied()
            .unwrap_or(0.0);
        let expanded = strip_placeholders(&window_text(text, gap.span, self.config.expanded_radius));
        let contextual = contextual_score(value, &expanded);
        let keyword = keyword_score(value, &context.keywords);
        self.finish(value, semantic, contextual, keyword, false)
    }

    async fn semantic_scores(
        &self,
        context: &SemanticContext,
        candidates: &[String],
        warnings: &mut Vec<StageIssue>,
    ) -> Vec<f32> {
        let query = if context.keywords.is_empty() {
            context.window_text.clone()
        } else {
            context.keywords.join(" ")
        };
        let timeout = Duration::from_millis(self.config.backend.timeout_ms);
        let call = self.backend.similarities(&query, candidates);
        let failure = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(scores)) if scores.len() == candidates.len() => {
                return scores.into_iter().map(clamp_unit).collect();
            }
            Ok(Ok(scores)) => GapError::backend_unavailable(format!(
                "{} returned {} scores for {} candidates",
                self.backend.name(),
                scores.len(),
                candidates.len()
            )),
            Ok(Err(err)) => err,
            Err(_) => GapError::backend_unavailable(format!(
                "{} timed out after {}ms",
                self.backend.name(),
                self.config.backend.timeout_ms
            )),
        };
        log::warn!("{failure}; scoring with word overlap");
        warnings.push(StageIssue::from(&failure));
        candidates
            .iter()
            .map(|candidate| HeuristicBackend::score(&query, candidate))
            .collect()
    }

    fn finish(
        &self,
        value: &str,
        semantic: f32,
        contextual: f32,
        keyword: f32,
        forced_fallback: bool,
    ) -> ScoredCandidate {
        let weights = &self.config.weights;
        let hybrid = clamp_unit(
            weights.semantic * semantic + weights.contextual * contextual + weights.keyword * keyword,
        );
        let strategy = if forced_fallback {
            MatchStrategy::Fallback
        } else {
            self.strategy_for(semantic, contextual, keyword, hybrid)
        };
        let boosts = &self.config.boosts;
        let boost = match strategy {
            MatchStrategy::Semantic => boosts.semantic,
            MatchStrategy::Contextual => boosts.contextual,
            MatchStrategy::Keyword => boosts.keyword,
            MatchStrategy::Hybrid => boosts.hybrid,
            MatchStrategy::Fallback => boosts.fallback,
        };
        ScoredCandidate {
            value: value.to_string(),
            semantic,
            contextual,
            keyword,
            hybrid,
            strategy,
            confidence: clamp_unit(hybrid * boost),
        }
    }

    fn strategy_for(&self, semantic: f32, contextual: f32, keyword: f32, hybrid: f32) -> MatchStrategy {
        let t = &self.config.thresholds;
        if semantic >= t.semantic {
            MatchStrategy::Semantic
        } else if contextual >= t.contextual {
            MatchStrategy::Contextual
        } else if keyword >= t.keyword {
            MatchStrategy::Keyword
        } else if hybrid >= t.hybrid {
            MatchStrategy::Hybrid
        } else {
            MatchStrategy::Fallback
        }
    }

    fn is_usable(&self, value: &str) -> bool {
        !value.is_empty()
            && value.chars().count() <= self.config.max_candidate_chars
            && value.chars().any(char::is_alphanumeric)
    }

    fn passes_filters(&self, value: &str, context: &SemanticContext) -> bool {
        if !self.is_usable(value) {
            return false;
        }
        if context.keywords.is_empty() {
            return true;
        }
        let mean_len = context
            .keywords
            .iter()
            .map(|k| k.chars().count())
            .sum::<usize>() as f32
            / context.keywords.len() as f32;
        let ratio = value.chars().count() as f32 / mean_len.max(1.0);
        if ratio < self.config.min_length_ratio || ratio > self.config.max_length_ratio {
            return false;
        }
        let keywords: HashSet<String> = context.keywords.iter().cloned().collect();
        jaccard(&token_set(value), &keywords) >= self.config.min_keyword_overlap
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Candidates implied by the context and the kind's pool
#[must_use]
pub fn derive_candidates(kind: PlaceholderKind, context: &SemanticContext) -> Vec<String> {
    let profile = kind.profile();
    let mut values: Vec<String> = Vec::new();
    if profile.keyword_like || kind == PlaceholderKind::Custom {
        values.extend(context.keywords.iter().take(5).cloned());
        values.extend(context.topic.clone());
    }
    if profile.audience_like {
        values.extend(context.target_audience.clone());
        values.extend(AUDIENCES.iter().map(|(label, _)| (*label).to_string()));
    }
    match kind {
        PlaceholderKind::Tone => {
            values.push(context.tone.as_str().to_string());
            values.extend(TONE_VALUES.iter().map(|v| (*v).to_string()));
        }
        PlaceholderKind::ContentType => {
            values.extend(context.content_type.clone());
            values.extend(CONTENT_TYPES.iter().map(|(label, _)| (*label).to_string()));
        }
        _ => {}
    }
    values.extend(profile.fallback_pool.iter().map(|v| (*v).to_string()));
    values
}

/// Topic-label overlap with the window; token overlap when the candidate names no topic
#[must_use]
pub fn contextual_score(value: &str, window: &str) -> f32 {
    let candidate_topics: HashSet<&str> = Signals::new(value).topics().into_iter().collect();
    if candidate_topics.is_empty() {
        return jaccard(&token_set(value), &token_set(window));
    }
    let window_topics: HashSet<&str> = Signals::new(window).topics().into_iter().collect();
    jaccard(&candidate_topics, &window_topics)
}

/// Mean over candidate tokens of the best weighted bigram similarity to any keyword.
///
/// Keyword `i` of `n` weighs `(1 - i / 2n) * min(1, 0.5 + len / 16)`: earlier (more frequent)
/// and longer keywords count more.
#[must_use]
pub fn keyword_score(value: &str, keywords: &[String]) -> f32 {
    let tokens = content_tokens(value);
    if tokens.is_empty() || keywords.is_empty() {
        return 0.0;
    }
    let n = keywords.len() as f32;
    let total: f32 = tokens
        .iter()
        .map(|token| {
            keywords
                .iter()
                .enumerate()
                .map(|(rank, keyword)| {
                    let frequency_weight = 1.0 - rank as f32 / (2.0 * n);
                    let length_weight = (0.5 + keyword.chars().count() as f32 / 16.0).min(1.0);
                    bigram_similarity(token, keyword) * frequency_weight * length_weight
                })
                .fold(0.0f32, f32::max)
        })
        .sum();
    clamp_unit(total / tokens.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gapfill_model::{DetectionMethod, Span, ValidationLevel};

    fn gap_in(text: &str, name: &str) -> DetectedGap {
        let placeholder = format!("{{{name}}}");
        let start = text.find(&placeholder).unwrap();
        DetectedGap {
            kind: PlaceholderKind::from_name(name),
            name: name.to_string(),
            span: Span::new(start, start + placeholder.len()).unwrap(),
            local_context: String::new(),
            confidence: 0.98,
            detection_method: DetectionMethod::KindPattern,
            validation_level: ValidationLevel::None,
            suggested_value: None,
            validation_score: None,
            metadata: Default::default(),
        }
    }

    fn matcher() -> SemanticMatcher {
        SemanticMatcher::new(MatcherConfig::default(), Arc::new(HeuristicBackend)).unwrap()
    }

    #[test]
    fn keyword_score_weights_rank() {
        let keywords = vec!["marketing".to_string(), "digital".to_string()];
        let first = keyword_score("marketing", &keywords);
        let second = keyword_score("digital", &keywords);
        assert!((first - 1.0).abs() < 1e-6);
        assert!((second - 0.75 * (0.5 + 7.0 / 16.0)).abs() < 1e-6);
        assert_eq!(keyword_score("", &keywords), 0.0);
    }

    #[test]
    fn contextual_score_compares_topics() {
        let window = "a digital marketing strategy";
        assert_eq!(contextual_score("seo", window), 1.0);
        assert_eq!(contextual_score("cooking", window), 0.0);
    }

    #[tokio::test]
    async fn filters_then_falls_back_when_everything_is_filtered() {
        let text = "Create a digital marketing strategy post about {primary_keyword}.";
        let gap = gap_in(text, "primary_keyword");
        let context = SemanticContext::from_window(text, 10);
        let outcome = matcher()
            .match_gap(text, &gap, &context, Some(&["zzz".to_string()]))
            .await;
        assert_eq!(outcome.filtered_out, vec!["zzz".to_string()]);
        assert_eq!(outcome.ranked[0].strategy, MatchStrategy::Fallback);
        assert!(outcome.accepted.is_none());
    }

    #[derive(Debug)]
    struct StalledBackend;

    #[async_trait]
    impl SemanticBackend for StalledBackend {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn is_model_backed(&self) -> bool {
            true
        }

        async fn similarities(&self, _query: &str, _candidates: &[String]) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn backend_timeout_degrades_to_word_overlap() {
        let mut config = MatcherConfig::default();
        config.backend.timeout_ms = 10;
        let matcher = SemanticMatcher::new(config, Arc::new(StalledBackend)).unwrap();
        let text = "Create a digital marketing strategy post about {primary_keyword}.";
        let gap = gap_in(text, "primary_keyword");
        let context = SemanticContext::from_window(text, 10);
        let outcome = matcher
            .match_gap(text, &gap, &context, Some(&["marketing".to_string()]))
            .await;
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.kind == gapfill_model::ErrorKind::SemanticBackendUnavailable));
        assert!((outcome.ranked[0].semantic - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn outcomes_are_cached() {
        let matcher = matcher();
        let text = "Create a digital marketing strategy post about {primary_keyword}.";
        let gap = gap_in(text, "primary_keyword");
        let context = SemanticContext::from_window(text, 10);
        let first = matcher.match_gap(text, &gap, &context, None).await;
        let second = matcher.match_gap(text, &gap, &context, None).await;
        assert_eq!(first, second);
        assert_eq!(matcher.cache_stats().hits, 1);
    }
}
