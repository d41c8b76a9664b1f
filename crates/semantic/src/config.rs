use gapfill_model::{CacheConfig, Severity};
use serde::{Deserialize, Serialize};

use crate::backend::BackendConfig;

/// Configuration for the semantic analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Characters of context on each side of a gap
    pub context_radius: usize,
    pub keyword_limit: usize,
    pub max_alternatives: usize,
    /// Detect prose gaps (incomplete sentences, vague references, ...)
    pub detect_implied_gaps: bool,
    pub implied: ImpliedGapConfig,
    pub cache: CacheConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            context_radius: 200,
            keyword_limit: 10,
            max_alternatives: 5,
            detect_implied_gaps: true,
            implied: ImpliedGapConfig::default(),
            cache: CacheConfig::new(1024, 1800),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.context_radius == 0 {
            return Err("analyzer context_radius must be > 0".to_string());
        }
        if self.keyword_limit == 0 {
            return Err("analyzer keyword_limit must be > 0".to_string());
        }
        if self.max_alternatives > 5 {
            return Err(format!(
                "max_alternatives ({}) must be <= 5",
                self.max_alternatives
            ));
        }
        self.implied.validate()?;
        self.cache.validate()
    }
}

/// Tuning for implied-gap detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpliedGapConfig {
    /// Paragraphs shorter than this leave entity mentions under-specified
    pub entity_context_chars: usize,
    /// Minority share of tone markers above which tone is mixed
    pub tone_minority_ratio: f32,
    /// Implied gaps this close to a detected gap are duplicates
    pub duplicate_distance: usize,
    pub min_confidence: f32,
    pub max_confidence: f32,
}

impl Default for ImpliedGapConfig {
    fn default() -> Self {
        Self {
            entity_context_chars: 100,
            tone_minority_ratio: 0.3,
            duplicate_distance: 10,
            min_confidence: 0.6,
            max_confidence: 0.8,
        }
    }
}

impl ImpliedGapConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.tone_minority_ratio) {
            return Err("tone_minority_ratio must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence)
            || !(0.0..=1.0).contains(&self.max_confidence)
            || self.min_confidence > self.max_confidence
        {
            return Err(format!(
                "implied confidence band [{}, {}] is invalid",
                self.min_confidence, self.max_confidence
            ));
        }
        Ok(())
    }
}

/// Weight of each severity in the overall context score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub info: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 1.0,
            high: 0.8,
            medium: 0.6,
            low: 0.4,
            info: 0.2,
        }
    }
}

impl SeverityWeights {
    #[must_use]
    pub const fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Configuration for the context validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextValidatorConfig {
    /// Minimum overall score for a valid context
    pub min_overall_score: f64,
    /// Same-kind gaps closer than this are redundant
    pub redundancy_distance: usize,
    /// Relevance below this is reported
    pub min_relevance: f32,
    /// Starting value of coherence, flow and consistency
    pub base_score: f64,
    /// Amount each counted issue or bonus moves a sub-score
    pub score_step: f64,
    /// Heading-like markers needed before markers drive segmentation
    pub min_heading_markers: usize,
    pub max_input_bytes: usize,
    pub severity_weights: SeverityWeights,
}

impl Default for ContextValidatorConfig {
    fn default() -> Self {
        Self {
            min_overall_score: 0.7,
            redundancy_distance: 50,
            min_relevance: 0.65,
            base_score: 0.8,
            score_step: 0.1,
            min_heading_markers: 3,
            max_input_bytes: 1_000_000,
            severity_weights: SeverityWeights::default(),
        }
    }
}

impl ContextValidatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_overall_score) {
            return Err("min_overall_score must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.base_score) {
            return Err("base_score must be within [0, 1]".to_string());
        }
        if self.severity_weights.total() <= 0.0 {
            return Err("severity weights must sum to a positive value".to_string());
        }
        Ok(())
    }
}

/// Blend of the three similarity axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridWeights {
    pub semantic: f32,
    pub contextual: f32,
    pub keyword: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.4,
            contextual: 0.35,
            keyword: 0.25,
        }
    }
}

/// Score thresholds that pick a strategy, checked in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyThresholds {
    pub semantic: f32,
    pub contextual: f32,
    pub keyword: f32,
    pub hybrid: f32,
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            semantic: 0.8,
            contextual: 0.7,
            keyword: 0.6,
            hybrid: 0.4,
        }
    }
}

/// Confidence multiplier per strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyBoosts {
    pub semantic: f32,
    pub contextual: f32,
    pub keyword: f32,
    pub hybrid: f32,
    pub fallback: f32,
}

impl Default for StrategyBoosts {
    fn default() -> Self {
        Self {
            semantic: 1.10,
            contextual: 1.05,
            keyword: 1.00,
            hybrid: 0.95,
            fallback: 0.80,
        }
    }
}

/// Configuration for the semantic matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum hybrid score for a match to be accepted
    pub similarity_threshold: f32,
    pub weights: HybridWeights,
    pub thresholds: StrategyThresholds,
    pub boosts: StrategyBoosts,
    pub min_length_ratio: f32,
    pub max_length_ratio: f32,
    pub min_keyword_overlap: f32,
    pub max_candidate_chars: usize,
    /// Radius of the window used for contextual similarity
    pub expanded_radius: usize,
    pub max_alternatives: usize,
    pub backend: BackendConfig,
    pub cache: CacheConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            weights: HybridWeights::default(),
            thresholds: StrategyThresholds::default(),
            boosts: StrategyBoosts::default(),
            min_length_ratio: 0.3,
            max_length_ratio: 3.0,
            min_keyword_overlap: 0.2,
            max_candidate_chars: 500,
            expanded_radius: 400,
            max_alternatives: 5,
            backend: BackendConfig::default(),
            cache: CacheConfig::new(1024, 1800),
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold ({}) must be within [0, 1]",
                self.similarity_threshold
            ));
        }
        let sum = self.weights.semantic + self.weights.contextual + self.weights.keyword;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(format!("hybrid weights must sum to 1.0 (got {sum:.3})"));
        }
        if self.min_length_ratio >= self.max_length_ratio {
            return Err("min_length_ratio must be below max_length_ratio".to_string());
        }
        if self.max_candidate_chars == 0 {
            return Err("max_candidate_chars must be > 0".to_string());
        }
        self.backend.validate()?;
        self.cache.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AnalyzerConfig::default().validate().is_ok());
        assert!(ContextValidatorConfig::default().validate().is_ok());
        assert!(MatcherConfig::default().validate().is_ok());
    }

    #[test]
    fn hybrid_weights_must_sum_to_one() {
        let config = MatcherConfig {
            weights: HybridWeights {
                semantic: 0.5,
                contextual: 0.5,
                keyword: 0.5,
            },
            ..MatcherConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn severity_weights_total() {
        let weights = SeverityWeights::default();
        assert!((weights.total() - 3.0).abs() < 1e-9);
        assert_eq!(weights.weight(Severity::High), 0.8);
    }
}
