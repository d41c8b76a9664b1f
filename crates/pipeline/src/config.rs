use anyhow::{anyhow, Context, Result};
use gapfill_detector::{DetectorConfig, ValidatorConfig};
use gapfill_fallback::FallbackConfig;
use gapfill_model::CacheConfig;
use gapfill_quality::QualityConfig;
use gapfill_semantic::{
    AnalyzerConfig, BackendConfig, BackendKind, ContextValidatorConfig, MatcherConfig,
};
use gapfill_unifier::UnifierConfig;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

pub const ENV_SIMILARITY_THRESHOLD: &str = "GAPFILL_SIMILARITY_THRESHOLD";
pub const ENV_MIN_QUALITY_SCORE: &str = "GAPFILL_MIN_QUALITY_SCORE";
pub const ENV_CACHE_TTL_SECONDS: &str = "GAPFILL_CACHE_TTL_SECONDS";
pub const ENV_CONTEXT_WINDOW_SIZE: &str = "GAPFILL_CONTEXT_WINDOW_SIZE";
pub const ENV_WORKER_LIMIT: &str = "GAPFILL_WORKER_LIMIT";
pub const ENV_BACKEND: &str = "GAPFILL_BACKEND";

/// Orchestrator configuration.
///
/// The top-level knobs win over the matching fields of the nested component sections:
/// `similarity_threshold` sets the matcher threshold, `context_window_size` the detector
/// radius, and `cache_ttl_seconds` every cache (unification, validation, context, match, run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enable_semantic_analysis: bool,
    pub enable_context_validation: bool,
    pub enable_semantic_matching: bool,
    pub enable_quality_validation: bool,
    pub enable_fallback_generation: bool,

    pub similarity_threshold: f32,
    /// Runs scoring below this get a warning and a recommendation
    pub min_quality_score: f64,
    pub cache_ttl_seconds: u64,
    /// Chars of context the detector keeps on each side of a placeholder
    pub context_window_size: usize,
    /// Concurrent per-gap tasks; 0 uses the available parallelism
    pub worker_limit: usize,
    /// Whole-run cache keyed by (content hash, expected gap count)
    pub run_cache: CacheConfig,

    pub backend: BackendConfig,
    pub unifier: UnifierConfig,
    pub detector: DetectorConfig,
    pub validator: ValidatorConfig,
    pub analyzer: AnalyzerConfig,
    pub context_validator: ContextValidatorConfig,
    pub matcher: MatcherConfig,
    pub fallback: FallbackConfig,
    pub quality: QualityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_semantic_analysis: true,
            enable_context_validation: true,
            enable_semantic_matching: true,
            enable_quality_validation: true,
            enable_fallback_generation: true,
            similarity_threshold: 0.7,
            min_quality_score: 0.7,
            cache_ttl_seconds: 1800,
            context_window_size: 150,
            worker_limit: 0,
            run_cache: CacheConfig::new(128, 1800),
            backend: BackendConfig::default(),
            unifier: UnifierConfig::default(),
            detector: DetectorConfig::default(),
            validator: ValidatorConfig::default(),
            analyzer: AnalyzerConfig::default(),
            context_validator: ContextValidatorConfig::default(),
            matcher: MatcherConfig::default(),
            fallback: FallbackConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse pipeline config")?;
        config.validate().map_err(|err| anyhow!("Invalid pipeline config: {err}"))?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Defaults or `path`, then `GAPFILL_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate().map_err(|err| anyhow!("Invalid pipeline config: {err}"))?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; unparsable values are logged and ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = parsed(&lookup, ENV_SIMILARITY_THRESHOLD) {
            self.similarity_threshold = value;
        }
        if let Some(value) = parsed(&lookup, ENV_MIN_QUALITY_SCORE) {
            self.min_quality_score = value;
        }
        if let Some(value) = parsed(&lookup, ENV_CACHE_TTL_SECONDS) {
            self.cache_ttl_seconds = value;
        }
        if let Some(value) = parsed(&lookup, ENV_CONTEXT_WINDOW_SIZE) {
            self.context_window_size = value;
        }
        if let Some(value) = parsed(&lookup, ENV_WORKER_LIMIT) {
            self.worker_limit = value;
        }
        if let Some(kind) = parsed::<BackendKind>(&lookup, ENV_BACKEND) {
            self.backend.kind = kind;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold ({}) must be in [0, 1]",
                self.similarity_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.min_quality_score) {
            return Err(format!(
                "min_quality_score ({}) must be in [0, 1]",
                self.min_quality_score
            ));
        }
        if self.cache_ttl_seconds == 0 {
            return Err("cache_ttl_seconds must be > 0".to_string());
        }
        if self.context_window_size == 0 {
            return Err("context_window_size must be > 0".to_string());
        }
        self.run_cache.validate().map_err(|err| format!("run_cache: {err}"))?;

        let resolved = self.resolved();
        resolved.backend.validate().map_err(|err| format!("backend: {err}"))?;
        resolved.unifier.validate().map_err(|err| format!("unifier: {err}"))?;
        resolved.detector.validate().map_err(|err| format!("detector: {err}"))?;
        resolved.validator.validate().map_err(|err| format!("validator: {err}"))?;
        resolved.analyzer.validate().map_err(|err| format!("analyzer: {err}"))?;
        resolved
            .context_validator
            .validate()
            .map_err(|err| format!("context_validator: {err}"))?;
        resolved.matcher.validate().map_err(|err| format!("matcher: {err}"))?;
        resolved.fallback.validate().map_err(|err| format!("fallback: {err}"))?;
        resolved.quality.validate().map_err(|err| format!("quality: {err}"))?;
        Ok(())
    }

    /// Copy with the top-level knobs pushed into the component sections
    #[must_use]
    pub fn resolved(&self) -> Self {
        let mut config = self.clone();
        config.matcher.similarity_threshold = self.similarity_threshold;
        config.matcher.backend = self.backend.clone();
        config.detector.context_radius = self.context_window_size;
        config.unifier.cache.ttl_seconds = self.cache_ttl_seconds;
        config.validator.cache.ttl_seconds = self.cache_ttl_seconds;
        config.analyzer.cache.ttl_seconds = self.cache_ttl_seconds;
        config.matcher.cache.ttl_seconds = self.cache_ttl_seconds;
        config.run_cache.ttl_seconds = self.cache_ttl_seconds;
        config
    }

    /// Effective concurrency for per-gap fan-out
    #[must_use]
    pub fn effective_worker_limit(&self) -> usize {
        if self.worker_limit > 0 {
            return self.worker_limit;
        }
        std::thread::available_parallelism().map_or(4, NonZeroUsize::get)
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {key}={trimmed}: not a valid value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            enable_fallback_generation = false
            similarity_threshold = 0.6

            [fallback]
            max_options = 3
            "#,
        )
        .unwrap();
        assert!(!config.enable_fallback_generation);
        assert!(config.enable_semantic_matching);
        assert_eq!(config.fallback.max_options, 3);
        assert_eq!(config.cache_ttl_seconds, 1800);
        assert!((config.resolved().matcher.similarity_threshold - 0.6).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = PipelineConfig::from_toml_str("similarity_threshold = 1.5").unwrap_err();
        assert!(format!("{err:#}").contains("similarity_threshold"));
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            (ENV_SIMILARITY_THRESHOLD, "0.55"),
            (ENV_WORKER_LIMIT, "3"),
            (ENV_CACHE_TTL_SECONDS, "not-a-number"),
            (ENV_BACKEND, "hashing"),
        ]
        .into_iter()
        .collect();
        let mut config = PipelineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert!((config.similarity_threshold - 0.55).abs() < 1e-6);
        assert_eq!(config.worker_limit, 3);
        assert_eq!(config.effective_worker_limit(), 3);
        assert_eq!(config.cache_ttl_seconds, 1800);
        assert_eq!(config.backend.kind, BackendKind::Hashing);
    }

    #[test]
    fn resolved_pushes_top_level_knobs_down() {
        let config = PipelineConfig {
            context_window_size: 80,
            cache_ttl_seconds: 60,
            ..PipelineConfig::default()
        };
        let resolved = config.resolved();
        assert_eq!(resolved.detector.context_radius, 80);
        assert_eq!(resolved.unifier.cache.ttl_seconds, 60);
        assert_eq!(resolved.validator.cache.ttl_seconds, 60);
        assert_eq!(resolved.analyzer.cache.ttl_seconds, 60);
        assert_eq!(resolved.matcher.cache.ttl_seconds, 60);
        assert_eq!(resolved.run_cache.ttl_seconds, 60);
    }
}
