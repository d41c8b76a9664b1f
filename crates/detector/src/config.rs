use gapfill_model::CacheConfig;
use serde::{Deserialize, Serialize};

/// Multiplicative confidence adjustments applied to each match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceAdjustments {
    /// Prose around the placeholder shorter than this many chars is "thin"
    pub short_context_chars: usize,
    pub short_context_factor: f32,
    /// Prose longer than this many chars is "rich"
    pub long_context_chars: usize,
    pub long_context_factor: f32,
    /// Match starting in the last `tail_fraction` of its window
    pub tail_fraction: f32,
    pub tail_position_factor: f32,
    /// Other placeholders needed in the window for the co-occurrence bonus
    pub co_occurrence_min: usize,
    pub co_occurrence_factor: f32,
}

impl Default for ConfidenceAdjustments {
    fn default() -> Self {
        Self {
            short_context_chars: 10,
            short_context_factor: 0.90,
            long_context_chars: 100,
            long_context_factor: 1.05,
            tail_fraction: 0.20,
            tail_position_factor: 1.20,
            co_occurrence_min: 2,
            co_occurrence_factor: 1.02,
        }
    }
}

/// Configuration for pattern detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Chars of context taken on each side of a placeholder
    pub context_radius: usize,

    /// Stored `local_context` is truncated to this many chars
    pub max_context_chars: usize,

    /// Inputs above this size fail detection
    pub max_input_bytes: usize,

    pub adjustments: ConfidenceAdjustments,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            context_radius: 150,
            max_context_chars: 200,
            max_input_bytes: 1_000_000,
            adjustments: ConfidenceAdjustments::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.context_radius == 0 {
            return Err("context_radius must be > 0".to_string());
        }
        if self.max_context_chars < 20 {
            return Err(format!(
                "max_context_chars ({}) must be at least 20",
                self.max_context_chars
            ));
        }
        if self.max_input_bytes == 0 {
            return Err("max_input_bytes must be > 0".to_string());
        }
        let a = &self.adjustments;
        if !(0.0..1.0).contains(&a.tail_fraction) {
            return Err(format!("tail_fraction ({}) must be in [0, 1)", a.tail_fraction));
        }
        for (name, factor) in [
            ("short_context_factor", a.short_context_factor),
            ("long_context_factor", a.long_context_factor),
            ("tail_position_factor", a.tail_position_factor),
            ("co_occurrence_factor", a.co_occurrence_factor),
        ] {
            if !(factor > 0.0 && factor.is_finite()) {
                return Err(format!("{name} must be a positive number"));
            }
        }
        Ok(())
    }
}

/// Configuration for the basic validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Cache of (kind, value) verdicts
    pub cache: CacheConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::new(1024, 3600),
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()
    }
}
