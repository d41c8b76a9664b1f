use gapfill_model::CacheConfig;
use serde::{Deserialize, Serialize};

/// Configuration for placeholder unification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifierConfig {
    /// Inputs above this size are not migrated (the original text is returned)
    pub max_input_bytes: usize,

    /// Emit a warning for each legacy-looking placeholder no mapping covers
    pub warn_unmapped: bool,

    /// Unification cache keyed by content hash
    pub cache: CacheConfig,
}

impl Default for UnifierConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 1_000_000,
            warn_unmapped: true,
            cache: CacheConfig::new(256, 3600),
        }
    }
}

impl UnifierConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_input_bytes == 0 {
            return Err("max_input_bytes must be > 0".to_string());
        }
        self.cache.validate()
    }
}
