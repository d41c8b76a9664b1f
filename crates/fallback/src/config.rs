use serde::{Deserialize, Serialize};

/// Which strategies run for a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    Contextual,
    Semantic,
    Frequency,
    Historical,
    /// Every strategy, merged and re-ranked
    Hybrid,
}

/// Composite ranking weights for hybrid mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub quality: f32,
    pub confidence: f32,
    pub context_relevance: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            quality: 0.4,
            confidence: 0.3,
            context_relevance: 0.3,
        }
    }
}

/// Base confidence of each strategy's options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfidence {
    pub contextual: f32,
    pub semantic: f32,
    pub frequency: f32,
    pub historical: f32,
}

impl Default for StrategyConfidence {
    fn default() -> Self {
        Self {
            contextual: 0.85,
            semantic: 0.75,
            frequency: 0.70,
            historical: 0.60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub mode: FallbackMode,
    /// Options kept per gap after ranking
    pub max_options: usize,
    /// Values tracked per kind in the usage history
    pub history_capacity: usize,
    /// Count the selected value in the usage history
    pub record_selection: bool,
    pub ranking: RankingWeights,
    pub confidence: StrategyConfidence,
    pub keyword_limit: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            mode: FallbackMode::Hybrid,
            max_options: 5,
            history_capacity: 100,
            record_selection: true,
            ranking: RankingWeights::default(),
            confidence: StrategyConfidence::default(),
            keyword_limit: 10,
        }
    }
}

impl FallbackConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_options == 0 {
            return Err("max_options must be > 0".to_string());
        }
        if self.history_capacity == 0 {
            return Err("history_capacity must be > 0".to_string());
        }
        let sum = self.ranking.quality + self.ranking.confidence + self.ranking.context_relevance;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(format!("ranking weights must sum to 1.0 (got {sum:.3})"));
        }
        let c = &self.confidence;
        for value in [c.contextual, c.semantic, c.frequency, c.historical] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("strategy confidence {value} is outside [0, 1]"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_validate() {
        assert!(FallbackConfig::default().validate().is_ok());
        let skewed = FallbackConfig {
            ranking: RankingWeights {
                quality: 1.0,
                confidence: 1.0,
                context_relevance: 1.0,
            },
            ..FallbackConfig::default()
        };
        assert!(skewed.validate().is_err());
    }

    #[test]
    fn mode_parses_from_toml_style_names() {
        let mode: FallbackMode = serde_json::from_str("\"historical\"").unwrap();
        assert_eq!(mode, FallbackMode::Historical);
    }
}
