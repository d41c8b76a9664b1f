use gapfill_fallback::FallbackResult;
use gapfill_model::{DetectedGap, GapId, PipelineStage, StageIssue};
use gapfill_quality::QualityReport;
use gapfill_semantic::{ContextValidationResult, ImpliedGap, MatchOutcome, SemanticGap};
use gapfill_unifier::MigrationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHealth {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SystemHealth {
    /// Grade from the share of successful stages and the run's quality score
    #[must_use]
    pub fn assess(success_rate: f64, quality: f64) -> Self {
        if success_rate >= 0.9 && quality >= 0.8 {
            Self::Excellent
        } else if success_rate >= 0.8 && quality >= 0.7 {
            Self::Good
        } else if success_rate >= 0.7 && quality >= 0.6 {
            Self::Fair
        } else if success_rate >= 0.5 {
            Self::Poor
        } else {
            Self::Critical
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// Where a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    /// Integration was reached
    Success,
    /// Empty input or detection failure
    Error,
    Cancelled,
}

/// Outcome of one executed stage. Disabled stages leave no record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: PipelineStage,
    pub success: bool,
    /// Stage-specific summary counts
    pub data: Value,
    pub execution_time_ms: f64,
    pub errors: Vec<StageIssue>,
    pub warnings: Vec<StageIssue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl StageResult {
    pub(crate) fn new(stage: PipelineStage) -> Self {
        Self {
            stage,
            success: true,
            data: Value::Null,
            execution_time_ms: 0.0,
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub(crate) fn error(&mut self, issue: StageIssue) {
        self.success = false;
        self.errors.push(issue.at(self.stage));
    }

    pub(crate) fn warn(&mut self, issue: StageIssue) {
        self.warnings.push(issue.at(self.stage));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Accepted semantic match
    Match,
    /// Fallback system selection
    Fallback,
}

/// The value chosen for one gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapResolution {
    pub gap_ref: GapId,
    pub placeholder: String,
    pub value: String,
    pub source: ResolutionSource,
    pub confidence: f32,
}

/// Everything one run produced. Fully serializable; optional stages that did not run are
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub text_hash: String,
    pub unified_text: String,
    pub migration: Option<MigrationResult>,
    /// Sorted by span start
    pub gaps: Vec<DetectedGap>,
    pub implied_gaps: Option<Vec<ImpliedGap>>,
    pub semantic_gaps: Option<Vec<SemanticGap>>,
    pub context_validation: Option<ContextValidationResult>,
    pub matches: Option<Vec<MatchOutcome>>,
    pub quality: Option<QualityReport>,
    pub fallbacks: Option<Vec<FallbackResult>>,
    /// Resolved gaps in span order
    pub resolutions: Vec<GapResolution>,
    /// Unified text with every resolved placeholder substituted
    pub filled_text: String,
    pub stages: Vec<StageResult>,
    pub total_time_ms: f64,
    pub system_health: SystemHealth,
    pub final_state: FinalState,
    pub success: bool,
    pub errors: Vec<StageIssue>,
    pub warnings: Vec<StageIssue>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub from_cache: bool,
}

impl PipelineResult {
    pub(crate) fn empty(text_hash: String, text: &str) -> Self {
        Self {
            text_hash,
            unified_text: text.to_string(),
            migration: None,
            gaps: Vec::new(),
            implied_gaps: None,
            semantic_gaps: None,
            context_validation: None,
            matches: None,
            quality: None,
            fallbacks: None,
            resolutions: Vec::new(),
            filled_text: text.to_string(),
            stages: Vec::new(),
            total_time_ms: 0.0,
            system_health: SystemHealth::Critical,
            final_state: FinalState::Error,
            success: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            insights: Vec::new(),
            recommendations: Vec::new(),
            from_cache: false,
        }
    }

    pub fn stage(&self, stage: PipelineStage) -> Option<&StageResult> {
        self.stages.iter().find(|result| result.stage == stage)
    }

    /// Resolution for a gap, if one was chosen
    pub fn resolution(&self, gap: GapId) -> Option<&GapResolution> {
        self.resolutions.iter().find(|resolution| resolution.gap_ref == gap)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_bands() {
        assert_eq!(SystemHealth::assess(1.0, 0.85), SystemHealth::Excellent);
        assert_eq!(SystemHealth::assess(0.85, 0.85), SystemHealth::Good);
        assert_eq!(SystemHealth::assess(1.0, 0.65), SystemHealth::Fair);
        assert_eq!(SystemHealth::assess(0.6, 0.9), SystemHealth::Poor);
        assert_eq!(SystemHealth::assess(0.4, 1.0), SystemHealth::Critical);
    }

    #[test]
    fn stage_errors_mark_failure_and_carry_stage() {
        let mut stage = StageResult::new(PipelineStage::SemanticMatching);
        stage.warn(StageIssue::notice("slow backend"));
        assert!(stage.success);
        stage.error(StageIssue::notice("boom"));
        assert!(!stage.success);
        assert_eq!(stage.errors[0].stage, Some(PipelineStage::SemanticMatching));
    }
}
