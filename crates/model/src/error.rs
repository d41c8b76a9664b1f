use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PipelineStage;

/// Result type for gap processing operations
pub type Result<T> = std::result::Result<T, GapError>;

/// Errors raised by the gap-processing components.
///
/// Stages never let these cross the library boundary: the orchestrator converts each one into
/// a [`StageIssue`] on the final result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GapError {
    /// Placeholder migration failed; the caller keeps the original text
    #[error("Migration error: {0}")]
    Migration(String),

    /// Placeholder syntax that cannot be parsed (unterminated or empty braces)
    #[error("Malformed placeholder at {position}: {message}")]
    MalformedPlaceholder { position: usize, message: String },

    /// Pattern detection failed; fatal for a pipeline run
    #[error("Detection error: {0}")]
    Detection(String),

    /// A validation rule could not be evaluated
    #[error("Validation rule '{rule}' failed to evaluate: {message}")]
    ValidationRule { rule: String, message: String },

    /// The semantic backend is missing or timed out
    #[error("Semantic backend unavailable: {0}")]
    SemanticBackendUnavailable(String),

    /// No candidate reached the similarity threshold for a gap
    #[error("No accepted match for gap '{gap}'")]
    NoAcceptedMatch { gap: String },

    /// Every fallback strategy came back empty
    #[error("Fallback strategies exhausted for kind '{kind}'")]
    FallbackExhausted { kind: String },

    /// Context validation could not run
    #[error("Context validation error: {0}")]
    ContextValidation(String),

    /// Caller cancelled the run
    #[error("Run cancelled before stage {stage}")]
    Cancelled { stage: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A worker task died before reporting
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GapError {
    pub fn migration(msg: impl Into<String>) -> Self {
        Self::Migration(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    pub fn rule(rule: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ValidationRule {
            rule: rule.into(),
            message: msg.into(),
        }
    }

    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::SemanticBackendUnavailable(msg.into())
    }

    pub fn context_validation(msg: impl Into<String>) -> Self {
        Self::ContextValidation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Serializable classification of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Migration(_) => ErrorKind::Migration,
            Self::MalformedPlaceholder { .. } => ErrorKind::MalformedPlaceholder,
            Self::Detection(_) => ErrorKind::Detection,
            Self::ValidationRule { .. } => ErrorKind::ValidationRule,
            Self::SemanticBackendUnavailable(_) => ErrorKind::SemanticBackendUnavailable,
            Self::NoAcceptedMatch { .. } => ErrorKind::NoAcceptedMatch,
            Self::FallbackExhausted { .. } => ErrorKind::FallbackExhausted,
            Self::ContextValidation(_) => ErrorKind::ContextValidation,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error ends a pipeline run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Detection(_) | Self::Cancelled { .. })
    }
}

/// Error classification carried by [`StageIssue`] records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Migration,
    MalformedPlaceholder,
    Detection,
    ValidationRule,
    SemanticBackendUnavailable,
    NoAcceptedMatch,
    FallbackExhausted,
    ContextValidation,
    Cancelled,
    Config,
    Internal,
    /// Non-error notices (missing required placeholders, low scores)
    Notice,
}

/// One error or warning entry attached to a stage result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageIssue {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    pub message: String,
}

impl StageIssue {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: None,
            message: message.into(),
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Notice, message)
    }

    #[must_use]
    pub const fn at(mut self, stage: PipelineStage) -> Self {
        self.stage = Some(stage);
        self
    }
}

impl From<&GapError> for StageIssue {
    fn from(err: &GapError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<GapError> for StageIssue {
    fn from(err: GapError) -> Self {
        Self::from(&err)
    }
}
