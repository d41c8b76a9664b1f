//! # Gapfill Semantic
//!
//! Meaning-level processing of detected gaps:
//!
//! - [`SemanticAnalyzer`] classifies the window around each gap into a [`SemanticContext`],
//!   proposes kind-driven values and flags [`ImpliedGap`]s in the prose
//! - [`ContextValidator`] scores how well the gaps of a template fit together
//! - [`SemanticMatcher`] ranks candidate values by semantic, contextual and keyword similarity
//!
//! Similarity goes through the [`SemanticBackend`] trait. [`select_backend`] picks the
//! configured backend once and degrades to [`HeuristicBackend`] when the embedding backend
//! cannot be built.

mod analyzer;
mod backend;
mod config;
mod context;
mod context_validator;
mod implied;
mod matcher;

pub use analyzer::{suggestions, AnalysisOutput, SemanticAnalyzer, SemanticGap};
pub use backend::{
    select_backend, BackendConfig, BackendKind, HashingEmbeddingBackend, HeuristicBackend,
    SemanticBackend,
};
pub use config::{
    AnalyzerConfig, ContextValidatorConfig, HybridWeights, ImpliedGapConfig, MatcherConfig,
    SeverityWeights, StrategyBoosts, StrategyThresholds,
};
pub use context::{
    context_relevance, extract_entities, intent_alignment, Entity, EntityLabel, GeneralContext,
    SemanticContext, RELEVANCE_BASE,
};
pub use context_validator::{
    ContextValidationIssue, ContextValidationResult, ContextValidator, GapAssessment, IssueType,
};
pub use implied::{detect_implied_gaps, ImpliedGap, ImpliedGapKind};
pub use matcher::{
    contextual_score, derive_candidates, keyword_score, MatchOutcome, MatchStrategy,
    ScoredCandidate, SemanticMatch, SemanticMatcher,
};
