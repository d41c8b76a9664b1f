//! # Gapfill Pipeline
//!
//! Runs a template through every gap-processing stage and returns one serializable
//! [`PipelineResult`].
//!
//! ```text
//! text ─> Unification ─> Detection ─┬─> SemanticAnalysis*   (per-gap fan-out)
//!                                   ├─> ContextValidation*
//!                                   ├─> SemanticMatching*
//!                                   ├─> QualityValidation*
//!                                   ├─> FallbackGeneration* (per-gap fan-out)
//!                                   └─> Integration ─> filled text
//! ```
//!
//! Stages marked `*` can be switched off in [`PipelineConfig`]. Empty input and detection
//! failures stop the run with [`FinalState::Error`]; everything else is recorded as a stage
//! error or warning and the run continues. A [`CancellationToken`] is checked before every
//! stage and a cancelled run returns the stages it finished.

mod config;
mod pipeline;
mod report;
mod result;

pub use config::{
    PipelineConfig, ENV_BACKEND, ENV_CACHE_TTL_SECONDS, ENV_CONTEXT_WINDOW_SIZE,
    ENV_MIN_QUALITY_SCORE, ENV_SIMILARITY_THRESHOLD, ENV_WORKER_LIMIT,
};
pub use pipeline::{Pipeline, PipelineRequest};
pub use result::{
    FinalState, GapResolution, PipelineResult, ResolutionSource, StageResult, SystemHealth,
};
pub use tokio_util::sync::CancellationToken;
