//! # Gapfill Model
//!
//! Shared vocabulary for the gap-processing crates: placeholder kinds and their behaviour
//! table, the records stages exchange, the error taxonomy, keyword lexicons and text helpers.
//!
//! ## Kind table
//!
//! ```text
//! PlaceholderKind ──> KindProfile
//!                      ├─> canonical name + legacy aliases   (unifier)
//!                      ├─> base confidence + rules           (detector, validator)
//!                      ├─> relevance signals + intents       (context validator)
//!                      └─> fallback pool + generic token     (fallback)
//! ```
//!
//! Components look up behaviour through [`PlaceholderKind::profile`] rather than matching on
//! placeholder names.

mod cache;
mod error;
mod kind;
pub mod lexicon;
pub mod text;
mod types;

pub use cache::{CacheConfig, CacheStats, TtlCache};
pub use error::{ErrorKind, GapError, Result, StageIssue};
pub use kind::{
    KindProfile, PlaceholderKind, RuleSpec, Signal, CONTENT_TYPE_VALUES, LENGTH_VALUES,
    TONE_VALUES,
};
pub use lexicon::{Complexity, Intent, Signals, Tone};
pub use types::{
    clamp_unit, clamp_unit_f64, DetectedGap, DetectionMethod, ExpectedGap, GapId, PipelineStage,
    Severity, Span, ValidationLevel,
};
