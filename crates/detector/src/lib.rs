//! # Gapfill Detector
//!
//! Finds canonical `{name}` placeholders and checks candidate fill values.
//!
//! - [`PatternDetector`] compiles one regex per placeholder kind plus a generic `{name}`
//!   catcher and emits [`DetectedGap`](gapfill_model::DetectedGap) records with a bounded
//!   local context and an adjusted confidence.
//! - [`BasicValidator`] runs the per-kind rule list (required, length, format, enumerated
//!   values, numeric range, comma lists, special characters) and degrades confidence
//!   multiplicatively for each failed rule.

mod config;
mod detector;
mod validator;

pub use config::{ConfidenceAdjustments, DetectorConfig, ValidatorConfig};
pub use detector::{PatternDetector, GENERIC_PATTERN};
pub use validator::{BasicValidator, RuleFinding, ValidationOutcome};
