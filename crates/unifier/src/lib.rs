//! # Gapfill Unifier
//!
//! Rewrites legacy placeholder notations to the canonical `{name}` syntax.
//!
//! ```text
//! raw template
//!     ├──> notation counts ([NAME], [[name]], $name, <name>, {name}) → PlaceholderFormat
//!     ├──> ordered literal substitution (priority, then pattern length)
//!     └──> validation: required placeholders, malformed braces, unknown names
//! ```
//!
//! Migration never fails outward. Already-canonical input comes back unchanged with
//! `no_op = true`.

mod config;
mod format;
mod mapping;
mod unifier;
mod validation;

pub use config::UnifierConfig;
pub use format::{count_notations, detect_format, FormatCounts, PlaceholderFormat};
pub use mapping::{is_canonical_name, Notation, PlaceholderMapping};
pub use unifier::{MigrationRecord, MigrationResult, Unifier};
pub use validation::{validate_text, MalformedPlaceholder, ValidationResult};
