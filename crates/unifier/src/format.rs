use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::mapping::{Notation, DEFAULT_MAPPINGS};

/// Placeholder notation found in a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderFormat {
    /// `[NAME]`
    OldBrackets,
    /// `[[name]]`
    DoubleBrackets,
    /// `$name`
    Dollar,
    /// `<name>`
    Angle,
    /// Canonical `{name}` only
    NewBraces,
    /// More than one notation present
    Mixed,
    /// No placeholders at all
    Unknown,
}

impl PlaceholderFormat {
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(
            self,
            Self::OldBrackets | Self::DoubleBrackets | Self::Dollar | Self::Angle | Self::Mixed
        )
    }

    const fn from_notation(notation: Notation) -> Self {
        match notation {
            Notation::Brackets => Self::OldBrackets,
            Notation::DoubleBrackets => Self::DoubleBrackets,
            Notation::Dollar => Self::Dollar,
            Notation::Angle => Self::Angle,
        }
    }
}

/// Per-notation match counts behind a format decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCounts {
    pub brackets: usize,
    pub double_brackets: usize,
    pub dollar: usize,
    pub angle: usize,
    pub canonical: usize,
}

impl FormatCounts {
    #[must_use]
    pub const fn legacy_total(&self) -> usize {
        self.brackets + self.double_brackets + self.dollar + self.angle
    }

    /// Decide the format from the counts
    #[must_use]
    pub fn format(&self) -> PlaceholderFormat {
        let legacy: Vec<Notation> = [
            (Notation::Brackets, self.brackets),
            (Notation::DoubleBrackets, self.double_brackets),
            (Notation::Dollar, self.dollar),
            (Notation::Angle, self.angle),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(notation, _)| notation)
        .collect();

        match (legacy.as_slice(), self.canonical) {
            ([], 0) => PlaceholderFormat::Unknown,
            ([], _) => PlaceholderFormat::NewBraces,
            ([single], 0) => PlaceholderFormat::from_notation(*single),
            _ => PlaceholderFormat::Mixed,
        }
    }
}

pub(crate) static DOUBLE_BRACKET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([A-Za-z][A-Za-z0-9_\-]*)\]\]").expect("valid double-bracket regex")
});

pub(crate) static BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Z][A-Z0-9_\-]*)\]").expect("valid bracket regex"));

pub(crate) static DOLLAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid dollar regex"));

static ANGLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_\-]*)>").expect("valid angle regex"));

pub(crate) static CANONICAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*\}").expect("valid canonical regex")
});

/// Angle names that belong to a known mapping; anything else is treated as markup
static KNOWN_ANGLE_PATTERNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    DEFAULT_MAPPINGS
        .iter()
        .filter(|m| m.notation == Notation::Angle)
        .map(|m| m.old_pattern.as_str())
        .collect()
});

/// Count every notation in `text`
#[must_use]
pub fn count_notations(text: &str) -> FormatCounts {
    let double_brackets = DOUBLE_BRACKET_RE.find_iter(text).count();
    // Single brackets are counted on text with the double brackets blanked out
    let without_double = DOUBLE_BRACKET_RE.replace_all(text, " ");
    let brackets = BRACKET_RE.find_iter(&without_double).count();
    let dollar = DOLLAR_RE.find_iter(text).count();
    let angle = ANGLE_RE
        .find_iter(text)
        .filter(|m| KNOWN_ANGLE_PATTERNS.contains(m.as_str()))
        .count();
    let canonical = CANONICAL_RE.find_iter(text).count();
    FormatCounts {
        brackets,
        double_brackets,
        dollar,
        angle,
        canonical,
    }
}

#[must_use]
pub fn detect_format(text: &str) -> PlaceholderFormat {
    count_notations(text).format()
}

/// Legacy-looking placeholders still present in `text`
pub(crate) fn leftover_legacy(text: &str) -> Vec<String> {
    let mut leftovers: Vec<String> = DOUBLE_BRACKET_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    let without_double = DOUBLE_BRACKET_RE.replace_all(text, " ");
    leftovers.extend(
        BRACKET_RE
            .find_iter(&without_double)
            .map(|m| m.as_str().to_string()),
    );
    leftovers.extend(DOLLAR_RE.find_iter(text).map(|m| m.as_str().to_string()));
    leftovers.sort();
    leftovers.dedup();
    leftovers
}
