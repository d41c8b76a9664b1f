use gapfill_model::{GapError, PlaceholderKind, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Legacy placeholder notation a mapping rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notation {
    /// `[NAME]`
    Brackets,
    /// `[[name]]`
    DoubleBrackets,
    /// `$name`
    Dollar,
    /// `<name>`
    Angle,
}

/// One literal rewrite rule from a legacy spelling to the canonical `{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderMapping {
    pub old_pattern: String,
    pub canonical_name: String,
    pub required: bool,
    /// Higher runs first
    pub priority: u8,
    pub deprecated: bool,
    pub replacement: String,
    pub notation: Notation,
}

impl PlaceholderMapping {
    pub fn new(
        old_pattern: impl Into<String>,
        canonical_name: impl Into<String>,
        notation: Notation,
    ) -> Self {
        let canonical_name = canonical_name.into();
        Self {
            old_pattern: old_pattern.into(),
            replacement: format!("{{{canonical_name}}}"),
            canonical_name,
            required: false,
            priority: 50,
            deprecated: false,
            notation,
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub const fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Kind the canonical name resolves to
    #[must_use]
    pub fn kind(&self) -> PlaceholderKind {
        PlaceholderKind::from_name(&self.canonical_name)
    }

    fn validate(&self) -> Result<()> {
        if self.old_pattern.trim().is_empty() {
            return Err(GapError::config(format!(
                "mapping for '{}' has an empty pattern",
                self.canonical_name
            )));
        }
        if !is_canonical_name(&self.canonical_name) {
            return Err(GapError::config(format!(
                "'{}' is not a valid canonical placeholder name",
                self.canonical_name
            )));
        }
        if self.replacement != format!("{{{}}}", self.canonical_name) {
            return Err(GapError::config(format!(
                "replacement '{}' does not match canonical name '{}'",
                self.replacement, self.canonical_name
            )));
        }
        Ok(())
    }
}

/// Canonical names are `snake_case` identifiers (a `-` is tolerated)
#[must_use]
pub fn is_canonical_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Sort mappings for substitution: priority first, then longer patterns before their prefixes
pub(crate) fn order(mappings: &mut [PlaceholderMapping]) {
    mappings.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.old_pattern.len().cmp(&a.old_pattern.len()))
            .then(a.old_pattern.cmp(&b.old_pattern))
    });
}

/// Validate and order a caller-supplied mapping table
pub(crate) fn prepare(mut mappings: Vec<PlaceholderMapping>) -> Result<Vec<PlaceholderMapping>> {
    if mappings.is_empty() {
        return Err(GapError::config("mapping table is empty"));
    }
    for mapping in &mappings {
        mapping.validate()?;
    }
    order(&mut mappings);
    Ok(mappings)
}

/// Default table: every legacy alias of every kind, in all four notations
pub(crate) static DEFAULT_MAPPINGS: Lazy<Vec<PlaceholderMapping>> = Lazy::new(|| {
    let mut mappings = Vec::new();
    for kind in PlaceholderKind::canonical() {
        let profile = kind.profile();
        for alias in profile.legacy_aliases {
            let lower = alias.to_ascii_lowercase();
            let mut patterns = vec![
                (format!("[{alias}]"), Notation::Brackets),
                (format!("[[{alias}]]"), Notation::DoubleBrackets),
                (format!("<{lower}>"), Notation::Angle),
            ];
            if lower != *alias {
                patterns.push((format!("[[{lower}]]"), Notation::DoubleBrackets));
            }
            if !lower.contains('-') {
                patterns.push((format!("${lower}"), Notation::Dollar));
            }
            let deprecated = profile.deprecated_aliases.contains(alias);
            for (pattern, notation) in patterns {
                mappings.push(
                    PlaceholderMapping::new(pattern, profile.canonical_name, notation)
                        .with_priority(profile.priority)
                        .required(profile.required)
                        .deprecated(deprecated),
                );
            }
        }
    }
    order(&mut mappings);
    mappings
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_canonical_kind() {
        for kind in PlaceholderKind::canonical() {
            assert!(
                DEFAULT_MAPPINGS
                    .iter()
                    .any(|m| m.canonical_name == kind.as_str()),
                "{kind}"
            );
        }
        assert!(DEFAULT_MAPPINGS.iter().all(|m| m.validate().is_ok()));
    }

    #[test]
    fn ordering_puts_longer_patterns_first_within_priority() {
        let positions: Vec<usize> = ["[[CLUSTER]]", "[CLUSTER]"]
            .iter()
            .filter_map(|p| DEFAULT_MAPPINGS.iter().position(|m| m.old_pattern == *p))
            .collect();
        assert_eq!(positions.len(), 2);
        assert!(positions[0] < positions[1]);
        let first = &DEFAULT_MAPPINGS[0];
        assert_eq!(first.canonical_name, "primary_keyword");
    }

    #[test]
    fn dollar_mappings_skip_hyphenated_aliases() {
        assert!(!DEFAULT_MAPPINGS
            .iter()
            .any(|m| m.notation == Notation::Dollar && m.old_pattern.contains('-')));
        assert!(DEFAULT_MAPPINGS
            .iter()
            .any(|m| m.old_pattern == "$palavra_chave"));
    }

    #[test]
    fn custom_table_is_validated() {
        assert!(prepare(vec![]).is_err());
        let bad = PlaceholderMapping::new("[X]", "Not Valid", Notation::Brackets);
        assert!(prepare(vec![bad]).is_err());
        let good = PlaceholderMapping::new("[BRAND]", "brand_voice", Notation::Brackets);
        assert_eq!(prepare(vec![good]).map(|m| m.len()), Ok(1));
    }
}
