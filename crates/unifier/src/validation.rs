use gapfill_model::{GapError, PlaceholderKind, StageIssue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::format::CANONICAL_RE;

/// Placeholder syntax that cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedPlaceholder {
    /// Byte offset of the opening brace
    pub position: usize,
    pub snippet: String,
    pub reason: String,
}

impl MalformedPlaceholder {
    #[must_use]
    pub fn to_error(&self) -> GapError {
        GapError::MalformedPlaceholder {
            position: self.position,
            message: format!("{} ({})", self.reason, self.snippet),
        }
    }
}

/// Post-migration check of the canonical placeholders in a text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub required_missing: Vec<String>,
    pub malformed: Vec<MalformedPlaceholder>,
    /// Well-formed names outside the canonical table (treated as custom gaps)
    pub unknown_placeholders: Vec<String>,
    /// Legacy patterns that were migrated through a deprecated mapping
    pub deprecated_used: Vec<String>,
    /// Canonical names found, sorted
    pub found: Vec<String>,
}

impl ValidationResult {
    /// Stage issues this validation contributes: malformed syntax as errors, the rest as warnings
    #[must_use]
    pub fn issues(&self) -> (Vec<StageIssue>, Vec<StageIssue>) {
        let errors = self
            .malformed
            .iter()
            .map(|m| StageIssue::from(m.to_error()))
            .collect();
        let mut warnings: Vec<StageIssue> = self
            .required_missing
            .iter()
            .map(|name| StageIssue::notice(format!("Required placeholder {{{name}}} is missing")))
            .collect();
        warnings.extend(self.unknown_placeholders.iter().map(|name| {
            StageIssue::notice(format!(
                "Placeholder {{{name}}} has no canonical kind; treated as custom"
            ))
        }));
        (errors, warnings)
    }
}

/// Scan for unterminated `{` and empty `{}`
fn find_malformed(text: &str) -> Vec<MalformedPlaceholder> {
    let mut malformed = Vec::new();
    let mut open: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => {
                if let Some(start) = open.replace(idx) {
                    malformed.push(unterminated(text, start, idx));
                }
            }
            '}' => {
                if let Some(start) = open.take() {
                    if text[start + 1..idx].trim().is_empty() {
                        malformed.push(MalformedPlaceholder {
                            position: start,
                            snippet: text[start..=idx].to_string(),
                            reason: "empty placeholder".to_string(),
                        });
                    }
                }
            }
            '\n' => {
                if let Some(start) = open.take() {
                    malformed.push(unterminated(text, start, idx));
                }
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        malformed.push(unterminated(text, start, text.len()));
    }
    malformed
}

fn unterminated(text: &str, start: usize, stop: usize) -> MalformedPlaceholder {
    let snippet: String = text[start..stop].chars().take(30).collect();
    MalformedPlaceholder {
        position: start,
        snippet,
        reason: "unterminated placeholder".to_string(),
    }
}

/// Check required placeholders, malformed syntax and unknown names
#[must_use]
pub fn validate_text(text: &str) -> ValidationResult {
    let found: BTreeSet<String> = CANONICAL_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    let required_missing: Vec<String> = PlaceholderKind::canonical()
        .map(PlaceholderKind::profile)
        .filter(|profile| profile.required && !found.contains(profile.canonical_name))
        .map(|profile| profile.canonical_name.to_string())
        .collect();

    let unknown_placeholders: Vec<String> = found
        .iter()
        .filter(|name| PlaceholderKind::from_name(name) == PlaceholderKind::Custom)
        .cloned()
        .collect();

    let malformed = find_malformed(text);
    ValidationResult {
        is_valid: required_missing.is_empty() && malformed.is_empty(),
        required_missing,
        malformed,
        unknown_placeholders,
        deprecated_used: Vec::new(),
        found: found.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_primary_keyword_is_invalid() {
        let result = validate_text("Write about {tone} things");
        assert!(!result.is_valid);
        assert_eq!(result.required_missing, vec!["primary_keyword".to_string()]);
        assert!(result.malformed.is_empty());
    }

    #[test]
    fn complete_template_is_valid() {
        let result = validate_text("Write about {primary_keyword} for {target_audience}.");
        assert!(result.is_valid);
        assert_eq!(result.found, vec!["primary_keyword", "target_audience"]);
    }

    #[test]
    fn empty_and_unterminated_braces_are_malformed() {
        let result = validate_text("{primary_keyword} {} and {tone\nnext {niche");
        let reasons: Vec<_> = result
            .malformed
            .iter()
            .map(|m| (m.position, m.reason.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (18, "empty placeholder"),
                (25, "unterminated placeholder"),
                (36, "unterminated placeholder"),
            ]
        );
        assert!(!result.is_valid);
        let (errors, _) = result.issues();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn padded_braces_count_as_found() {
        let result = validate_text("Write about { primary_keyword } for {target_audience}.");
        assert!(result.is_valid);
        assert!(result.required_missing.is_empty());
        assert_eq!(result.found, vec!["primary_keyword", "target_audience"]);
    }

    #[test]
    fn unknown_names_are_reported_not_rejected() {
        let result = validate_text("{primary_keyword} in {brand_voice}");
        assert!(result.is_valid);
        assert_eq!(result.unknown_placeholders, vec!["brand_voice".to_string()]);
        let (_, warnings) = result.issues();
        assert_eq!(warnings.len(), 1);
    }
}
