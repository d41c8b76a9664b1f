use gapfill_model::text::content_hash;
use gapfill_model::{CacheStats, GapError, Result, StageIssue, TtlCache};
use serde::{Deserialize, Serialize};

use crate::config::UnifierConfig;
use crate::format::{count_notations, leftover_legacy, FormatCounts, PlaceholderFormat};
use crate::mapping::{self, Notation, PlaceholderMapping, DEFAULT_MAPPINGS};
use crate::validation::{validate_text, ValidationResult};

/// One mapping that fired during a migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub old_pattern: String,
    pub canonical_name: String,
    pub occurrences: usize,
    pub deprecated: bool,
}

/// Outcome of [`Unifier::migrate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub migrated_text: String,
    pub format_detected: PlaceholderFormat,
    pub counts: FormatCounts,
    pub migrations_applied: Vec<MigrationRecord>,
    pub errors: Vec<StageIssue>,
    pub warnings: Vec<StageIssue>,
    /// False when migration failed and `migrated_text` is the untouched input
    pub success: bool,
    /// Text was already canonical and nothing was attempted
    pub no_op: bool,
    pub validation: ValidationResult,
}

impl MigrationResult {
    #[must_use]
    pub fn total_replacements(&self) -> usize {
        self.migrations_applied.iter().map(|m| m.occurrences).sum()
    }
}

/// Rewrites legacy placeholder notations to canonical `{name}` form
#[derive(Debug)]
pub struct Unifier {
    mappings: Vec<PlaceholderMapping>,
    config: UnifierConfig,
    cache: TtlCache<(String, bool), MigrationResult>,
}

impl Default for Unifier {
    fn default() -> Self {
        Self::new(UnifierConfig::default())
    }
}

impl Unifier {
    /// Unifier over the built-in mapping table
    #[must_use]
    pub fn new(config: UnifierConfig) -> Self {
        Self {
            mappings: DEFAULT_MAPPINGS.clone(),
            cache: TtlCache::new(config.cache),
            config,
        }
    }

    /// Unifier over a caller-supplied mapping table
    pub fn with_mappings(config: UnifierConfig, mappings: Vec<PlaceholderMapping>) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        let mappings = mapping::prepare(mappings)?;
        Ok(Self {
            mappings,
            cache: TtlCache::new(config.cache),
            config,
        })
    }

    pub fn config(&self) -> &UnifierConfig {
        &self.config
    }

    /// Mappings in substitution order
    pub fn mappings(&self) -> &[PlaceholderMapping] {
        &self.mappings
    }

    /// Legacy mappings that produce `canonical_name`
    pub fn mappings_for(&self, canonical_name: &str) -> Vec<&PlaceholderMapping> {
        self.mappings
            .iter()
            .filter(|m| m.canonical_name == canonical_name)
            .collect()
    }

    pub fn detect_format(&self, text: &str) -> PlaceholderFormat {
        count_notations(text).format()
    }

    /// Check canonical placeholders without migrating
    pub fn validate(&self, text: &str) -> ValidationResult {
        validate_text(text)
    }

    /// Rewrite legacy placeholders to canonical form.
    ///
    /// Never fails: an internal failure returns the original text with `success = false` and
    /// the error recorded in `errors`.
    pub fn migrate(&self, text: &str, force: bool) -> MigrationResult {
        let key = (content_hash(text), force);
        if let Some(cached) = self.cache.get(&key) {
            log::debug!("unification cache hit");
            return cached;
        }

        let result = match self.try_migrate(text, force) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("placeholder migration failed: {err}");
                MigrationResult {
                    migrated_text: text.to_string(),
                    format_detected: PlaceholderFormat::Unknown,
                    counts: FormatCounts::default(),
                    migrations_applied: Vec::new(),
                    errors: vec![StageIssue::from(err)],
                    warnings: vec![StageIssue::notice(
                        "Migration skipped; continuing with the original text",
                    )],
                    success: false,
                    no_op: false,
                    validation: ValidationResult::default(),
                }
            }
        };
        self.cache.insert(key, result.clone());
        result
    }

    fn try_migrate(&self, text: &str, force: bool) -> Result<MigrationResult> {
        if text.len() > self.config.max_input_bytes {
            return Err(GapError::migration(format!(
                "input is {} bytes, limit is {}",
                text.len(),
                self.config.max_input_bytes
            )));
        }

        let counts = count_notations(text);
        let format_detected = counts.format();

        if !force && !format_detected.is_legacy() {
            let validation = validate_text(text);
            let (errors, warnings) = validation.issues();
            return Ok(MigrationResult {
                migrated_text: text.to_string(),
                format_detected,
                counts,
                migrations_applied: Vec::new(),
                errors,
                warnings,
                success: true,
                no_op: true,
                validation,
            });
        }

        let mut migrated = text.to_string();
        let mut applied = Vec::new();
        let mut warnings = Vec::new();

        for mapping in &self.mappings {
            let (next, occurrences) = substitute(&migrated, mapping);
            if occurrences == 0 {
                continue;
            }
            migrated = next;
            if mapping.deprecated {
                warnings.push(StageIssue::notice(format!(
                    "Deprecated placeholder {} migrated to {}",
                    mapping.old_pattern, mapping.replacement
                )));
            }
            applied.push(MigrationRecord {
                old_pattern: mapping.old_pattern.clone(),
                canonical_name: mapping.canonical_name.clone(),
                occurrences,
                deprecated: mapping.deprecated,
            });
        }

        if self.config.warn_unmapped {
            for leftover in leftover_legacy(&migrated) {
                warnings.push(StageIssue::notice(format!(
                    "Legacy placeholder {leftover} has no mapping and was left unchanged"
                )));
            }
        }

        let mut validation = validate_text(&migrated);
        validation.deprecated_used = applied
            .iter()
            .filter(|record| record.deprecated)
            .map(|record| record.old_pattern.clone())
            .collect();
        let (errors, validation_warnings) = validation.issues();
        warnings.extend(validation_warnings);

        log::debug!(
            "unified {:?} template: {} mapping(s) applied",
            format_detected,
            applied.len()
        );

        Ok(MigrationResult {
            migrated_text: migrated,
            format_detected,
            counts,
            migrations_applied: applied,
            errors,
            warnings,
            success: true,
            no_op: false,
            validation,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Literal replacement; dollar patterns must not run into a longer identifier
fn substitute(text: &str, mapping: &PlaceholderMapping) -> (String, usize) {
    if mapping.notation != Notation::Dollar {
        let occurrences = text.matches(mapping.old_pattern.as_str()).count();
        if occurrences == 0 {
            return (String::new(), 0);
        }
        return (
            text.replace(mapping.old_pattern.as_str(), &mapping.replacement),
            occurrences,
        );
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut occurrences = 0usize;
    for (idx, matched) in text.match_indices(mapping.old_pattern.as_str()) {
        let after = idx + matched.len();
        let bounded = text[after..].chars().next().map_or(true, |c| !is_identifier_char(c));
        if !bounded {
            continue;
        }
        out.push_str(&text[last..idx]);
        out.push_str(&mapping.replacement);
        last = after;
        occurrences += 1;
    }
    if occurrences == 0 {
        return (String::new(), 0);
    }
    out.push_str(&text[last..]);
    (out, occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn brackets_become_canonical() {
        let unifier = Unifier::default();
        let result = unifier.migrate("[PALAVRA-CHAVE]", false);
        assert_eq!(result.migrated_text, "{primary_keyword}");
        assert_eq!(result.migrations_applied.len(), 1);
        assert_eq!(result.format_detected, PlaceholderFormat::OldBrackets);
        assert!(result.success);
        assert!(!result.no_op);
    }

    #[test]
    fn dollar_respects_identifier_boundary() {
        let unifier = Unifier::default();
        let result = unifier.migrate("Use $keywords and $keyword.", false);
        assert_eq!(
            result.migrated_text,
            "Use {secondary_keywords} and {primary_keyword}."
        );
    }

    #[test]
    fn deprecated_mapping_warns() {
        let unifier = Unifier::default();
        let result = unifier.migrate("[KEYWORD] for [PUBLICO_ALVO]", false);
        assert_eq!(
            result.migrated_text,
            "{primary_keyword} for {target_audience}"
        );
        assert_eq!(result.validation.deprecated_used, vec!["[KEYWORD]".to_string()]);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("Deprecated placeholder [KEYWORD]")));
    }

    #[test]
    fn unmapped_legacy_placeholder_is_left_with_warning() {
        let unifier = Unifier::default();
        let result = unifier.migrate("[PALAVRA-CHAVE] by [AUTHOR]", false);
        assert_eq!(result.migrated_text, "{primary_keyword} by [AUTHOR]");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("[AUTHOR]")));
    }

    #[test]
    fn oversized_input_degrades_to_original() {
        let config = UnifierConfig {
            max_input_bytes: 8,
            ..UnifierConfig::default()
        };
        let unifier = Unifier::new(config);
        let text = "[PALAVRA-CHAVE] is long";
        let result = unifier.migrate(text, false);
        assert!(!result.success);
        assert_eq!(result.migrated_text, text);
        assert_eq!(result.errors[0].kind, gapfill_model::ErrorKind::Migration);
    }

    #[test]
    fn repeated_calls_hit_the_cache() {
        let unifier = Unifier::default();
        let first = unifier.migrate("[TOM]", false);
        let second = unifier.migrate("[TOM]", false);
        assert_eq!(first, second);
        assert_eq!(unifier.cache_stats().hits, 1);
        unifier.clear_cache();
        assert_eq!(unifier.cache_stats().entries, 0);
    }

    #[test]
    fn mappings_for_lists_every_notation() {
        let unifier = Unifier::default();
        let patterns: Vec<&str> = unifier
            .mappings_for("tone")
            .iter()
            .map(|m| m.old_pattern.as_str())
            .collect();
        assert!(patterns.contains(&"[TOM]"));
        assert!(patterns.contains(&"$tone"));
        assert!(patterns.contains(&"<tom_de_voz>"));
        assert!(patterns.contains(&"[[tone]]"));
    }
}
