use gapfill_model::{
    clamp_unit, CacheStats, DetectedGap, GapError, PlaceholderKind, RuleSpec, TtlCache,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ValidatorConfig;

/// A failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFinding {
    pub rule: String,
    pub message: String,
}

/// Verdict of [`BasicValidator::validate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub confidence: f32,
    /// Equal to `confidence`
    pub validation_score: f32,
    /// Blocking failures
    pub issues: Vec<RuleFinding>,
    /// Non-blocking failures
    pub warnings: Vec<RuleFinding>,
    pub rules_evaluated: usize,
}

enum Verdict {
    Pass,
    Fail {
        message: String,
        factor: f32,
        blocking: bool,
    },
}

impl Verdict {
    fn fail(message: impl Into<String>, factor: f32, blocking: bool) -> Self {
        Self::Fail {
            message: message.into(),
            factor,
            blocking,
        }
    }
}

const BROKEN_RULE_FACTOR: f32 = 0.5;

#[derive(Debug)]
enum CompiledRule {
    Required,
    Length {
        min: usize,
        max: usize,
    },
    Format {
        regex: std::result::Result<Regex, String>,
        description: String,
    },
    OneOf {
        values: Vec<String>,
        allow_numeric: bool,
        blocking: bool,
    },
    NumericRange {
        min: f64,
        max: f64,
    },
    CommaSeparated {
        min_items: usize,
        max_items: usize,
    },
    NoSpecialCharacters,
    NumericReasonable,
}

impl CompiledRule {
    fn compile(spec: &RuleSpec) -> Self {
        match spec {
            RuleSpec::Required => Self::Required,
            RuleSpec::Length { min, max } => Self::Length {
                min: *min,
                max: *max,
            },
            RuleSpec::Format {
                pattern,
                description,
            } => Self::Format {
                regex: Regex::new(pattern).map_err(|err| err.to_string()),
                description: description.clone(),
            },
            RuleSpec::OneOf {
                values,
                allow_numeric,
                blocking,
            } => Self::OneOf {
                values: values.iter().map(|v| v.to_lowercase()).collect(),
                allow_numeric: *allow_numeric,
                blocking: *blocking,
            },
            RuleSpec::NumericRange { min, max } => Self::NumericRange {
                min: *min,
                max: *max,
            },
            RuleSpec::CommaSeparated {
                min_items,
                max_items,
            } => Self::CommaSeparated {
                min_items: *min_items,
                max_items: *max_items,
            },
            RuleSpec::NoSpecialCharacters => Self::NoSpecialCharacters,
            RuleSpec::NumericReasonable => Self::NumericReasonable,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Length { .. } => "length",
            Self::Format { .. } => "format",
            Self::OneOf { .. } => "one_of",
            Self::NumericRange { .. } => "numeric_range",
            Self::CommaSeparated { .. } => "comma_separated",
            Self::NoSpecialCharacters => "no_special_characters",
            Self::NumericReasonable => "numeric_reasonable",
        }
    }

    fn evaluate(&self, value: &str) -> std::result::Result<Verdict, GapError> {
        let verdict = match self {
            Self::Required => {
                if value.is_empty() {
                    Verdict::fail("value is required", 0.5, true)
                } else {
                    Verdict::Pass
                }
            }
            Self::Length { min, max } => {
                let len = value.chars().count();
                if len < *min || len > *max {
                    Verdict::fail(
                        format!("length {len} outside [{min}, {max}]"),
                        0.7,
                        true,
                    )
                } else {
                    Verdict::Pass
                }
            }
            Self::Format { regex, description } => {
                let regex = regex
                    .as_ref()
                    .map_err(|err| GapError::rule(self.name(), err.clone()))?;
                if regex.is_match(value) {
                    Verdict::Pass
                } else {
                    Verdict::fail(format!("expected {description}"), 0.6, true)
                }
            }
            Self::OneOf {
                values,
                allow_numeric,
                blocking,
            } => {
                let lowered = value.to_lowercase();
                if values.contains(&lowered) || (*allow_numeric && parse_number(value).is_some())
                {
                    Verdict::Pass
                } else {
                    let factor = if *blocking { 0.7 } else { 0.8 };
                    Verdict::fail(
                        format!("'{value}' is not one of: {}", values.join(", ")),
                        factor,
                        *blocking,
                    )
                }
            }
            Self::NumericRange { min, max } => match parse_number(value) {
                Some(number) if number < *min || number > *max => Verdict::fail(
                    format!("{number} outside [{min}, {max}]"),
                    0.7,
                    true,
                ),
                _ => Verdict::Pass,
            },
            Self::CommaSeparated {
                min_items,
                max_items,
            } => {
                let parts: Vec<&str> = value.split(',').map(str::trim).collect();
                if parts.iter().any(|p| p.is_empty()) {
                    Verdict::fail("empty item in comma-separated list", 0.85, false)
                } else if parts.len() < *min_items || parts.len() > *max_items {
                    Verdict::fail(
                        format!(
                            "{} item(s), expected {min_items} to {max_items}",
                            parts.len()
                        ),
                        0.85,
                        false,
                    )
                } else {
                    Verdict::Pass
                }
            }
            Self::NoSpecialCharacters => {
                let offending: String = value
                    .chars()
                    .filter(|c| {
                        !(c.is_alphanumeric()
                            || c.is_whitespace()
                            || matches!(c, '-' | '_' | ',' | '.' | '\'' | '&' | '/'))
                    })
                    .collect();
                if offending.is_empty() {
                    Verdict::Pass
                } else {
                    Verdict::fail(format!("special characters: {offending}"), 0.9, false)
                }
            }
            Self::NumericReasonable => match parse_number(value) {
                Some(number)
                    if number <= 0.0
                        || number > 1_000_000.0
                        || (number * 100.0).fract().abs() > f64::EPSILON =>
                {
                    Verdict::fail(format!("{number} is not a reasonable quantity"), 0.95, false)
                }
                _ => Verdict::Pass,
            },
        };
        Ok(verdict)
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

/// Structural per-kind checks for a candidate fill value
#[derive(Debug)]
pub struct BasicValidator {
    rules: HashMap<PlaceholderKind, Vec<CompiledRule>>,
    cache: TtlCache<(PlaceholderKind, String), ValidationOutcome>,
}

impl Default for BasicValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl BasicValidator {
    #[must_use]
    pub fn new(config: ValidatorConfig) -> Self {
        let rules = PlaceholderKind::ALL
            .into_iter()
            .map(|kind| {
                let compiled = kind.default_rules().iter().map(CompiledRule::compile).collect();
                (kind, compiled)
            })
            .collect();
        Self {
            rules,
            cache: TtlCache::new(config.cache),
        }
    }

    /// Replace the rule list for one kind
    #[must_use]
    pub fn with_rules(mut self, kind: PlaceholderKind, rules: &[RuleSpec]) -> Self {
        self.rules
            .insert(kind, rules.iter().map(CompiledRule::compile).collect());
        self.cache.clear();
        self
    }

    /// Evaluate the kind's rules in order. Never fails: a rule that cannot be evaluated counts
    /// as a failed blocking rule.
    pub fn validate(&self, kind: PlaceholderKind, value: &str) -> ValidationOutcome {
        let key = (kind, value.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let outcome = self.evaluate(kind, value.trim());
        self.cache.insert(key, outcome.clone());
        outcome
    }

    /// Validate a value proposed for a detected gap
    pub fn validate_gap(&self, gap: &DetectedGap, value: &str) -> ValidationOutcome {
        self.validate(gap.kind, value)
    }

    fn evaluate(&self, kind: PlaceholderKind, value: &str) -> ValidationOutcome {
        let mut confidence = 1.0f32;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut rules_evaluated = 0usize;

        for rule in self.rules.get(&kind).map(Vec::as_slice).unwrap_or_default() {
            rules_evaluated += 1;
            match rule.evaluate(value) {
                Ok(Verdict::Pass) => {}
                Ok(Verdict::Fail {
                    message,
                    factor,
                    blocking,
                }) => {
                    confidence *= factor;
                    let finding = RuleFinding {
                        rule: rule.name().to_string(),
                        message,
                    };
                    if blocking {
                        issues.push(finding);
                    } else {
                        warnings.push(finding);
                    }
                    if matches!(rule, CompiledRule::Required) {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("rule evaluation failed for {kind}: {err}");
                    confidence *= BROKEN_RULE_FACTOR;
                    issues.push(RuleFinding {
                        rule: rule.name().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let confidence = clamp_unit(confidence);
        ValidationOutcome {
            is_valid: issues.is_empty(),
            confidence,
            validation_score: confidence,
            issues,
            warnings,
            rules_evaluated,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn valid_primary_keyword() {
        let outcome = BasicValidator::default().validate(PlaceholderKind::PrimaryKeyword, "seo");
        assert!(outcome.is_valid);
        assert_eq!(outcome.confidence, 1.0);
        assert_eq!(outcome.rules_evaluated, 4);
    }

    #[test]
    fn empty_value_short_circuits_on_required() {
        let outcome = BasicValidator::default().validate(PlaceholderKind::Tone, "   ");
        assert!(!outcome.is_valid);
        assert_eq!(outcome.rules_evaluated, 1);
        assert!((outcome.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn non_blocking_failures_are_warnings() {
        let outcome = BasicValidator::default().validate(PlaceholderKind::Tone, "sarcastic");
        assert!(outcome.is_valid);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].rule, "one_of");
        assert!((outcome.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn length_accepts_numbers_and_labels() {
        let validator = BasicValidator::default();
        assert!(validator.validate(PlaceholderKind::Length, "1500").is_valid);
        assert!(validator.validate(PlaceholderKind::Length, "Medium").is_valid);
        let too_long = validator.validate(PlaceholderKind::Length, "50000");
        assert!(!too_long.is_valid);
        assert_eq!(too_long.issues[0].rule, "numeric_range");
        let nonsense = validator.validate(PlaceholderKind::Length, "huge");
        assert!(!nonsense.is_valid);
    }

    #[test]
    fn comma_separated_counts_items() {
        let validator = BasicValidator::default();
        let one = validator.validate(PlaceholderKind::SecondaryKeywords, "seo");
        assert_eq!(one.warnings[0].rule, "comma_separated");
        let three = validator.validate(PlaceholderKind::SecondaryKeywords, "seo, ads, email");
        assert!(three.warnings.is_empty());
    }

    #[test]
    fn broken_format_rule_counts_as_failed() {
        let validator = BasicValidator::default().with_rules(
            PlaceholderKind::ClusterId,
            &[RuleSpec::Format {
                pattern: "([unclosed".to_string(),
                description: "anything".to_string(),
            }],
        );
        let outcome = validator.validate(PlaceholderKind::ClusterId, "abc");
        assert!(!outcome.is_valid);
        assert!((outcome.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn special_characters_warn() {
        let outcome =
            BasicValidator::default().validate(PlaceholderKind::Niche, "fitness <script>");
        assert!(outcome.is_valid);
        assert_eq!(outcome.warnings[0].rule, "no_special_characters");
    }
}
