//! Cross-gap validation: coherence, flow and consistency of a template as a whole.

use gapfill_model::text::{centered_excerpt, content_tokens, strip_placeholders};
use gapfill_model::{
    clamp_unit_f64, DetectedGap, GapError, GapId, Result, Severity, Span, StageIssue,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::ContextValidatorConfig;
use crate::context::{context_relevance, intent_alignment, GeneralContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    SemanticCoherence,
    LogicalFlow,
    ContextualConsistency,
    PlaceholderRelevance,
    ContentStructure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextValidationIssue {
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    pub context: String,
    pub suggestion: String,
    pub confidence: f32,
}

/// Per-gap scores against the whole-text context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAssessment {
    pub gap: GapId,
    pub context_relevance: f32,
    pub intent_alignment: f32,
    pub semantic_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextValidationResult {
    pub is_valid: bool,
    pub overall_score: f64,
    pub coherence_score: f64,
    pub flow_score: f64,
    pub consistency_score: f64,
    pub issues: Vec<ContextValidationIssue>,
    pub warnings: Vec<StageIssue>,
    pub suggestions: Vec<String>,
    pub assessments: Vec<GapAssessment>,
    pub validation_time_ms: u64,
}

impl ContextValidationResult {
    fn failed(err: &GapError, elapsed_ms: u64) -> Self {
        Self {
            is_valid: false,
            overall_score: 0.0,
            coherence_score: 0.0,
            flow_score: 0.0,
            consistency_score: 0.0,
            issues: Vec::new(),
            warnings: vec![StageIssue::from(err)],
            suggestions: Vec::new(),
            assessments: Vec::new(),
            validation_time_ms: elapsed_ms,
        }
    }

    pub fn count(&self, issue_type: IssueType) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.issue_type == issue_type)
            .count()
    }

    pub fn has_critical(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Critical)
    }
}

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]+\S.*|[A-Z][A-Za-z ]{0,60}:[ \t]*|\d+[.)][ \t]+\S.*)$")
        .expect("valid heading regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Introduction,
    Development,
    Conclusion,
}

impl Segment {
    const ALL: [Self; 3] = [Self::Introduction, Self::Development, Self::Conclusion];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Introduction => "introduction",
            Self::Development => "development",
            Self::Conclusion => "conclusion",
        }
    }
}

/// Checks that the gaps of a template make sense together
#[derive(Debug, Clone, Default)]
pub struct ContextValidator {
    config: ContextValidatorConfig,
}

impl ContextValidator {
    pub fn new(config: ContextValidatorConfig) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ContextValidatorConfig {
        &self.config
    }

    /// Validate `gaps` against `text`. Internal failures come back as an invalid result with a
    /// warning, never as an error.
    pub fn validate(&self, text: &str, gaps: &[DetectedGap]) -> ContextValidationResult {
        let started = Instant::now();
        match self.try_validate(text, gaps, started) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("context validation failed: {err}");
                ContextValidationResult::failed(&err, started.elapsed().as_millis() as u64)
            }
        }
    }

    fn try_validate(
        &self,
        text: &str,
        gaps: &[DetectedGap],
        started: Instant,
    ) -> Result<ContextValidationResult> {
        if text.len() > self.config.max_input_bytes {
            return Err(GapError::context_validation(format!(
                "input is {} bytes, limit is {}",
                text.len(),
                self.config.max_input_bytes
            )));
        }
        let mut sorted: Vec<&DetectedGap> = gaps.iter().collect();
        sorted.sort_by_key(|gap| gap.span.start);
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0].span.overlaps(&pair[1].span)) {
            return Err(GapError::context_validation(format!(
                "gaps {} and {} overlap",
                pair[0].id(),
                pair[1].id()
            )));
        }

        let general = GeneralContext::from_text(text);
        let assessments: Vec<GapAssessment> = sorted
            .iter()
            .map(|gap| {
                let relevance = context_relevance(gap.kind, &gap.name, &general);
                let alignment = intent_alignment(gap.kind, &general.intents);
                GapAssessment {
                    gap: gap.id(),
                    context_relevance: relevance,
                    intent_alignment: alignment,
                    semantic_confidence: (relevance + alignment) / 2.0,
                }
            })
            .collect();

        let mut issues = Vec::new();
        self.check_consistency(text, &sorted, &general, &mut issues);
        self.check_relevance(text, &sorted, &assessments, &mut issues);
        let covered_segments = self.check_flow(text, &sorted, &mut issues);
        self.check_structure(text, &sorted, &mut issues);

        let count = |types: &[IssueType]| -> f64 {
            issues
                .iter()
                .filter(|issue| types.contains(&issue.issue_type))
                .count() as f64
        };
        let step = self.config.score_step;
        let base = self.config.base_score;

        let coherence_bonus = if !general.topics.is_empty() && !general.intents.is_empty() {
            step
        } else {
            0.0
        };
        let coherence_score = clamp_unit_f64(
            base - step * count(&[IssueType::SemanticCoherence, IssueType::PlaceholderRelevance])
                + coherence_bonus,
        );

        let flow_bonus = if covered_segments == Segment::ALL.len() { step } else { 0.0 };
        let flow_score = clamp_unit_f64(
            base - step * count(&[IssueType::LogicalFlow, IssueType::ContentStructure]) + flow_bonus,
        );

        let distinct = sorted
            .iter()
            .map(|gap| gap.kind)
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        let consistency_bonus = if !sorted.is_empty() && distinct == sorted.len() {
            step
        } else {
            0.0
        };
        let consistency_score = clamp_unit_f64(
            base - step * count(&[IssueType::ContextualConsistency]) + consistency_bonus,
        );

        let weights = &self.config.severity_weights;
        let weighted: f64 = issues
            .iter()
            .map(|issue| weights.weight(issue.severity) * f64::from(issue.confidence))
            .sum();
        let overall_score = clamp_unit_f64(1.0 - weighted / weights.total());

        let has_critical = issues.iter().any(|i| i.severity == Severity::Critical);
        let is_valid = overall_score >= self.config.min_overall_score && !has_critical;

        let mut warnings = Vec::new();
        if overall_score < self.config.min_overall_score {
            warnings.push(StageIssue::notice(format!(
                "Context score {overall_score:.2} is below {:.2}",
                self.config.min_overall_score
            )));
        }

        let mut suggestions: Vec<String> = Vec::new();
        for issue in &issues {
            if !suggestions.contains(&issue.suggestion) {
                suggestions.push(issue.suggestion.clone());
            }
        }

        log::debug!(
            "context validation: {} issue(s), overall {:.2}",
            issues.len(),
            overall_score
        );

        Ok(ContextValidationResult {
            is_valid,
            overall_score,
            coherence_score,
            flow_score,
            consistency_score,
            issues,
            warnings,
            suggestions,
            assessments,
            validation_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn check_consistency(
        &self,
        text: &str,
        gaps: &[&DetectedGap],
        general: &GeneralContext,
        issues: &mut Vec<ContextValidationIssue>,
    ) {
        for (idx, gap) in gaps.iter().enumerate() {
            let redundant = gaps[idx + 1..].iter().find(|other| {
                other.kind == gap.kind
                    && other.name == gap.name
                    && gap.span.distance(&other.span) <= self.config.redundancy_distance
            });
            if let Some(other) = redundant {
                issues.push(ContextValidationIssue {
                    issue_type: IssueType::ContextualConsistency,
                    severity: Severity::Medium,
                    description: format!(
                        "{} appears twice within {} characters",
                        gap.placeholder(),
                        self.config.redundancy_distance
                    ),
                    span: Span::new(gap.span.start, other.span.end),
                    context: excerpt(text, gap.span),
                    suggestion: format!("Remove the repeated {}", other.placeholder()),
                    confidence: 0.8,
                });
            }
        }

        if general.topics.len() >= 3 && !gaps.is_empty() {
            issues.push(ContextValidationIssue {
                issue_type: IssueType::SemanticCoherence,
                severity: Severity::Low,
                description: format!(
                    "Text mixes {} topics ({})",
                    general.topics.len(),
                    general.topics.join(", ")
                ),
                span: None,
                context: text.chars().take(120).collect(),
                suggestion: "Focus the template on one subject".to_string(),
                confidence: 0.5,
            });
        }
        if general.topics.is_empty() {
            if let Some(gap) = gaps.iter().find(|gap| gap.kind.profile().keyword_like) {
                issues.push(ContextValidationIssue {
                    issue_type: IssueType::ContextualConsistency,
                    severity: Severity::Medium,
                    description: format!(
                        "{} expects a topic but the text does not establish one",
                        gap.placeholder()
                    ),
                    span: Some(gap.span),
                    context: excerpt(text, gap.span),
                    suggestion: "Mention the subject the keywords should relate to".to_string(),
                    confidence: 0.6,
                });
            }
        }
        if general.audiences.is_empty() {
            if let Some(gap) = gaps.iter().find(|gap| gap.kind.profile().audience_like) {
                issues.push(ContextValidationIssue {
                    issue_type: IssueType::ContextualConsistency,
                    severity: Severity::Low,
                    description: format!(
                        "{} has no audience cues in the surrounding text",
                        gap.placeholder()
                    ),
                    span: Some(gap.span),
                    context: excerpt(text, gap.span),
                    suggestion: "Describe who the content is for".to_string(),
                    confidence: 0.6,
                });
            }
        }
    }

    fn check_relevance(
        &self,
        text: &str,
        gaps: &[&DetectedGap],
        assessments: &[GapAssessment],
        issues: &mut Vec<ContextValidationIssue>,
    ) {
        for (gap, assessment) in gaps.iter().zip(assessments) {
            if assessment.context_relevance >= self.config.min_relevance {
                continue;
            }
            issues.push(ContextValidationIssue {
                issue_type: IssueType::PlaceholderRelevance,
                severity: Severity::Low,
                description: format!(
                    "{} has weak contextual support ({:.2})",
                    gap.placeholder(),
                    assessment.context_relevance
                ),
                span: Some(gap.span),
                context: excerpt(text, gap.span),
                suggestion: format!("Add context that motivates {}", gap.placeholder()),
                confidence: 0.5,
            });
        }
    }

    /// Flag empty segments; returns how many segments hold at least one gap
    fn check_flow(
        &self,
        text: &str,
        gaps: &[&DetectedGap],
        issues: &mut Vec<ContextValidationIssue>,
    ) -> usize {
        if gaps.is_empty() || text.is_empty() {
            return 0;
        }
        let bounds = self.segment_bounds(text);
        let mut covered = 0usize;
        for (segment, (start, end)) in Segment::ALL.into_iter().zip(bounds) {
            let holds_gap = gaps
                .iter()
                .any(|gap| gap.span.start >= start && gap.span.start < end);
            if holds_gap {
                covered += 1;
                continue;
            }
            let (severity, confidence) = if gaps.len() < 3 {
                (Severity::Info, 0.6)
            } else {
                (Severity::Low, 0.6)
            };
            issues.push(ContextValidationIssue {
                issue_type: IssueType::LogicalFlow,
                severity,
                description: format!("The {} has no placeholders", segment.as_str()),
                span: Span::new(start, end),
                context: text[start..end].chars().take(120).collect(),
                suggestion: format!("Consider a placeholder in the {}", segment.as_str()),
                confidence,
            });
        }
        covered
    }

    /// Introduction, development and conclusion byte ranges
    fn segment_bounds(&self, text: &str) -> [(usize, usize); 3] {
        let markers: Vec<usize> = HEADING_RE.find_iter(text).map(|m| m.start()).collect();
        let len = text.len();
        if markers.len() >= self.config.min_heading_markers && markers.len() >= 3 {
            let second = markers[1];
            let last = markers[markers.len() - 1];
            return [(0, second), (second, last), (last, len)];
        }
        let first = floor_boundary(text, len / 4);
        let second = floor_boundary(text, len * 3 / 4);
        [(0, first), (first, second), (second, len)]
    }

    fn check_structure(
        &self,
        text: &str,
        gaps: &[&DetectedGap],
        issues: &mut Vec<ContextValidationIssue>,
    ) {
        for gap in gaps {
            let intact = text
                .get(gap.span.start..gap.span.end)
                .is_some_and(|slice| slice == gap.placeholder());
            if !intact {
                issues.push(ContextValidationIssue {
                    issue_type: IssueType::ContentStructure,
                    severity: Severity::Critical,
                    description: format!(
                        "span {} does not hold {}",
                        gap.span,
                        gap.placeholder()
                    ),
                    span: Some(gap.span),
                    context: String::new(),
                    suggestion: "Re-run detection on the current text".to_string(),
                    confidence: 1.0,
                });
            }
        }

        if !gaps.is_empty() && content_tokens(&strip_placeholders(text)).len() < 3 {
            issues.push(ContextValidationIssue {
                issue_type: IssueType::ContentStructure,
                severity: Severity::High,
                description: "Template is almost entirely placeholders".to_string(),
                span: None,
                context: text.chars().take(120).collect(),
                suggestion: "Add instructions or prose around the placeholders".to_string(),
                confidence: 0.9,
            });
        }
    }
}

fn floor_boundary(text: &str, idx: usize) -> usize {
    gapfill_model::text::floor_char_boundary(text, idx)
}

fn excerpt(text: &str, span: Span) -> String {
    centered_excerpt(text, span, 60, 120)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_model::{DetectionMethod, PlaceholderKind, ValidationLevel};
    use pretty_assertions::assert_eq;

    fn gap(text: &str, name: &str) -> DetectedGap {
        let placeholder = format!("{{{name}}}");
        let start = text.find(&placeholder).unwrap();
        DetectedGap {
            kind: PlaceholderKind::from_name(name),
            name: name.to_string(),
            span: Span::new(start, start + placeholder.len()).unwrap(),
            local_context: String::new(),
            confidence: 0.95,
            detection_method: DetectionMethod::KindPattern,
            validation_level: ValidationLevel::None,
            suggested_value: None,
            validation_score: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn redundant_gaps_are_flagged() {
        let text = "Marketing guide: {tone} and {tone} for beginners in marketing today.";
        let first = gap(text, "tone");
        let mut second = first.clone();
        let offset = text.rfind("{tone}").unwrap();
        second.span = Span::new(offset, offset + 6).unwrap();
        let result = ContextValidator::default().validate(text, &[first, second]);
        assert!(result.issues.iter().any(|issue| {
            issue.issue_type == IssueType::ContextualConsistency
                && issue.severity == Severity::Medium
                && (issue.confidence - 0.8).abs() < 1e-6
        }));
    }

    #[test]
    fn distinct_custom_names_are_not_redundant() {
        let text = "Marketing guide by {brand} {author} for beginners in marketing today.";
        let gaps = [gap(text, "brand"), gap(text, "author")];
        assert_eq!(gaps[0].kind, gaps[1].kind);

        let result = ContextValidator::default().validate(text, &gaps);
        assert!(!result
            .issues
            .iter()
            .any(|issue| issue.description.contains("appears twice")));
    }

    #[test]
    fn keyword_gap_without_topic_is_inconsistent() {
        let text = "Please produce a long piece about {primary_keyword} with care.";
        let result = ContextValidator::default().validate(text, &[gap(text, "primary_keyword")]);
        assert!(result
            .issues
            .iter()
            .any(|issue| issue.description.contains("expects a topic")));
    }

    #[test]
    fn overall_score_follows_weighted_issues() {
        let text = "Please produce a long piece about {primary_keyword} with care.";
        let result = ContextValidator::default().validate(text, &[gap(text, "primary_keyword")]);
        let weights = ContextValidatorConfig::default().severity_weights;
        let weighted: f64 = result
            .issues
            .iter()
            .map(|i| weights.weight(i.severity) * f64::from(i.confidence))
            .sum();
        let expected = (1.0 - weighted / 3.0).clamp(0.0, 1.0);
        assert!((result.overall_score - expected).abs() < 1e-9);
        assert_eq!(
            result.is_valid,
            result.overall_score >= 0.7 && !result.has_critical()
        );
    }

    #[test]
    fn broken_span_is_critical() {
        let text = "Marketing tips for {target_audience}.";
        let mut broken = gap(text, "target_audience");
        broken.span = Span::new(0, 9).unwrap();
        let result = ContextValidator::default().validate(text, &[broken]);
        assert!(result.has_critical());
        assert!(!result.is_valid);
    }

    #[test]
    fn overlapping_gaps_fail_softly() {
        let text = "Marketing tips for {target_audience}.";
        let a = gap(text, "target_audience");
        let mut b = a.clone();
        b.span = Span::new(a.span.start + 1, a.span.end).unwrap();
        let result = ContextValidator::default().validate(text, &[a, b]);
        assert!(!result.is_valid);
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(
            result.warnings[0].kind,
            gapfill_model::ErrorKind::ContextValidation
        );
    }

    #[test]
    fn placeholder_only_template_is_high_severity() {
        let text = "{primary_keyword} {tone}";
        let result = ContextValidator::default()
            .validate(text, &[gap(text, "primary_keyword"), gap(text, "tone")]);
        assert!(result.issues.iter().any(|issue| {
            issue.issue_type == IssueType::ContentStructure && issue.severity == Severity::High
        }));
    }

    #[test]
    fn heading_markers_drive_segments() {
        let text = "# Intro\nA marketing guide on {primary_keyword}.\n# Body\nUse a {tone} voice.\n# Wrap up\nEnd with {target_audience} advice for beginners.";
        let gaps = vec![
            gap(text, "primary_keyword"),
            gap(text, "tone"),
            gap(text, "target_audience"),
        ];
        let result = ContextValidator::default().validate(text, &gaps);
        assert_eq!(result.count(IssueType::LogicalFlow), 0);
        assert!((result.flow_score - 0.9).abs() < 1e-9);
        assert_eq!(result.assessments.len(), 3);
    }

    #[test]
    fn empty_segments_are_informational_for_small_templates() {
        let text = "Write about {primary_keyword} for {target_audience}.";
        let gaps = vec![gap(text, "primary_keyword"), gap(text, "target_audience")];
        let result = ContextValidator::default().validate(text, &gaps);
        // 25/50/25 split puts both gaps before the conclusion
        let flow: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.issue_type == IssueType::LogicalFlow)
            .collect();
        assert_eq!(flow.len(), 1);
        assert_eq!(flow[0].severity, Severity::Info);
        assert!(flow[0].description.contains("conclusion"));
        for score in [
            result.overall_score,
            result.coherence_score,
            result.flow_score,
            result.consistency_score,
        ] {
            assert!((0.0..=1.0).contains(&score));
        }
    }
}
