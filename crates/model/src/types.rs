use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::kind::PlaceholderKind;

/// Half-open byte range `[start, end)` inside a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span; returns `None` unless `start < end`
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Two spans overlap when they share at least one byte
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Gap in bytes between two spans (0 when they touch or overlap)
    #[must_use]
    pub const fn distance(&self, other: &Self) -> usize {
        if self.overlaps(other) {
            0
        } else if self.end <= other.start {
            other.start - self.end
        } else {
            self.start - other.end
        }
    }

    #[must_use]
    pub const fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Identity of a detected gap; derived records reference gaps through it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GapId {
    pub kind: PlaceholderKind,
    pub span: Span,
}

impl fmt::Display for GapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind.as_str(), self.span)
    }
}

/// How a gap was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Matched a kind-specific canonical pattern
    KindPattern,
    /// Matched only the generic `{name}` catcher
    GenericCatcher,
}

/// Depth of validation a gap has been through
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    None,
    Basic,
    Semantic,
    Contextual,
}

/// A placeholder location whose fill value is not yet known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedGap {
    pub kind: PlaceholderKind,
    /// Raw placeholder name between the braces
    pub name: String,
    pub span: Span,
    /// Whitespace-normalized excerpt around the placeholder (at most 200 chars)
    pub local_context: String,
    pub confidence: f32,
    pub detection_method: DetectionMethod,
    pub validation_level: ValidationLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<f32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DetectedGap {
    #[must_use]
    pub const fn id(&self) -> GapId {
        GapId {
            kind: self.kind,
            span: self.span,
        }
    }

    /// Canonical placeholder text, e.g. `{primary_keyword}`
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.name)
    }
}

/// Ground-truth gap used when grading a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedGap {
    pub start: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<PlaceholderKind>,
}

impl ExpectedGap {
    #[must_use]
    pub const fn new(start: usize, end: usize, kind: Option<PlaceholderKind>) -> Self {
        Self { start, end, kind }
    }

    #[must_use]
    pub const fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end,
        }
    }
}

/// Ordinal ranking used to weight validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Info,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    /// Severity for a metric that fell `shortfall` below its threshold
    #[must_use]
    pub fn from_shortfall(shortfall: f64) -> Self {
        if shortfall >= 0.3 {
            Self::Critical
        } else if shortfall >= 0.2 {
            Self::High
        } else if shortfall >= 0.1 {
            Self::Medium
        } else if shortfall >= 0.05 {
            Self::Low
        } else {
            Self::Info
        }
    }
}

/// Stages of a pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Unification,
    Detection,
    SemanticAnalysis,
    ContextValidation,
    SemanticMatching,
    QualityValidation,
    FallbackGeneration,
    Integration,
}

impl PipelineStage {
    pub const ORDER: [Self; 8] = [
        Self::Unification,
        Self::Detection,
        Self::SemanticAnalysis,
        Self::ContextValidation,
        Self::SemanticMatching,
        Self::QualityValidation,
        Self::FallbackGeneration,
        Self::Integration,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unification => "unification",
            Self::Detection => "detection",
            Self::SemanticAnalysis => "semantic_analysis",
            Self::ContextValidation => "context_validation",
            Self::SemanticMatching => "semantic_matching",
            Self::QualityValidation => "quality_validation",
            Self::FallbackGeneration => "fallback_generation",
            Self::Integration => "integration",
        }
    }

    /// The stage that follows this one, `None` after integration
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let idx = Self::ORDER.iter().position(|stage| *stage == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    /// Stages the caller may switch off
    #[must_use]
    pub const fn is_optional(self) -> bool {
        !matches!(self, Self::Unification | Self::Detection | Self::Integration)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a score into `[0, 1]`, mapping NaN to 0
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// `f64` variant of [`clamp_unit`]
#[must_use]
pub fn clamp_unit_f64(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_requires_start_before_end() {
        assert!(Span::new(3, 3).is_none());
        assert!(Span::new(4, 3).is_none());
        assert_eq!(Span::new(1, 5).map(|s| s.len()), Some(4));
    }

    #[test]
    fn span_overlap_and_distance() {
        let a = Span { start: 0, end: 10 };
        let b = Span { start: 9, end: 12 };
        let c = Span { start: 40, end: 45 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.distance(&c), 30);
        assert_eq!(c.distance(&a), 30);
        assert_eq!(a.distance(&b), 0);
    }

    #[test]
    fn adjacent_spans_do_not_overlap() {
        let a = Span { start: 0, end: 5 };
        let b = Span { start: 5, end: 9 };
        assert!(!a.overlaps(&b));
        assert_eq!(a.distance(&b), 0);
    }

    #[test]
    fn stage_order_walks_to_integration() {
        let mut stage = PipelineStage::Unification;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, PipelineStage::ORDER.to_vec());
        assert!(!PipelineStage::Detection.is_optional());
        assert!(PipelineStage::SemanticMatching.is_optional());
    }

    #[test]
    fn severity_from_shortfall_buckets() {
        assert_eq!(Severity::from_shortfall(0.35), Severity::Critical);
        assert_eq!(Severity::from_shortfall(0.2), Severity::High);
        assert_eq!(Severity::from_shortfall(0.12), Severity::Medium);
        assert_eq!(Severity::from_shortfall(0.06), Severity::Low);
        assert_eq!(Severity::from_shortfall(0.01), Severity::Info);
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn clamp_handles_nan() {
        assert_eq!(clamp_unit(f32::NAN), 0.0);
        assert_eq!(clamp_unit(1.4), 1.0);
        assert_eq!(clamp_unit_f64(-0.2), 0.0);
    }

    #[test]
    fn detected_gap_serializes_to_json() {
        let gap = DetectedGap {
            kind: PlaceholderKind::Tone,
            name: "tone".to_string(),
            span: Span { start: 4, end: 10 },
            local_context: "Use {tone} here".to_string(),
            confidence: 0.92,
            detection_method: DetectionMethod::KindPattern,
            validation_level: ValidationLevel::Basic,
            suggested_value: None,
            validation_score: None,
            metadata: BTreeMap::new(),
        };
        let json = serde_json::to_value(&gap).unwrap();
        assert_eq!(json["kind"], "tone");
        assert_eq!(json["detection_method"], "kind_pattern");
        assert!(json.get("suggested_value").is_none());
        let back: DetectedGap = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), gap.id());
        assert_eq!(gap.placeholder(), "{tone}");
    }
}
