use gapfill_model::{clamp_unit_f64, DetectedGap, ExpectedGap, PipelineStage};
use serde::{Deserialize, Serialize};

/// The eight graded dimensions of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Precision,
    Recall,
    F1,
    Accuracy,
    Performance,
    Efficiency,
    Reliability,
    Consistency,
}

impl Metric {
    pub const ALL: [Self; 8] = [
        Self::Precision,
        Self::Recall,
        Self::F1,
        Self::Accuracy,
        Self::Performance,
        Self::Efficiency,
        Self::Reliability,
        Self::Consistency,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
            Self::Accuracy => "accuracy",
            Self::Performance => "performance",
            Self::Efficiency => "efficiency",
            Self::Reliability => "reliability",
            Self::Consistency => "consistency",
        }
    }

    /// Remedy suggested when the metric falls short
    #[must_use]
    pub const fn recommendation(self) -> &'static str {
        match self {
            Self::Precision => "Tighten detection patterns to cut false-positive gaps",
            Self::Recall => "Add patterns or aliases for placeholders that go undetected",
            Self::F1 => "Balance detection precision and recall",
            Self::Accuracy => "Review gap kind classification against the expected gaps",
            Self::Performance => "Enable caching or disable expensive optional stages",
            Self::Efficiency => "Check why stages drop gaps between input and output",
            Self::Reliability => "Inspect stage errors; failing stages lower reliability",
            Self::Consistency => "Reduce variance between gap scores with clearer context",
        }
    }
}

/// Scores of one run, each in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub performance: f64,
    pub efficiency: f64,
    pub reliability: f64,
    pub consistency: f64,
}

impl QualityMetrics {
    #[must_use]
    pub const fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
            Metric::F1 => self.f1,
            Metric::Accuracy => self.accuracy,
            Metric::Performance => self.performance,
            Metric::Efficiency => self.efficiency,
            Metric::Reliability => self.reliability,
            Metric::Consistency => self.consistency,
        }
    }
}

/// Timing and throughput of one pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSample {
    pub stage: PipelineStage,
    pub success: bool,
    pub elapsed_ms: f64,
    /// Gaps handed to the stage
    pub items_in: usize,
    /// Gaps the stage produced a record for
    pub items_out: usize,
}

/// Detection counts against ground truth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthCounts {
    pub true_positives: usize,
    /// True positives whose kind also agrees (or the expected kind is unspecified)
    pub kind_matches: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl GroundTruthCounts {
    /// Greedy one-to-one pairing: each expected gap takes the first unpaired detected gap whose
    /// span overlaps it.
    #[must_use]
    pub fn pair(detected: &[DetectedGap], expected: &[ExpectedGap]) -> Self {
        let mut used = vec![false; detected.len()];
        let mut counts = Self::default();
        for truth in expected {
            let span = truth.span();
            let hit = detected
                .iter()
                .enumerate()
                .find(|(idx, gap)| !used[*idx] && gap.span.overlaps(&span));
            match hit {
                Some((idx, gap)) => {
                    used[idx] = true;
                    counts.true_positives += 1;
                    if truth.kind.map_or(true, |kind| kind == gap.kind) {
                        counts.kind_matches += 1;
                    }
                }
                None => counts.false_negatives += 1,
            }
        }
        counts.false_positives = used.iter().filter(|paired| !**paired).count();
        counts
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Kind-correct pairs over every gap either side saw
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(
            self.kind_matches,
            self.true_positives + self.false_positives + self.false_negatives,
        )
    }
}

/// `num / den`, with `0 / 0` scored as perfect
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        1.0
    } else {
        num as f64 / den as f64
    }
}

#[must_use]
pub fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall <= f64::EPSILON {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// 1 within budget, `budget / elapsed` beyond it
#[must_use]
pub fn performance(total_ms: f64, budget_ms: f64) -> f64 {
    if total_ms <= budget_ms || total_ms <= 0.0 {
        1.0
    } else {
        clamp_unit_f64(budget_ms / total_ms)
    }
}

/// Mean carry-through ratio of stages that received gaps
#[must_use]
pub fn efficiency(stages: &[StageSample]) -> f64 {
    let ratios: Vec<f64> = stages
        .iter()
        .filter(|sample| sample.items_in > 0)
        .map(|sample| (sample.items_out as f64 / sample.items_in as f64).min(1.0))
        .collect();
    if ratios.is_empty() {
        1.0
    } else {
        mean(&ratios)
    }
}

#[must_use]
pub fn reliability(stages: &[StageSample]) -> f64 {
    if stages.is_empty() {
        return 1.0;
    }
    stages.iter().filter(|sample| sample.success).count() as f64 / stages.len() as f64
}

#[must_use]
pub fn consistency(scores: &[f64]) -> f64 {
    clamp_unit_f64(1.0 - std_dev(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_model::{DetectionMethod, PlaceholderKind, Span, ValidationLevel};
    use pretty_assertions::assert_eq;

    fn detected(kind: PlaceholderKind, start: usize, end: usize) -> DetectedGap {
        DetectedGap {
            kind,
            name: kind.as_str().to_string(),
            span: Span { start, end },
            local_context: String::new(),
            confidence: 0.9,
            detection_method: DetectionMethod::KindPattern,
            validation_level: ValidationLevel::Basic,
            suggested_value: None,
            validation_score: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn pairing_is_one_to_one() {
        let gaps = vec![
            detected(PlaceholderKind::PrimaryKeyword, 0, 10),
            detected(PlaceholderKind::Tone, 20, 26),
        ];
        let expected = vec![
            ExpectedGap::new(2, 5, Some(PlaceholderKind::PrimaryKeyword)),
            ExpectedGap::new(3, 8, None),
            ExpectedGap::new(21, 24, Some(PlaceholderKind::Length)),
        ];
        let counts = GroundTruthCounts::pair(&gaps, &expected);
        assert_eq!(
            counts,
            GroundTruthCounts {
                true_positives: 2,
                kind_matches: 1,
                false_positives: 0,
                false_negatives: 1,
            }
        );
        assert!((counts.precision() - 1.0).abs() < 1e-9);
        assert!((counts.recall() - 2.0 / 3.0).abs() < 1e-9);
        assert!((counts.accuracy() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_sides_score_perfect() {
        let counts = GroundTruthCounts::pair(&[], &[]);
        assert!((counts.precision() - 1.0).abs() < 1e-9);
        assert!((f1(counts.precision(), counts.recall()) - 1.0).abs() < 1e-9);
        assert_eq!(f1(0.0, 0.0), 0.0);
    }

    #[test]
    fn performance_degrades_past_budget() {
        assert_eq!(performance(200.0, 1000.0), 1.0);
        assert!((performance(2000.0, 1000.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn consistency_drops_with_spread() {
        assert_eq!(consistency(&[0.8]), 1.0);
        assert!((consistency(&[0.2, 0.8]) - 0.7).abs() < 1e-9);
    }
}
