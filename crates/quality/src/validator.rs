use gapfill_detector::{BasicValidator, DetectorConfig, PatternDetector};
use gapfill_model::{
    clamp_unit_f64, DetectedGap, ErrorKind, ExpectedGap, GapError, PipelineStage, Result,
    Severity,
};
use gapfill_semantic::{
    AnalyzerConfig, ContextValidationResult, ContextValidator, HeuristicBackend, MatchOutcome,
    MatcherConfig, SemanticAnalyzer, SemanticGap, SemanticMatcher,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::config::QualityConfig;
use crate::metrics::{self, GroundTruthCounts, Metric, QualityMetrics, StageSample};

/// Confidence reported while fewer than three earlier scores exist
const LOW_DATA_CONFIDENCE: f64 = 0.3;
const LOW_DATA_CONFIDENCE_WITH_TRUTH: f64 = 0.5;
const MIN_HISTORY: usize = 3;
/// Earlier scores averaged as the trend baseline
const TREND_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Critical,
    Poor,
    Acceptable,
    Good,
    Excellent,
}

impl QualityLevel {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.8 {
            Self::Good
        } else if score >= 0.7 {
            Self::Acceptable
        } else if score >= 0.5 {
            Self::Poor
        } else {
            Self::Critical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    InsufficientData,
}

/// A metric below its threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall_score: f64,
    pub quality_level: QualityLevel,
    pub metrics: QualityMetrics,
    /// Most severe first
    pub issues: Vec<QualityIssue>,
    pub recommendations: Vec<String>,
    /// Milliseconds per stage, plus `total`
    pub performance_breakdown: BTreeMap<String, f64>,
    pub confidence_level: f64,
    pub trend: Trend,
    pub ground_truth_used: bool,
    pub gaps_evaluated: usize,
}

/// Everything a finished (or partial) run exposes for grading
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSnapshot<'a> {
    pub gaps: &'a [DetectedGap],
    pub semantic_gaps: &'a [SemanticGap],
    pub matches: &'a [MatchOutcome],
    pub context_validation: Option<&'a ContextValidationResult>,
    pub stages: &'a [StageSample],
    /// Ground truth; empty means none was supplied
    pub expected_gaps: &'a [ExpectedGap],
}

/// The stages [`QualityValidator::assess_text`] drives on its own
#[derive(Debug, Clone)]
pub struct Upstream {
    pub detector: Arc<PatternDetector>,
    pub analyzer: Arc<SemanticAnalyzer>,
    pub context_validator: Arc<ContextValidator>,
    pub matcher: Arc<SemanticMatcher>,
}

impl Upstream {
    /// Default-configured stages on the heuristic backend
    pub fn heuristic() -> Result<Self> {
        let backend = HeuristicBackend;
        Ok(Self {
            detector: Arc::new(PatternDetector::new(DetectorConfig::default())?),
            analyzer: Arc::new(SemanticAnalyzer::new(
                AnalyzerConfig::default(),
                Arc::new(BasicValidator::default()),
                &backend,
            )?),
            context_validator: Arc::new(ContextValidator::default()),
            matcher: Arc::new(SemanticMatcher::new(
                MatcherConfig::default(),
                Arc::new(backend),
            )?),
        })
    }
}

/// Grades whole runs and tracks how the grade moves over time
#[derive(Debug)]
pub struct QualityValidator {
    config: QualityConfig,
    history: RwLock<VecDeque<f64>>,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self {
            config: QualityConfig::default(),
            history: RwLock::new(VecDeque::new()),
        }
    }
}

impl QualityValidator {
    pub fn new(config: QualityConfig) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        Ok(Self {
            config,
            history: RwLock::new(VecDeque::new()),
        })
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Overall scores of earlier evaluations, oldest first
    pub fn history(&self) -> Vec<f64> {
        self.history
            .read()
            .map(|guard| guard.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear_history(&self) {
        if let Ok(mut guard) = self.history.write() {
            guard.clear();
        }
    }

    /// Grade a run whose stages already executed
    pub fn evaluate(&self, run: &RunSnapshot<'_>) -> QualityReport {
        let ground_truth_used = !run.expected_gaps.is_empty();
        let metrics = self.compute_metrics(run, ground_truth_used);

        let weights = &self.config.weights;
        let overall_score = clamp_unit_f64(
            Metric::ALL
                .iter()
                .map(|metric| weights.get(*metric) * metrics.get(*metric))
                .sum::<f64>()
                / weights.total(),
        );

        let issues = self.issues(&metrics);
        let mut recommendations: Vec<String> = Vec::new();
        for issue in &issues {
            if !recommendations.contains(&issue.recommendation) {
                recommendations.push(issue.recommendation.clone());
            }
        }

        let mut performance_breakdown: BTreeMap<String, f64> = BTreeMap::new();
        for sample in run.stages {
            *performance_breakdown
                .entry(sample.stage.as_str().to_string())
                .or_default() += sample.elapsed_ms;
        }
        let total_ms: f64 = run.stages.iter().map(|sample| sample.elapsed_ms).sum();
        performance_breakdown.insert("total".to_string(), total_ms);

        let (confidence_level, trend) = self.track(overall_score, ground_truth_used);
        log::debug!(
            "quality {overall_score:.3} over {} gaps (confidence {confidence_level:.2}, {trend:?})",
            run.gaps.len()
        );

        QualityReport {
            overall_score,
            quality_level: QualityLevel::from_score(overall_score),
            metrics,
            issues,
            recommendations,
            performance_breakdown,
            confidence_level,
            trend,
            ground_truth_used,
            gaps_evaluated: run.gaps.len(),
        }
    }

    /// Run detection, analysis, context validation and matching over `text`, then grade it
    pub async fn assess_text(
        &self,
        upstream: &Upstream,
        text: &str,
        expected_gaps: &[ExpectedGap],
    ) -> QualityReport {
        let mut stages = Vec::with_capacity(4);

        let started = Instant::now();
        let detection = upstream.detector.detect(text);
        let gaps = match &detection {
            Ok(gaps) => gaps.clone(),
            Err(err) => {
                log::warn!("quality assessment: {err}");
                Vec::new()
            }
        };
        stages.push(sample(PipelineStage::Detection, detection.is_ok(), started, 0, gaps.len()));

        let started = Instant::now();
        let analysis = upstream.analyzer.analyze(text, &gaps);
        stages.push(sample(
            PipelineStage::SemanticAnalysis,
            analysis.semantic_gaps.len() == gaps.len(),
            started,
            gaps.len(),
            analysis.semantic_gaps.len(),
        ));

        let started = Instant::now();
        let validation = upstream.context_validator.validate(text, &gaps);
        stages.push(sample(
            PipelineStage::ContextValidation,
            !validation
                .warnings
                .iter()
                .any(|warning| warning.kind == ErrorKind::ContextValidation),
            started,
            gaps.len(),
            validation.assessments.len(),
        ));

        let started = Instant::now();
        let mut matches = Vec::with_capacity(analysis.semantic_gaps.len());
        for semantic in &analysis.semantic_gaps {
            matches.push(
                upstream
                    .matcher
                    .match_gap(text, &semantic.gap, &semantic.context, None)
                    .await,
            );
        }
        // a gap with no ranked candidate means matching had nothing to offer
        let matched = matches.iter().all(|outcome| !outcome.ranked.is_empty());
        stages.push(sample(
            PipelineStage::SemanticMatching,
            matched,
            started,
            gaps.len(),
            matches.len(),
        ));

        self.evaluate(&RunSnapshot {
            gaps: &gaps,
            semantic_gaps: &analysis.semantic_gaps,
            matches: &matches,
            context_validation: Some(&validation),
            stages: &stages,
            expected_gaps,
        })
    }

    fn compute_metrics(&self, run: &RunSnapshot<'_>, ground_truth_used: bool) -> QualityMetrics {
        let (precision, recall, accuracy) = if ground_truth_used {
            let counts = GroundTruthCounts::pair(run.gaps, run.expected_gaps);
            (counts.precision(), counts.recall(), counts.accuracy())
        } else {
            proxies(run)
        };

        let total_ms: f64 = run.stages.iter().map(|sample| sample.elapsed_ms).sum();
        QualityMetrics {
            precision,
            recall,
            f1: metrics::f1(precision, recall),
            accuracy,
            performance: metrics::performance(total_ms, self.config.time_budget_ms),
            efficiency: metrics::efficiency(run.stages),
            reliability: metrics::reliability(run.stages),
            consistency: metrics::consistency(&gap_scores(run)),
        }
    }

    fn issues(&self, metrics: &QualityMetrics) -> Vec<QualityIssue> {
        let mut issues: Vec<QualityIssue> = Metric::ALL
            .iter()
            .filter_map(|metric| {
                let value = metrics.get(*metric);
                let threshold = self.config.thresholds.get(*metric);
                (value < threshold).then(|| QualityIssue {
                    metric: *metric,
                    value,
                    threshold,
                    severity: Severity::from_shortfall(threshold - value),
                    description: format!(
                        "{} is {value:.2}, below the {threshold:.2} threshold",
                        metric.as_str()
                    ),
                    recommendation: metric.recommendation().to_string(),
                })
            })
            .collect();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.metric.cmp(&b.metric)));
        issues
    }

    /// Confidence from the scores seen so far, then record `score` and read the trend
    fn track(&self, score: f64, ground_truth_used: bool) -> (f64, Trend) {
        let Ok(mut history) = self.history.write() else {
            return (LOW_DATA_CONFIDENCE, Trend::InsufficientData);
        };

        let previous: Vec<f64> = history.iter().copied().collect();
        let confidence = if previous.len() < MIN_HISTORY {
            if ground_truth_used {
                LOW_DATA_CONFIDENCE_WITH_TRUTH
            } else {
                LOW_DATA_CONFIDENCE
            }
        } else {
            (1.0 - metrics::std_dev(&previous)).clamp(LOW_DATA_CONFIDENCE, 1.0)
        };

        history.push_back(score);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }

        let trend = if history.len() < MIN_HISTORY {
            Trend::InsufficientData
        } else {
            let baseline: Vec<f64> = previous.iter().rev().take(TREND_WINDOW).copied().collect();
            let delta = score - metrics::mean(&baseline);
            if delta > self.config.trend_tolerance {
                Trend::Improving
            } else if delta < -self.config.trend_tolerance {
                Trend::Declining
            } else {
                Trend::Stable
            }
        };
        (confidence, trend)
    }
}

fn sample(
    stage: PipelineStage,
    success: bool,
    started: Instant,
    items_in: usize,
    items_out: usize,
) -> StageSample {
    StageSample {
        stage,
        success,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        items_in,
        items_out,
    }
}

/// Confidence-derived precision, recall and accuracy for runs without ground truth
fn proxies(run: &RunSnapshot<'_>) -> (f64, f64, f64) {
    let confidences: Vec<f64> = run.gaps.iter().map(|gap| f64::from(gap.confidence)).collect();
    let precision = metrics::mean(&confidences);
    let semantic: Vec<f64> = run
        .semantic_gaps
        .iter()
        .map(|gap| f64::from(gap.semantic_confidence))
        .collect();
    let recall = if semantic.is_empty() {
        precision
    } else {
        metrics::mean(&semantic)
    };
    let accuracy = run
        .context_validation
        .map_or((precision + recall) / 2.0, |validation| validation.overall_score);
    (
        clamp_unit_f64(precision),
        clamp_unit_f64(recall),
        clamp_unit_f64(accuracy),
    )
}

/// Per-gap scores whose spread drives consistency
fn gap_scores(run: &RunSnapshot<'_>) -> Vec<f64> {
    let mut scores: Vec<f64> = if run.semantic_gaps.is_empty() {
        run.gaps.iter().map(|gap| f64::from(gap.confidence)).collect()
    } else {
        run.semantic_gaps
            .iter()
            .map(|gap| f64::from(gap.semantic_confidence))
            .collect()
    };
    scores.extend(
        run.matches
            .iter()
            .filter_map(MatchOutcome::best)
            .map(|best| f64::from(best.hybrid)),
    );
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage(stage: PipelineStage, success: bool) -> StageSample {
        StageSample {
            stage,
            success,
            elapsed_ms: 2.0,
            items_in: 2,
            items_out: 2,
        }
    }

    #[test]
    fn empty_run_with_little_history_reports_low_confidence() {
        let validator = QualityValidator::default();
        let report = validator.evaluate(&RunSnapshot::default());
        assert_eq!(report.confidence_level, 0.3);
        assert_eq!(report.trend, Trend::InsufficientData);
        assert!(!report.ground_truth_used);
        assert_eq!(report.performance_breakdown.get("total"), Some(&0.0));
    }

    #[test]
    fn failed_stages_cost_reliability() {
        let validator = QualityValidator::default();
        let stages = [
            stage(PipelineStage::Detection, true),
            stage(PipelineStage::SemanticAnalysis, false),
        ];
        let report = validator.evaluate(&RunSnapshot {
            stages: &stages,
            ..RunSnapshot::default()
        });
        assert!((report.metrics.reliability - 0.5).abs() < 1e-9);
        let reliability = report
            .issues
            .iter()
            .find(|issue| issue.metric == Metric::Reliability)
            .expect("reliability below threshold");
        assert_eq!(reliability.severity, Severity::Critical);
        assert!(report
            .recommendations
            .contains(&Metric::Reliability.recommendation().to_string()));
        assert_eq!(report.performance_breakdown.get("total"), Some(&4.0));
    }

    #[test]
    fn confidence_follows_score_spread_once_history_exists() {
        let validator = QualityValidator::default();
        for _ in 0..3 {
            validator.evaluate(&RunSnapshot::default());
        }
        let report = validator.evaluate(&RunSnapshot::default());
        assert_eq!(report.confidence_level, 1.0);
        assert_eq!(report.trend, Trend::Stable);
        assert_eq!(validator.history().len(), 4);
    }

    #[test]
    fn history_is_bounded() {
        let validator = QualityValidator::new(QualityConfig {
            history_limit: 3,
            ..QualityConfig::default()
        })
        .unwrap();
        for _ in 0..5 {
            validator.evaluate(&RunSnapshot::default());
        }
        assert_eq!(validator.history().len(), 3);
        validator.clear_history();
        assert!(validator.history().is_empty());
    }

    #[test]
    fn levels_follow_score_bands() {
        assert_eq!(QualityLevel::from_score(0.95), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(0.75), QualityLevel::Acceptable);
        assert_eq!(QualityLevel::from_score(0.1), QualityLevel::Critical);
    }
}
