//! # Gapfill Quality
//!
//! Grades a whole gap-processing run. With ground truth, detected gaps are paired one-to-one
//! with expected spans (any overlap pairs) for precision, recall, F1 and accuracy; without it,
//! detection and semantic confidences stand in. Performance, efficiency, reliability and
//! consistency come from stage timings, carry-through ratios, success flags and score spread.
//!
//! [`QualityValidator::evaluate`] grades a run that already happened;
//! [`QualityValidator::assess_text`] drives the upstream stages itself first.

mod config;
mod metrics;
mod validator;

pub use config::{MetricThresholds, MetricWeights, QualityConfig};
pub use metrics::{GroundTruthCounts, Metric, QualityMetrics, StageSample};
pub use validator::{
    QualityIssue, QualityLevel, QualityReport, QualityValidator, RunSnapshot, Trend, Upstream,
};
