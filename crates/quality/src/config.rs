use serde::{Deserialize, Serialize};

use crate::metrics::Metric;

/// Weight of each metric in the overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub performance: f64,
    pub efficiency: f64,
    pub reliability: f64,
    pub consistency: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            precision: 0.25,
            recall: 0.25,
            f1: 0.20,
            accuracy: 0.15,
            performance: 0.05,
            efficiency: 0.05,
            reliability: 0.03,
            consistency: 0.02,
        }
    }
}

impl MetricWeights {
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

    #[must_use]
    pub fn total(&self) -> f64 {
        Metric::ALL.iter().map(|metric| self.get(*metric)).sum()
    }
}

/// Value below which a metric raises a quality issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricThresholds {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub performance: f64,
    pub efficiency: f64,
    pub reliability: f64,
    pub consistency: f64,
}

impl Default for MetricThresholds {
    fn default() -> Self {
        Self {
            precision: 0.85,
            recall: 0.80,
            f1: 0.82,
            accuracy: 0.90,
            performance: 0.75,
            efficiency: 0.80,
            reliability: 0.95,
            consistency: 0.88,
        }
    }
}

impl MetricThresholds {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub weights: MetricWeights,
    pub thresholds: MetricThresholds,
    /// Wall-clock budget for a whole run; slower runs lose performance score
    pub time_budget_ms: f64,
    /// Overall scores kept for confidence and trend
    pub history_limit: usize,
    /// Score movement that counts as a trend
    pub trend_tolerance: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: MetricWeights::default(),
            thresholds: MetricThresholds::default(),
            time_budget_ms: 1000.0,
            history_limit: 100,
            trend_tolerance: 0.05,
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<(), String> {
        let total = self.weights.total();
        if (total - 1.0).abs() > 1e-3 {
            return Err(format!("metric weights must sum to 1.0 (got {total:.3})"));
        }
        for metric in Metric::ALL {
            let threshold = self.thresholds.get(metric);
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!("{} threshold {threshold} is outside [0, 1]", metric.as_str()));
            }
        }
        if self.time_budget_ms <= 0.0 {
            return Err("time_budget_ms must be > 0".to_string());
        }
        if self.history_limit < 3 {
            return Err("history_limit must be >= 3".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((MetricWeights::default().total() - 1.0).abs() < 1e-9);
        assert!(QualityConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_short_history() {
        let config = QualityConfig {
            history_limit: 2,
            ..QualityConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
