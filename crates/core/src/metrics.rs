//! Post-hoc quality measures of a package.

use serde::{Deserialize, Serialize};

/// Quality of one delivered package.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Sum of estimated tokens of included fragments.
    pub total_tokens: usize,
    /// Budget the request allowed.
    pub token_budget: usize,
    pub fragment_count: usize,
    /// Aggregate relevance in `[0, 1]`.
    pub relevance: f64,
    /// Satisfied / requested mandatory aspects, in `[0, 1]`.
    pub coverage: f64,
}

impl Metrics {
    /// Share of the budget in use (0.0–1.0).
    pub fn budget_utilization(&self) -> f64 {
        if self.token_budget == 0 {
            return 0.0;
        }
        self.total_tokens as f64 / self.token_budget as f64
    }

    /// Whether either score falls below the threshold.
    pub fn is_below(&self, threshold: &QualityThreshold) -> bool {
        self.relevance < threshold.min_relevance || self.coverage < threshold.min_coverage
    }

    /// Orders two results: higher coverage wins, then higher relevance.
    pub fn is_better_than(&self, other: &Metrics) -> bool {
        if self.coverage != other.coverage {
            return self.coverage > other.coverage;
        }
        self.relevance > other.relevance
    }
}

/// Caller-chosen floor below which a run counts as low quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThreshold {
    pub min_relevance: f64,
    pub min_coverage: f64,
}

impl Default for QualityThreshold {
    fn default() -> Self {
        Self {
            min_relevance: 0.5,
            min_coverage: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(relevance: f64, coverage: f64) -> Metrics {
        Metrics {
            total_tokens: 250,
            token_budget: 1000,
            fragment_count: 2,
            relevance,
            coverage,
        }
    }

    #[test]
    fn utilization() {
        assert!((metrics(0.9, 1.0).budget_utilization() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn below_threshold_on_either_axis() {
        let threshold = QualityThreshold::default();
        assert!(!metrics(0.9, 1.0).is_below(&threshold));
        assert!(metrics(0.4, 1.0).is_below(&threshold));
        assert!(metrics(0.9, 0.5).is_below(&threshold));
    }

    #[test]
    fn coverage_dominates_comparison() {
        assert!(metrics(0.1, 1.0).is_better_than(&metrics(0.9, 0.5)));
        assert!(metrics(0.8, 1.0).is_better_than(&metrics(0.7, 1.0)));
        assert!(!metrics(0.7, 1.0).is_better_than(&metrics(0.7, 1.0)));
    }
}
