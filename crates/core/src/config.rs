//! Pipeline tuning shared by the filter, prioritizer and metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Thresholds and reservations applied to every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Fragments below this relevance are dropped.
    #[serde(default = "default_min_relevance_threshold")]
    pub min_relevance_threshold: f64,

    /// Fragments older than this (seconds) are dropped.
    #[serde(default = "default_context_max_age_secs")]
    pub context_max_age_secs: u64,

    /// Share of the token budget held back for mandatory aspects.
    #[serde(default = "default_reserved_budget_ratio")]
    pub reserved_budget_ratio: f64,

    /// Aspects that must be covered when possible.
    #[serde(default)]
    pub required_aspects: BTreeSet<String>,

    /// Drop near-duplicate fragments.
    #[serde(default = "default_true")]
    pub deduplicate: bool,

    /// Word-set similarity at or above which two fragments from the same
    /// source and kind count as duplicates.
    #[serde(default = "default_near_duplicate_similarity")]
    pub near_duplicate_similarity: f64,
}

fn default_min_relevance_threshold() -> f64 {
    0.3
}
fn default_context_max_age_secs() -> u64 {
    30 * 24 * 60 * 60
}
fn default_reserved_budget_ratio() -> f64 {
    0.3
}
fn default_near_duplicate_similarity() -> f64 {
    0.9
}
fn default_true() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            min_relevance_threshold: default_min_relevance_threshold(),
            context_max_age_secs: default_context_max_age_secs(),
            reserved_budget_ratio: default_reserved_budget_ratio(),
            required_aspects: BTreeSet::new(),
            deduplicate: true,
            near_duplicate_similarity: default_near_duplicate_similarity(),
        }
    }
}

impl ContextConfig {
    pub fn with_min_relevance(mut self, threshold: f64) -> Self {
        self.min_relevance_threshold = threshold;
        self
    }

    pub fn with_required_aspect(mut self, aspect: impl Into<String>) -> Self {
        self.required_aspects.insert(aspect.into());
        self
    }

    pub fn with_reserved_ratio(mut self, ratio: f64) -> Self {
        self.reserved_budget_ratio = ratio;
        self
    }

    pub fn with_max_age_secs(mut self, secs: u64) -> Self {
        self.context_max_age_secs = secs;
        self
    }

    /// Check ranges. Called by the engine before any collection starts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_relevance_threshold) {
            return Err(Error::config(
                "min_relevance_threshold must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.reserved_budget_ratio) {
            return Err(Error::config(
                "reserved_budget_ratio must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.near_duplicate_similarity) {
            return Err(Error::config(
                "near_duplicate_similarity must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}
