//! Relevance, staleness and redundancy filtering.
//!
//! Runs between collection and prioritization. Survivors keep their
//! relative order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ctxpack_core::config::ContextConfig;
use ctxpack_core::fragment::Fragment;
use ctxpack_core::request::Request;
use tracing::debug;

/// Counts of what a filter pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub below_threshold: usize,
    pub stale: usize,
    pub duplicates: usize,
}

/// Filter against the current time.
pub fn filter(fragments: Vec<Fragment>, request: &Request, config: &ContextConfig) -> Vec<Fragment> {
    filter_at(fragments, request, config, Utc::now())
}

/// Filter with an explicit reference time for age checks.
pub fn filter_at(
    fragments: Vec<Fragment>,
    request: &Request,
    config: &ContextConfig,
    now: DateTime<Utc>,
) -> Vec<Fragment> {
    let (kept, stats) = filter_with_stats(fragments, config, now);
    debug!(
        request_id = %request.id,
        kept = kept.len(),
        below_threshold = stats.below_threshold,
        stale = stats.stale,
        duplicates = stats.duplicates,
        "Filtered fragments"
    );
    kept
}

/// The filter proper, reporting what it dropped.
pub fn filter_with_stats(
    fragments: Vec<Fragment>,
    config: &ContextConfig,
    now: DateTime<Utc>,
) -> (Vec<Fragment>, FilterStats) {
    let mut stats = FilterStats::default();
    let max_age = i64::try_from(config.context_max_age_secs).unwrap_or(i64::MAX);
    let mut kept: Vec<Fragment> = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        if fragment.relevance() < config.min_relevance_threshold {
            stats.below_threshold += 1;
            continue;
        }

        if fragment.age_secs(now).is_some_and(|age| age > max_age) {
            stats.stale += 1;
            continue;
        }

        if config.deduplicate {
            let twin = kept.iter().position(|k| {
                k.source() == fragment.source()
                    && k.kind() == fragment.kind()
                    && similarity(k.content(), fragment.content()) >= config.near_duplicate_similarity
            });
            if let Some(idx) = twin {
                stats.duplicates += 1;
                if fragment.relevance() > kept[idx].relevance() {
                    kept[idx] = fragment;
                }
                continue;
            }
        }

        kept.push(fragment);
    }

    (kept, stats)
}

/// Jaccard similarity of the lowercase word sets of two texts.
/// Two empty texts are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let words_a: BTreeSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: BTreeSet<String> = b.split_whitespace().map(str::to_lowercase).collect();

    if words_a.is_empty() && words_b.is_empty() {
        return 1.0;
    }

    let shared = words_a.intersection(&words_b).count();
    let total = words_a.union(&words_b).count();
    shared as f64 / total as f64
}
