//! Budget-constrained selection of fragments.
//!
//! A greedy 0/1 knapsack by relevance density (`relevance / tokens`):
//!
//! 1. Split candidates into **mandatory** (tagged with a required aspect)
//!    and **general**.
//! 2. Fill a reserved slice of the budget (`budget × reserved_budget_ratio`)
//!    from the mandatory pool, best density first, stopping at the first
//!    candidate that does not fit.
//! 3. Fill the rest of the budget from everything not yet selected, the
//!    same way.
//!
//! Fragments are atomic: they go in whole or not at all, so the selection
//! never exceeds the budget. Ties break on preferred kind, then collector
//! priority (higher first), then input position. The order is total, so
//! the same input always yields the same selection.

use ctxpack_core::config::ContextConfig;
use ctxpack_core::fragment::Fragment;
use ctxpack_core::request::Request;
use tracing::debug;

/// Select fragments within `request.token_budget`. The result keeps the
/// input order.
pub fn prioritize(fragments: Vec<Fragment>, request: &Request, config: &ContextConfig) -> Vec<Fragment> {
    let budget = request.token_budget;
    let reserved = reserved_tokens(budget, config.reserved_budget_ratio);

    let mandatory: Vec<bool> = fragments
        .iter()
        .map(|f| config.required_aspects.iter().any(|a| f.has_aspect(a)))
        .collect();

    let ranked = rank(&fragments, request);
    let mut selected = vec![false; fragments.len()];
    let mut spent = 0usize;

    // Phase 1: reserved budget, mandatory pool only.
    for &idx in ranked.iter().filter(|&&idx| mandatory[idx]) {
        let cost = fragments[idx].estimated_tokens();
        if spent + cost > reserved {
            break;
        }
        selected[idx] = true;
        spent += cost;
    }
    let reserved_spent = spent;

    // Phase 2: whatever is left, over everything not yet taken.
    for &idx in ranked.iter() {
        if selected[idx] {
            continue;
        }
        let cost = fragments[idx].estimated_tokens();
        if spent + cost > budget {
            break;
        }
        selected[idx] = true;
        spent += cost;
    }

    debug!(
        request_id = %request.id,
        budget,
        reserved,
        reserved_spent,
        spent,
        candidates = fragments.len(),
        selected = selected.iter().filter(|s| **s).count(),
        "Prioritized fragments"
    );

    fragments
        .into_iter()
        .zip(selected)
        .filter_map(|(fragment, keep)| keep.then_some(fragment))
        .collect()
}

/// Tokens held back for mandatory aspects.
pub fn reserved_tokens(budget: usize, ratio: f64) -> usize {
    let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    ((budget as f64) * ratio).floor() as usize
}

/// Candidate indices, best first.
fn rank(fragments: &[Fragment], request: &Request) -> Vec<usize> {
    let preferred_rank = |f: &Fragment| {
        request
            .preferred_kinds
            .iter()
            .position(|k| k == f.kind())
            .unwrap_or(usize::MAX)
    };

    let mut order: Vec<usize> = (0..fragments.len()).collect();
    order.sort_by(|&a, &b| {
        let (fa, fb) = (&fragments[a], &fragments[b]);
        fb.density()
            .total_cmp(&fa.density())
            .then_with(|| preferred_rank(fa).cmp(&preferred_rank(fb)))
            .then_with(|| fb.priority().cmp(&fa.priority()))
            .then_with(|| a.cmp(&b))
    });
    order
}
