//! Quality analysis of an assembled package.

use ctxpack_core::config::ContextConfig;
use ctxpack_core::fragment::Fragment;
use ctxpack_core::metrics::Metrics;
use ctxpack_core::package::Package;

/// Measure a package against the request budget and required aspects.
pub fn analyze(package: &Package, config: &ContextConfig) -> Metrics {
    let fragments = package.fragments();
    Metrics {
        total_tokens: package.total_tokens(),
        token_budget: package.request().token_budget,
        fragment_count: fragments.len(),
        relevance: relevance(fragments),
        coverage: coverage(fragments, config),
    }
}

/// Token-weighted mean relevance. Falls back to the plain mean when every
/// fragment is empty.
pub fn relevance(fragments: &[Fragment]) -> f64 {
    if fragments.is_empty() {
        return 0.0;
    }

    let tokens: usize = fragments.iter().map(Fragment::estimated_tokens).sum();
    if tokens == 0 {
        let sum: f64 = fragments.iter().map(Fragment::relevance).sum();
        return sum / fragments.len() as f64;
    }

    let weighted: f64 = fragments
        .iter()
        .map(|f| f.relevance() * f.estimated_tokens() as f64)
        .sum();
    weighted / tokens as f64
}

/// Share of required aspects carried by at least one fragment.
pub fn coverage(fragments: &[Fragment], config: &ContextConfig) -> f64 {
    if config.required_aspects.is_empty() {
        return 1.0;
    }
    let satisfied = config
        .required_aspects
        .iter()
        .filter(|aspect| fragments.iter().any(|f| f.has_aspect(aspect)))
        .count();
    satisfied as f64 / config.required_aspects.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::format;
    use ctxpack_core::fragment::FragmentKind;
    use ctxpack_core::request::{Request, TaskKind};

    fn frag(bytes: usize, relevance: f64) -> Fragment {
        Fragment::new("c", FragmentKind::Implementation, "x".repeat(bytes), relevance)
    }

    #[test]
    fn empty_package_scores_zero_relevance() {
        let package = Package::empty(Request::new("t", TaskKind::General, 100));
        let metrics = analyze(&package, &ContextConfig::default());
        assert_eq!(metrics.fragment_count, 0);
        assert_eq!(metrics.total_tokens, 0);
        assert_eq!(metrics.relevance, 0.0);
        assert_eq!(metrics.coverage, 1.0);
    }

    #[test]
    fn relevance_is_token_weighted() {
        // 300 tokens at 0.9, 100 tokens at 0.5: (270 + 50) / 400
        let r = relevance(&[frag(1200, 0.9), frag(400, 0.5)]);
        assert!((r - 0.8).abs() < 1e-12);
    }

    #[test]
    fn zero_token_fragments_use_plain_mean() {
        let r = relevance(&[frag(0, 0.4), frag(0, 0.8)]);
        assert!((r - 0.6).abs() < 1e-12);
    }

    #[test]
    fn coverage_counts_satisfied_aspects() {
        let config = ContextConfig::default()
            .with_required_aspect("error")
            .with_required_aspect("task");
        let fragments = vec![frag(40, 0.9).with_aspect("error")];
        assert!((coverage(&fragments, &config) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn analyze_reports_budget_usage() {
        let req = Request::new("t", TaskKind::General, 1000);
        let package = format(vec![frag(1000, 0.7)], &req);
        let metrics = analyze(&package, &ContextConfig::default());
        assert_eq!(metrics.total_tokens, 250);
        assert_eq!(metrics.token_budget, 1000);
        assert!((metrics.budget_utilization() - 0.25).abs() < 1e-12);
        assert!(metrics.total_tokens <= metrics.token_budget);
    }
}
