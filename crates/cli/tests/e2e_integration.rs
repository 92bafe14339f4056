//! End-to-end integration tests for the ctxpack context pipeline.
//!
//! These tests drive the full engine — concurrent collection, filtering,
//! prioritization, formatting and the quality retry — through mock
//! collectors, plus the built-in collectors against a temp directory.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ctxpack_collectors::{FileContentCollector, TaskDescriptionCollector, default_registry};
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::collector::Collector;
use ctxpack_core::config::ContextConfig;
use ctxpack_core::error::{CollectorError, Error};
use ctxpack_core::event::{PipelineEvent, PipelineStage};
use ctxpack_core::fragment::{Fragment, FragmentKind};
use ctxpack_core::metrics::QualityThreshold;
use ctxpack_core::request::{Request, Scope, TaskKind};
use ctxpack_core::token::bytes_for_tokens;
use ctxpack_engine::{ContextEngine, EngineOptions, filter, prioritize};

// ── Mock Collectors ──────────────────────────────────────────────────────

/// Returns one scripted fragment.
struct Scripted {
    name: &'static str,
    kind: FragmentKind,
    tokens: usize,
    relevance: f64,
}

impl Scripted {
    fn new(name: &'static str, kind: FragmentKind, tokens: usize, relevance: f64) -> Self {
        Self {
            name,
            kind,
            tokens,
            relevance,
        }
    }
}

#[async_trait]
impl Collector for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "scripted fragment"
    }

    fn is_applicable(&self, _request: &Request) -> bool {
        true
    }

    async fn collect(
        &self,
        _request: &Request,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        let content = format!("{} ", self.name).repeat(bytes_for_tokens(self.tokens) / (self.name.len() + 1));
        Ok(Some(Fragment::new(self.name, self.kind.clone(), content, self.relevance)))
    }
}

/// Always raises an error.
struct Throwing;

#[async_trait]
impl Collector for Throwing {
    fn name(&self) -> &str {
        "throwing"
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn is_applicable(&self, _request: &Request) -> bool {
        true
    }

    async fn collect(
        &self,
        _request: &Request,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        Err(CollectorError::Failed {
            collector: "throwing".into(),
            reason: "scripted failure".into(),
        })
    }
}

/// Panics inside `collect`.
struct Panicking;

#[async_trait]
impl Collector for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn description(&self) -> &str {
        "panics"
    }

    fn is_applicable(&self, _request: &Request) -> bool {
        true
    }

    async fn collect(
        &self,
        _request: &Request,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        panic!("collector bug");
    }
}

/// Sleeps far past any timeout; counts how often it got to finish.
struct Sleeping {
    finished: Arc<AtomicUsize>,
}

#[async_trait]
impl Collector for Sleeping {
    fn name(&self) -> &str {
        "sleeping"
    }

    fn description(&self) -> &str {
        "never finishes in time"
    }

    fn is_applicable(&self, _request: &Request) -> bool {
        true
    }

    async fn collect(
        &self,
        _request: &Request,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Fragment::new("sleeping", FragmentKind::Logs, "late", 1.0)))
    }
}

/// Waits until cancelled, then reports it.
struct WaitsForCancel {
    observed: Arc<AtomicUsize>,
}

#[async_trait]
impl Collector for WaitsForCancel {
    fn name(&self) -> &str {
        "waits_for_cancel"
    }

    fn description(&self) -> &str {
        "blocks until the run is cancelled"
    }

    fn is_applicable(&self, _request: &Request) -> bool {
        true
    }

    async fn collect(
        &self,
        _request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        cancel.cancelled().await;
        self.observed.fetch_add(1, Ordering::SeqCst);
        Err(CollectorError::Cancelled("waits_for_cancel".into()))
    }
}

/// Only applicable from project scope.
struct ProjectOnly;

#[async_trait]
impl Collector for ProjectOnly {
    fn name(&self) -> &str {
        "project_only"
    }

    fn description(&self) -> &str {
        "needs project scope"
    }

    fn is_applicable(&self, request: &Request) -> bool {
        request.scope == Scope::Project
    }

    async fn collect(
        &self,
        _request: &Request,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        Ok(Some(Fragment::new("project_only", FragmentKind::Dependencies, "serde = 1", 0.9)))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn options(timeout_ms: u64, retry: bool) -> EngineOptions {
    EngineOptions {
        collector_timeout: Duration::from_millis(timeout_ms),
        quality_retry: retry,
        quality_threshold: QualityThreshold::default(),
    }
}

fn engine_with(config: ContextConfig, collectors: Vec<Arc<dyn Collector>>) -> ContextEngine {
    let engine = ContextEngine::new(config).with_options(options(200, false));
    for collector in collectors {
        engine.register(collector);
    }
    engine
}

fn sources(fragments: &[Fragment]) -> Vec<&str> {
    fragments.iter().map(|f| f.source()).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_budget_picks_two_most_relevant() {
    let engine = engine_with(
        ContextConfig::default(),
        vec![
            Arc::new(Scripted::new("a", FragmentKind::Implementation, 500, 0.9)),
            Arc::new(Scripted::new("b", FragmentKind::Implementation, 500, 0.8)),
            Arc::new(Scripted::new("c", FragmentKind::Implementation, 500, 0.7)),
        ],
    );

    let package = engine
        .gather_context(&Request::new("pick two", TaskKind::General, 1000))
        .await
        .unwrap();

    let relevances: Vec<f64> = package.fragments().iter().map(|f| f.relevance()).collect();
    assert_eq!(relevances, vec![0.9, 0.8]);
    assert!(package.total_tokens() <= 1000);
}

#[tokio::test]
async fn e2e_filter_drops_low_relevance() {
    let config = ContextConfig::default().with_min_relevance(0.3);
    let fragments = vec![
        Fragment::new("good", FragmentKind::Implementation, "useful", 0.8),
        Fragment::new("noise", FragmentKind::Implementation, "noise", 0.1),
    ];
    let kept = filter(fragments, &Request::new("t", TaskKind::General, 100), &config);
    assert_eq!(sources(&kept), vec!["good"]);
}

#[tokio::test]
async fn e2e_bug_fixing_section_order() {
    let engine = engine_with(
        ContextConfig::default(),
        vec![
            Arc::new(Scripted::new("logs", FragmentKind::Logs, 20, 0.7)),
            Arc::new(Scripted::new("impl", FragmentKind::Implementation, 20, 0.7)),
            Arc::new(Scripted::new("trace", FragmentKind::RuntimeError, 20, 0.7)),
        ],
    );

    let package = engine
        .gather_context(&Request::new("fix the crash", TaskKind::BugFixing, 1000))
        .await
        .unwrap();

    let kinds: Vec<FragmentKind> = package.sections().iter().map(|s| s.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![FragmentKind::RuntimeError, FragmentKind::Implementation, FragmentKind::Logs]
    );

    let rendered = package.render();
    let errors = rendered.find("## Runtime Errors").unwrap();
    let code = rendered.find("## Implementation").unwrap();
    let logs = rendered.find("## Logs").unwrap();
    assert!(errors < code && code < logs);
}

#[tokio::test]
async fn e2e_no_applicable_collectors_gives_empty_package() {
    let engine = engine_with(ContextConfig::default(), vec![Arc::new(ProjectOnly)]);
    let package = engine
        .gather_context(&Request::new("t", TaskKind::General, 1000))
        .await
        .unwrap();
    assert!(package.is_empty());
    assert!(package.sections().is_empty());
    assert_eq!(package.render(), "# Task\n\nt\n");
}

#[tokio::test]
async fn e2e_throwing_collector_does_not_change_package() {
    let good: Vec<Arc<dyn Collector>> = vec![
        Arc::new(Scripted::new("a", FragmentKind::Implementation, 100, 0.9)),
        Arc::new(Scripted::new("b", FragmentKind::Tests, 100, 0.6)),
    ];
    let request = Request::new("isolate", TaskKind::Testing, 1000);

    let without = engine_with(ContextConfig::default(), good.clone())
        .gather_context(&request)
        .await
        .unwrap();

    let mut with_faulty = good;
    with_faulty.insert(1, Arc::new(Throwing));
    with_faulty.push(Arc::new(Panicking));
    let with = engine_with(ContextConfig::default(), with_faulty)
        .gather_context(&request)
        .await
        .unwrap();

    assert_eq!(with, without);
    assert_eq!(with.render(), without.render());
}

// ── Properties ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_timeout_is_isolated() {
    let finished = Arc::new(AtomicUsize::new(0));
    let engine = engine_with(
        ContextConfig::default(),
        vec![
            Arc::new(Sleeping {
                finished: Arc::clone(&finished),
            }),
            Arc::new(Scripted::new("fast", FragmentKind::Implementation, 50, 0.8)),
        ],
    );

    let started = std::time::Instant::now();
    let package = engine
        .gather_context(&Request::new("t", TaskKind::General, 1000))
        .await
        .unwrap();

    assert_eq!(sources(package.fragments()), vec!["fast"]);
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn e2e_cancellation_discards_partial_results() {
    let observed = Arc::new(AtomicUsize::new(0));
    let engine = ContextEngine::new(ContextConfig::default()).with_options(options(10_000, false));
    engine.register(Arc::new(Scripted::new("fast", FragmentKind::Implementation, 50, 0.8)));
    engine.register(Arc::new(WaitsForCancel {
        observed: Arc::clone(&observed),
    }));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = engine
        .gather_context_with_cancel(&Request::new("t", TaskKind::General, 1000), cancel)
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn e2e_budget_invariant_across_budgets() {
    let collectors: Vec<Arc<dyn Collector>> = (0..10)
        .map(|i| {
            let name: &'static str = Box::leak(format!("c{i}").into_boxed_str());
            Arc::new(Scripted::new(
                name,
                FragmentKind::BUILTIN[i % FragmentKind::BUILTIN.len()].clone(),
                30 + i * 45,
                0.3 + (i as f64) * 0.07,
            )) as Arc<dyn Collector>
        })
        .collect();
    let engine = engine_with(ContextConfig::default(), collectors);

    for budget in [1usize, 10, 100, 400, 1000, 5000] {
        let package = engine
            .gather_context(&Request::new("t", TaskKind::General, budget))
            .await
            .unwrap();
        assert!(package.total_tokens() <= budget, "budget {budget} exceeded");
    }
}

#[tokio::test]
async fn e2e_pipeline_is_deterministic() {
    let config = ContextConfig::default().with_required_aspect("error");
    let request = Request::new("t", TaskKind::CodeReview, 300)
        .with_preferred_kind(FragmentKind::History);
    let fragments = vec![
        Fragment::new("git", FragmentKind::History, "a1 fix\nb2 feat", 0.7),
        Fragment::new("err", FragmentKind::RuntimeError, "panic at x", 0.6).with_aspect("error"),
        Fragment::new("code", FragmentKind::Implementation, "fn x() {}", 0.9),
        Fragment::new("tests", FragmentKind::Tests, "#[test] fn t() {}", 0.5),
    ];

    let engine = ContextEngine::new(config);
    let first = engine.assemble(fragments.clone(), &request);
    let second = engine.assemble(fragments, &request);
    assert_eq!(first.render(), second.render());
    assert_eq!(first, second);
}

#[tokio::test]
async fn e2e_coverage_guarantee_with_reserve() {
    let config = ContextConfig::default()
        .with_required_aspect("error")
        .with_reserved_ratio(0.4);
    let request = Request::new("t", TaskKind::BugFixing, 1000);
    let fragments = vec![
        Fragment::new("big1", FragmentKind::Implementation, "x".repeat(bytes_for_tokens(450)), 1.0),
        Fragment::new("big2", FragmentKind::Implementation, "y".repeat(bytes_for_tokens(450)), 1.0),
        Fragment::new("trace", FragmentKind::RuntimeError, "z".repeat(bytes_for_tokens(300)), 0.4)
            .with_aspect("error"),
    ];

    let selected = prioritize(fragments, &request, &config);
    assert!(selected.iter().any(|f| f.has_aspect("error")));
    assert!(selected.iter().map(|f| f.estimated_tokens()).sum::<usize>() <= 1000);
}

#[tokio::test]
async fn e2e_quality_retry_widens_scope_once() {
    let config = ContextConfig::default().with_required_aspect("deps");
    let engine = ContextEngine::new(config).with_options(options(200, true));
    engine.register(Arc::new(Scripted::new("code", FragmentKind::Implementation, 50, 0.8)));
    engine.register(Arc::new(ProjectOnly));

    let mut rx = engine.events().subscribe();
    let outcome = engine
        .gather_context_detailed(
            &Request::new("t", TaskKind::General, 1000).with_scope(Scope::Module),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // Coverage is 0 in both runs; the wider run wins on relevance.
    assert!(outcome.retried);
    assert_eq!(outcome.package.request().scope, Scope::Project);
    assert_eq!(sources(outcome.package.fragments()).len(), 2);
    assert!(outcome.package.fragments().iter().any(|f| f.source() == "project_only"));

    let mut quality_low = 0;
    let mut delivered = 0;
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            PipelineEvent::QualityLow { next_scope, .. } => {
                assert_eq!(*next_scope, Scope::Project);
                quality_low += 1;
            }
            PipelineEvent::StageEntered {
                stage: PipelineStage::Delivered,
                ..
            } => delivered += 1,
            _ => {}
        }
    }
    assert_eq!(quality_low, 1);
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn e2e_failed_collectors_emit_events() {
    let engine = engine_with(
        ContextConfig::default(),
        vec![
            Arc::new(Throwing),
            Arc::new(Panicking),
            Arc::new(Scripted::new("ok", FragmentKind::Implementation, 10, 0.9)),
        ],
    );
    let mut rx = engine.events().subscribe();
    engine
        .gather_context(&Request::new("t", TaskKind::General, 100))
        .await
        .unwrap();

    let mut failed = Vec::new();
    let mut completed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            PipelineEvent::CollectorFailed { collector, .. } => failed.push(collector.clone()),
            PipelineEvent::CollectorCompleted { collector, .. } => completed.push(collector.clone()),
            _ => {}
        }
    }
    assert_eq!(failed, vec!["throwing", "panicking"]);
    assert_eq!(completed, vec!["ok"]);
}

// ── Built-in collectors ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_builtin_collectors_assemble_bug_report() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("parser.rs");
    std::fs::write(&file, "pub fn parse(input: &str) -> usize {\n    input[..10].len()\n}\n").unwrap();

    let engine = ContextEngine::new(ContextConfig::default())
        .with_options(options(5_000, false))
        .with_registry(Arc::new(default_registry()));

    let request = Request::new("parser panics on short input", TaskKind::BugFixing, 2000)
        .with_parameter("error_log", "thread 'main' panicked at 'byte index 10 is out of range'")
        .with_parameter("path", file.to_str().unwrap())
        .with_parameter("root", dir.path().to_str().unwrap());

    let package = engine.gather_context(&request).await.unwrap();
    let rendered = package.render();

    assert!(rendered.starts_with("# Task\n\nparser panics on short input\n"));
    let error_at = rendered.find("## Runtime Errors").unwrap();
    let code_at = rendered.find("## Implementation").unwrap();
    assert!(error_at < code_at);
    assert!(rendered.contains("### file_content (lines=3, path="));
    assert!(package.total_tokens() <= 2000);
}

#[tokio::test]
async fn e2e_reregistering_replaces_collector() {
    let engine = engine_with(
        ContextConfig::default(),
        vec![
            Arc::new(TaskDescriptionCollector),
            Arc::new(FileContentCollector::new()),
        ],
    );
    engine.register(Arc::new(FileContentCollector::with_root("/")));
    assert_eq!(engine.collector_names(), vec!["task_description", "file_content"]);
}
