//! The orchestrator — drives one request through the whole pipeline.
//!
//! ```text
//! Request → fan-out collect → Filter → Prioritizer → Formatter → Package
//!                                                         ↓
//!                                   Metrics below threshold? widen scope, run once more
//! ```
//!
//! Every applicable collector runs on its own task under a deadline. A
//! collector that errors, panics or times out contributes nothing; only
//! misconfiguration and caller cancellation surface as errors.

use std::cmp::Reverse;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ctxpack_config::AppConfig;
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::collector::Collector;
use ctxpack_core::config::ContextConfig;
use ctxpack_core::error::{CollectorError, Error, Result};
use ctxpack_core::event::{EventBus, PipelineEvent, PipelineStage};
use ctxpack_core::fragment::Fragment;
use ctxpack_core::metrics::{Metrics, QualityThreshold};
use ctxpack_core::package::Package;
use ctxpack_core::request::Request;
use futures::future::join_all;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::filter::filter_at;
use crate::formatter::format;
use crate::metrics::analyze;
use crate::prioritizer::prioritize;
use crate::registry::CollectorRegistry;

/// Run-time knobs that are not part of the filtering rules.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Deadline for each collector's `collect` call.
    pub collector_timeout: Duration,
    /// Re-run once with a wider scope when quality is low.
    pub quality_retry: bool,
    pub quality_threshold: QualityThreshold,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            collector_timeout: Duration::from_secs(10),
            quality_retry: true,
            quality_threshold: QualityThreshold::default(),
        }
    }
}

/// What a run delivered, with its measured quality.
#[derive(Debug, Clone)]
pub struct GatherOutcome {
    pub package: Package,
    pub metrics: Metrics,
    /// Whether a widened second run took place.
    pub retried: bool,
}

/// The context assembly orchestrator.
pub struct ContextEngine {
    registry: Arc<CollectorRegistry>,
    config: ContextConfig,
    options: EngineOptions,
    events: Arc<EventBus>,
}

impl ContextEngine {
    /// Create an engine with an empty registry and default options.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            registry: Arc::new(CollectorRegistry::new()),
            config,
            options: EngineOptions::default(),
            events: Arc::new(EventBus::default()),
        }
    }

    /// Build an engine from loaded application settings.
    pub fn from_config(app: &AppConfig) -> Self {
        Self::new(app.context.clone()).with_options(EngineOptions {
            collector_timeout: app.engine.collector_timeout(),
            quality_retry: app.engine.quality_retry,
            quality_threshold: app.engine.quality_threshold(),
        })
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an existing registry (e.g. one pre-filled with built-ins).
    pub fn with_registry(mut self, registry: Arc<CollectorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Register a collector. Runs already in flight keep their snapshot.
    pub fn register(&self, collector: Arc<dyn Collector>) {
        self.registry.register(collector);
    }

    pub fn registry(&self) -> &Arc<CollectorRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn collector_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Reject requests that cannot be served before any work starts.
    pub fn validate(&self, request: &Request) -> Result<()> {
        if request.token_budget == 0 {
            return Err(Error::config("token budget must be > 0"));
        }
        if self.registry.is_empty() {
            return Err(Error::config("no collectors registered"));
        }
        self.config.validate()
    }

    /// Assemble context for a request. Never cancelled from outside.
    pub async fn gather_context(&self, request: &Request) -> Result<Package> {
        self.gather_context_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Assemble context, giving up with [`Error::Cancelled`] once `cancel`
    /// fires.
    pub async fn gather_context_with_cancel(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<Package> {
        self.gather_context_detailed(request, cancel)
            .await
            .map(|outcome| outcome.package)
    }

    /// Full run, including at most one widened retry, reporting metrics.
    pub async fn gather_context_detailed(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<GatherOutcome> {
        self.validate(request)?;

        let span = info_span!(
            "gather_context",
            request_id = %request.id,
            task_kind = %request.task_kind,
            scope = %request.scope,
        );

        async {
            self.stage(request, PipelineStage::Created);
            let (package, metrics) = self.run_once(request, &cancel).await?;

            let next_scope = request.scope.widen();
            let outcome = match next_scope {
                Some(scope)
                    if self.options.quality_retry
                        && metrics.is_below(&self.options.quality_threshold) =>
                {
                    info!(
                        relevance = metrics.relevance,
                        coverage = metrics.coverage,
                        next_scope = %scope,
                        "Context quality low, retrying with wider scope"
                    );
                    self.stage(request, PipelineStage::QualityLow);
                    self.events.publish(PipelineEvent::QualityLow {
                        request_id: request.id,
                        metrics,
                        next_scope: scope,
                    });

                    let widened = request.widened_to(scope);
                    let (retry_package, retry_metrics) = self.run_once(&widened, &cancel).await?;
                    if retry_metrics.is_better_than(&metrics) {
                        GatherOutcome {
                            package: retry_package,
                            metrics: retry_metrics,
                            retried: true,
                        }
                    } else {
                        debug!("Widened run was no better, keeping the first package");
                        GatherOutcome {
                            package,
                            metrics,
                            retried: true,
                        }
                    }
                }
                _ => GatherOutcome {
                    package,
                    metrics,
                    retried: false,
                },
            };

            self.stage(request, PipelineStage::Delivered);
            self.events.publish(PipelineEvent::PackageDelivered {
                request_id: request.id,
                fragments: outcome.metrics.fragment_count,
                tokens: outcome.metrics.total_tokens,
                timestamp: Utc::now(),
            });
            info!(
                fragments = outcome.metrics.fragment_count,
                tokens = outcome.metrics.total_tokens,
                budget = request.token_budget,
                retried = outcome.retried,
                "Context delivered"
            );

            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// One pass through the pipeline, without the quality retry.
    pub async fn run_once(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<(Package, Metrics)> {
        let fragments = self.collect_all(request, cancel).await?;
        let package = self.assemble(fragments, request);
        let metrics = analyze(&package, &self.config);
        Ok((package, metrics))
    }

    /// Fan out to every applicable collector and join the results in
    /// registration order.
    pub async fn collect_all(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Vec<Fragment>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.stage(request, PipelineStage::Collecting);

        let snapshot = self.registry.snapshot();
        let applicable: Vec<Arc<dyn Collector>> = snapshot
            .iter()
            .filter(|&c| check_applicable(c.as_ref(), request))
            .cloned()
            .collect();

        debug!(
            registered = snapshot.len(),
            applicable = applicable.len(),
            "Dispatching collectors"
        );

        // Costliest collectors start first; results still join in
        // registration order.
        let mut launch: Vec<usize> = (0..applicable.len()).collect();
        launch.sort_by_key(|&i| Reverse(applicable[i].estimated_cost()));

        let timeout = self.options.collector_timeout;
        let mut slots: Vec<Option<JoinHandle<CollectOutcome>>> =
            applicable.iter().map(|_| None).collect();
        for i in launch {
            let collector = Arc::clone(&applicable[i]);
            let request = request.clone();
            let cancel = cancel.clone();
            slots[i] = Some(tokio::spawn(
                async move {
                    let started = Instant::now();
                    let result =
                        tokio::time::timeout(timeout, collector.collect(&request, &cancel)).await;
                    CollectOutcome {
                        result: result.ok(),
                        elapsed: started.elapsed(),
                    }
                }
                .in_current_span(),
            ));
        }
        let handles: Vec<JoinHandle<CollectOutcome>> = slots.into_iter().flatten().collect();

        let _guard = AbortOnDrop(handles.iter().map(JoinHandle::abort_handle).collect());

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Context request cancelled, discarding partial results");
                return Err(Error::Cancelled);
            }
            joined = join_all(handles) => joined,
        };

        let mut fragments = Vec::with_capacity(joined.len());
        for (collector, joined) in applicable.iter().zip(joined) {
            let name = collector.name();
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = if e.is_panic() {
                        "collector panicked".to_string()
                    } else {
                        e.to_string()
                    };
                    self.collector_failed(request, name, reason);
                    continue;
                }
            };

            match outcome.result {
                Some(Ok(Some(fragment))) => {
                    self.collector_completed(request, name, true, outcome.elapsed);
                    let fragment = if fragment.priority() == 0 {
                        fragment.with_priority(collector.priority())
                    } else {
                        fragment
                    };
                    fragments.push(fragment);
                }
                Some(Ok(None)) => {
                    self.collector_completed(request, name, false, outcome.elapsed);
                }
                Some(Err(e)) => {
                    self.collector_failed(request, name, e.to_string());
                }
                None => {
                    let e = CollectorError::Timeout {
                        collector: name.to_string(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    };
                    self.collector_failed(request, name, e.to_string());
                }
            }
        }

        Ok(fragments)
    }

    /// Filter, prioritize and format already-collected fragments.
    pub fn assemble(&self, fragments: Vec<Fragment>, request: &Request) -> Package {
        self.stage(request, PipelineStage::Filtering);
        let filtered = filter_at(fragments, request, &self.config, Utc::now());

        self.stage(request, PipelineStage::Prioritizing);
        let selected = prioritize(filtered, request, &self.config);

        let package = format(selected, request);
        self.stage(request, PipelineStage::Formatted);
        package
    }

    fn stage(&self, request: &Request, stage: PipelineStage) {
        debug!(stage = %stage, "Pipeline stage");
        self.events.publish(PipelineEvent::StageEntered {
            request_id: request.id,
            stage,
            timestamp: Utc::now(),
        });
    }

    fn collector_completed(&self, request: &Request, name: &str, produced: bool, elapsed: Duration) {
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        debug!(collector = %name, produced, duration_ms, "Collector finished");
        self.events.publish(PipelineEvent::CollectorCompleted {
            request_id: request.id,
            collector: name.to_string(),
            produced,
            duration_ms,
        });
    }

    fn collector_failed(&self, request: &Request, name: &str, reason: String) {
        warn!(collector = %name, error = %reason, "Collector failed, continuing without it");
        self.events.publish(PipelineEvent::CollectorFailed {
            request_id: request.id,
            collector: name.to_string(),
            reason,
        });
    }
}

struct CollectOutcome {
    /// `None` when the deadline passed.
    result: Option<std::result::Result<Option<Fragment>, CollectorError>>,
    elapsed: Duration,
}

/// Aborts every outstanding collector task when a run ends early.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// A panicking `is_applicable` counts as "not applicable".
fn check_applicable(collector: &dyn Collector, request: &Request) -> bool {
    match catch_unwind(AssertUnwindSafe(|| collector.is_applicable(request))) {
        Ok(applicable) => applicable,
        Err(_) => {
            warn!(collector = %collector.name(), "is_applicable panicked, skipping collector");
            false
        }
    }
}
