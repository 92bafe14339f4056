//! `ctxpack gather` — assemble and print a context package.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ctxpack_collectors::default_registry;
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::fragment::FragmentKind;
use ctxpack_core::package::DEFAULT_TEMPLATE;
use ctxpack_core::request::{Request, Scope, TaskKind};
use ctxpack_engine::ContextEngine;
use tracing::warn;

pub struct GatherArgs {
    pub task: String,
    pub kind: TaskKind,
    pub scope: Scope,
    pub budget: Option<usize>,
    pub params: Vec<(String, String)>,
    pub focus: Vec<String>,
    pub prefer: Vec<FragmentKind>,
    pub template: Option<PathBuf>,
    pub metrics: bool,
}

pub async fn run(config_path: Option<&Path>, args: GatherArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let template = match &args.template {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read template {}: {e}", path.display()))?,
        None => config
            .output
            .template
            .clone()
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
    };

    let budget = args.budget.unwrap_or(config.engine.default_token_budget);
    let request = build_request(&args, budget);

    let engine = ContextEngine::from_config(&config).with_registry(Arc::new(default_registry()));

    // Ctrl-C cancels the run; no partial output is printed.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling context request");
            on_interrupt.cancel();
        }
    });

    let outcome = engine.gather_context_detailed(&request, cancel).await?;

    print!("{}", outcome.package.render_with(&template));

    if args.metrics {
        let report = serde_json::json!({
            "request_id": request.id,
            "retried": outcome.retried,
            "scope": outcome.package.request().scope,
            "budget_utilization": outcome.metrics.budget_utilization(),
            "metrics": outcome.metrics,
        });
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn build_request(args: &GatherArgs, budget: usize) -> Request {
    let mut request = Request::new(args.task.clone(), args.kind, budget).with_scope(args.scope);
    for (key, value) in &args.params {
        request = request.with_parameter(key.clone(), value.clone());
    }
    for tag in &args.focus {
        request = request.with_focus_area(tag.clone());
    }
    for kind in &args.prefer {
        request = request.with_preferred_kind(kind.clone());
    }
    request
}

/// Parse a `key=value` collector parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
