//! Built-in collectors for ctxpack.
//!
//! Collectors feed the pipeline: the task text itself, an error log,
//! the file under work, recent git history and the project manifest.
//! Each is independent and optional; the engine runs whichever are
//! applicable to a request.

pub mod error_log;
pub mod file_content;
pub mod git_history;
pub mod manifest;
pub mod task_description;

use std::sync::Arc;

use ctxpack_core::collector::Collector;
use ctxpack_engine::registry::CollectorRegistry;

pub use error_log::ErrorLogCollector;
pub use file_content::FileContentCollector;
pub use git_history::GitHistoryCollector;
pub use manifest::ManifestCollector;
pub use task_description::TaskDescriptionCollector;

/// Every built-in collector, in registration order.
pub fn builtin_collectors() -> Vec<Arc<dyn Collector>> {
    vec![
        Arc::new(TaskDescriptionCollector),
        Arc::new(ErrorLogCollector),
        Arc::new(FileContentCollector::new()),
        Arc::new(GitHistoryCollector),
        Arc::new(ManifestCollector),
    ]
}

/// A registry holding every built-in collector.
pub fn default_registry() -> CollectorRegistry {
    let registry = CollectorRegistry::new();
    for collector in builtin_collectors() {
        registry.register(collector);
    }
    registry
}
