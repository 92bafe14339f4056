//! Collector registry — owns every collector an engine may fan out to.
//!
//! Registration happens at startup; reads happen on every request. Writers
//! serialise on one lock and publish a fresh immutable snapshot, so a
//! run keeps the exact collector list it started with.

use std::sync::{Arc, RwLock};

use ctxpack_core::collector::{Collector, CollectorMetadata};
use tracing::info;

type Snapshot = Arc<Vec<Arc<dyn Collector>>>;

/// Registration-ordered set of collectors.
pub struct CollectorRegistry {
    collectors: RwLock<Snapshot>,
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            collectors: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Register a collector. A collector with the same name is replaced
    /// in place, keeping its original position.
    pub fn register(&self, collector: Arc<dyn Collector>) {
        let name = collector.name().to_string();
        let mut guard = self
            .collectors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut next: Vec<Arc<dyn Collector>> = (**guard).clone();
        match next.iter().position(|c| c.name() == name) {
            Some(idx) => next[idx] = collector,
            None => next.push(collector),
        }
        *guard = Arc::new(next);

        info!(collector = %name, total = guard.len(), "Registered collector");
    }

    /// The current collector list, in registration order.
    pub fn snapshot(&self) -> Snapshot {
        let guard = self
            .collectors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Get a collector by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Collector>> {
        self.snapshot().iter().find(|c| c.name() == name).cloned()
    }

    /// List all registered collector names.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|c| c.name().to_string()).collect()
    }

    /// Metadata for every registered collector.
    pub fn metadata(&self) -> Vec<CollectorMetadata> {
        self.snapshot().iter().map(|c| c.metadata()).collect()
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
