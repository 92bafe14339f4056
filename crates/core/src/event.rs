//! Pipeline event system — observe a run without coupling to the engine.
//!
//! Events are published as a run moves through its stages and as each
//! collector finishes. Subscribers can log, trace or test against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::request::Scope;

/// States of one orchestrator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Created,
    Collecting,
    Filtering,
    Prioritizing,
    Formatted,
    QualityLow,
    Delivered,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Collecting => "collecting",
            Self::Filtering => "filtering",
            Self::Prioritizing => "prioritizing",
            Self::Formatted => "formatted",
            Self::QualityLow => "quality_low",
            Self::Delivered => "delivered",
        })
    }
}

/// All pipeline events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A run entered a new stage
    StageEntered {
        request_id: Uuid,
        stage: PipelineStage,
        timestamp: DateTime<Utc>,
    },

    /// A collector finished within its timeout
    CollectorCompleted {
        request_id: Uuid,
        collector: String,
        produced: bool,
        duration_ms: u64,
    },

    /// A collector errored, panicked or timed out
    CollectorFailed {
        request_id: Uuid,
        collector: String,
        reason: String,
    },

    /// Quality fell below threshold; a wider retry follows
    QualityLow {
        request_id: Uuid,
        metrics: Metrics,
        next_scope: Scope,
    },

    /// A package was handed back to the caller
    PackageDelivered {
        request_id: Uuid,
        fragments: usize,
        tokens: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for pipeline events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<PipelineEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: PipelineEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PipelineEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
