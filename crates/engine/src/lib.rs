//! # ctxpack Engine
//!
//! The context assembly pipeline: a collector registry, the concurrent
//! orchestrator, and the pure Filter → Prioritizer → Formatter stages it
//! drives. Each stage is a plain function so it can be tested and reused
//! on its own.

pub mod engine;
pub mod filter;
pub mod formatter;
pub mod metrics;
pub mod prioritizer;
pub mod registry;

pub use engine::{ContextEngine, EngineOptions, GatherOutcome};
pub use filter::{FilterStats, filter, filter_at, filter_with_stats, similarity};
pub use formatter::{format, section_order};
pub use metrics::analyze;
pub use prioritizer::{prioritize, reserved_tokens};
pub use registry::CollectorRegistry;
