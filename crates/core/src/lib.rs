//! # ctxpack Core
//!
//! Domain types, traits, and error definitions for the ctxpack context
//! assembly pipeline. This crate holds **no pipeline logic** — it defines
//! the model that the engine and every collector implement against.
//!
//! ## Design Philosophy
//!
//! The only extension point, [`Collector`], is defined here. Implementations
//! live in their own crates. This enables:
//! - Plugging in new data sources without touching the engine
//! - Easy testing with mock/stub collectors
//! - Clean dependency graph (all crates depend inward on core)

pub mod cancel;
pub mod collector;
pub mod config;
pub mod error;
pub mod event;
pub mod fragment;
pub mod metrics;
pub mod package;
pub mod request;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use cancel::CancellationToken;
pub use collector::{Collector, CollectorKind, CollectorMetadata};
pub use config::ContextConfig;
pub use error::{CollectorError, Error, Result};
pub use event::{EventBus, PipelineEvent, PipelineStage};
pub use fragment::{Fragment, FragmentKind};
pub use metrics::{Metrics, QualityThreshold};
pub use package::{Package, Section};
pub use request::{Request, Scope, TaskKind};
