//! Collector trait — the pluggable source of context fragments.
//!
//! Collectors are what give the pipeline something to assemble:
//! read a file, summarise version history, surface an error log, etc.
//! Every data source is integrated by implementing [`Collector`] and
//! registering an instance with the engine before the first request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cancel::CancellationToken;
use crate::error::CollectorError;
use crate::fragment::Fragment;
use crate::request::Request;

/// How a collector is expected to behave at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorKind {
    /// Cheap and deterministic, no I/O.
    Static,
    /// I/O bound (filesystem, processes, network).
    External,
    /// A blend of both.
    Hybrid,
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::External => "external",
            Self::Hybrid => "hybrid",
        })
    }
}

/// Descriptive information about a collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub kind: CollectorKind,
}

/// The core Collector trait.
///
/// `collect` may run concurrently with every other registered collector
/// and must not mutate state outside itself. A collector with nothing
/// useful to say returns `Ok(None)`; it never fabricates an empty
/// fragment.
#[async_trait]
pub trait Collector: Send + Sync {
    /// The unique name of this collector (e.g., "file_content").
    fn name(&self) -> &str;

    /// A one-line description of what this collector contributes.
    fn description(&self) -> &str;

    fn kind(&self) -> CollectorKind {
        CollectorKind::Static
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Whether this collector has anything to offer for `request`.
    /// Pure and cheap: no I/O.
    fn is_applicable(&self, request: &Request) -> bool;

    /// Produce at most one fragment for `request`.
    ///
    /// Long-running implementations should poll `cancel` and bail out
    /// with [`CollectorError::Cancelled`] once it fires.
    async fn collect(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError>;

    /// Static tie-break weight. Higher sorts first.
    fn priority(&self) -> i32 {
        0
    }

    /// Opaque relative cost. The engine spawns costlier collectors first.
    fn estimated_cost(&self) -> u32 {
        1
    }

    fn metadata(&self) -> CollectorMetadata {
        CollectorMetadata {
            name: self.name().to_string(),
            description: self.description().to_string(),
            version: self.version().to_string(),
            kind: self.kind(),
        }
    }
}
