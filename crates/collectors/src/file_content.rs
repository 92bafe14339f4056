//! File content collector — reads the source file a request points at.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::collector::{Collector, CollectorKind};
use ctxpack_core::error::CollectorError;
use ctxpack_core::fragment::{Fragment, FragmentKind};
use ctxpack_core::request::{Request, TaskKind};
use tracing::debug;

/// Request parameter naming the file to read.
pub const PARAM_PATH: &str = "path";

const BASE_RELEVANCE: f64 = 0.8;
const FOCUS_BOOST: f64 = 0.05;

pub struct FileContentCollector {
    /// Relative paths resolve against this directory.
    root: PathBuf,
    /// Files larger than this are cut.
    max_bytes: usize,
}

impl FileContentCollector {
    pub fn new() -> Self {
        Self::with_root(".")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: 64 * 1024,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for FileContentCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for FileContentCollector {
    fn name(&self) -> &str {
        "file_content"
    }

    fn description(&self) -> &str {
        "Contents of the file named by the `path` parameter."
    }

    fn kind(&self) -> CollectorKind {
        CollectorKind::External
    }

    fn estimated_cost(&self) -> u32 {
        3
    }

    fn is_applicable(&self, request: &Request) -> bool {
        request.param_str(PARAM_PATH).is_some_and(|p| !p.trim().is_empty())
    }

    async fn collect(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        let raw = request
            .param_str(PARAM_PATH)
            .ok_or_else(|| CollectorError::MissingParameter {
                collector: self.name().into(),
                parameter: PARAM_PATH.into(),
            })?;
        let path = self.resolve(raw.trim());
        debug!(path = %path.display(), "Reading file for context");

        let content = tokio::select! {
            _ = cancel.cancelled() => return Err(CollectorError::Cancelled(self.name().into())),
            read = tokio::fs::read_to_string(&path) => read.map_err(|e| CollectorError::Io {
                collector: self.name().into(),
                reason: format!("{}: {e}", path.display()),
            })?,
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let kind = match request.task_kind {
            TaskKind::CodeGeneration | TaskKind::Refactoring => FragmentKind::StructuralCode,
            _ => FragmentKind::Implementation,
        };

        let relevance = focus_relevance(raw, &content, request);
        let truncated = content.len() > self.max_bytes;
        let body = cut(&content, self.max_bytes);

        let mut fragment = Fragment::new(self.name(), kind, body, relevance)
            .with_aspect("code")
            .with_metadata("path", raw.trim())
            .with_metadata("lines", content.lines().count().to_string());
        if truncated {
            fragment = fragment.with_metadata("truncated", "true");
        }
        Ok(Some(fragment))
    }
}

/// Base relevance plus a boost for every focus area the file mentions.
fn focus_relevance(path: &str, content: &str, request: &Request) -> f64 {
    let path = path.to_lowercase();
    let content = content.to_lowercase();
    let hits = request
        .focus_areas
        .iter()
        .map(|area| area.to_lowercase())
        .filter(|area| path.contains(area.as_str()) || content.contains(area.as_str()))
        .count();
    (BASE_RELEVANCE + FOCUS_BOOST * hits as f64).min(1.0)
}

fn cut(text: &str, max: usize) -> &str {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
