//! Error log collector — surfaces a caller-supplied stack trace or log.

use async_trait::async_trait;
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::collector::Collector;
use ctxpack_core::error::CollectorError;
use ctxpack_core::fragment::{Fragment, FragmentKind};
use ctxpack_core::request::{Request, TaskKind};

/// Request parameter holding the error text.
pub const PARAM_ERROR_LOG: &str = "error_log";

/// Longest error log kept, in bytes. The head of a trace carries the cause.
const MAX_LOG_BYTES: usize = 16 * 1024;

pub struct ErrorLogCollector;

#[async_trait]
impl Collector for ErrorLogCollector {
    fn name(&self) -> &str {
        "error_log"
    }

    fn description(&self) -> &str {
        "Runtime error or stack trace passed in the `error_log` parameter."
    }

    fn priority(&self) -> i32 {
        5
    }

    fn is_applicable(&self, request: &Request) -> bool {
        request.task_kind == TaskKind::BugFixing || request.has_param(PARAM_ERROR_LOG)
    }

    async fn collect(
        &self,
        request: &Request,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        let Some(raw) = request.param_str(PARAM_ERROR_LOG) else {
            if request.has_param(PARAM_ERROR_LOG) {
                return Err(CollectorError::Failed {
                    collector: self.name().into(),
                    reason: format!("'{PARAM_ERROR_LOG}' must be a string"),
                });
            }
            return Ok(None);
        };

        let log = raw.trim();
        if log.is_empty() {
            return Ok(None);
        }

        let (log, truncated) = truncate(log, MAX_LOG_BYTES);
        let mut fragment = Fragment::new(self.name(), FragmentKind::RuntimeError, log, 0.95)
            .with_aspect("error")
            .with_metadata("lines", log.lines().count().to_string());
        if truncated {
            fragment = fragment.with_metadata("truncated", "true");
        }
        Ok(Some(fragment))
    }
}

/// Cut `text` to at most `max` bytes on a char boundary.
fn truncate(text: &str, max: usize) -> (&str, bool) {
    if text.len() <= max {
        return (text, false);
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}
