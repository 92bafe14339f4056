//! Task description collector — restates the request itself.

use async_trait::async_trait;
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::collector::Collector;
use ctxpack_core::error::CollectorError;
use ctxpack_core::fragment::{Fragment, FragmentKind};
use ctxpack_core::request::Request;

pub struct TaskDescriptionCollector;

#[async_trait]
impl Collector for TaskDescriptionCollector {
    fn name(&self) -> &str {
        "task_description"
    }

    fn description(&self) -> &str {
        "The task as the caller described it."
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_applicable(&self, request: &Request) -> bool {
        !request.description.trim().is_empty()
    }

    async fn collect(
        &self,
        request: &Request,
        _cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        let text = request.description.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let mut fragment = Fragment::new(self.name(), FragmentKind::TaskDescription, text, 1.0)
            .with_aspect("task")
            .with_metadata("task_kind", request.task_kind.as_str());
        for area in &request.focus_areas {
            fragment = fragment.with_aspect(area.as_str());
        }
        Ok(Some(fragment))
    }
}
