//! Git history collector — recent commits of the repository under work.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::collector::{Collector, CollectorKind};
use ctxpack_core::error::CollectorError;
use ctxpack_core::fragment::{Fragment, FragmentKind};
use ctxpack_core::request::{Request, Scope};
use tokio::process::Command;
use tracing::{debug, warn};

/// Request parameter naming the repository directory.
pub const PARAM_REPO: &str = "repo";

pub struct GitHistoryCollector;

impl GitHistoryCollector {
    /// How many commits to show for a scope.
    pub fn commit_limit(scope: Scope) -> usize {
        match scope {
            Scope::Local => 5,
            Scope::Module => 20,
            Scope::Project => 50,
        }
    }
}

#[async_trait]
impl Collector for GitHistoryCollector {
    fn name(&self) -> &str {
        "git_history"
    }

    fn description(&self) -> &str {
        "Recent commit log of the repository in the `repo` parameter."
    }

    fn kind(&self) -> CollectorKind {
        CollectorKind::External
    }

    fn estimated_cost(&self) -> u32 {
        5
    }

    fn is_applicable(&self, request: &Request) -> bool {
        request.scope >= Scope::Module
    }

    async fn collect(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        let repo = PathBuf::from(request.param_str(PARAM_REPO).unwrap_or("."));
        let limit = Self::commit_limit(request.scope);

        debug!(repo = %repo.display(), limit, "Reading git history");

        let child = Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(["log", "--oneline", "--no-color", "-n"])
            .arg(limit.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(CollectorError::Cancelled(self.name().into())),
            output = child => output.map_err(|e| CollectorError::Io {
                collector: self.name().into(),
                reason: format!("failed to run git: {e}"),
            })?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                repo = %repo.display(),
                exit_code = output.status.code().unwrap_or(-1),
                stderr = %stderr.trim(),
                "git log failed, no history collected"
            );
            return Ok(None);
        }

        let log = String::from_utf8_lossy(&output.stdout);
        Ok(history_fragment(self.name(), &log, &repo))
    }
}

/// Turn `git log --oneline` output into a fragment. Empty logs give none.
fn history_fragment(source: &str, log: &str, repo: &std::path::Path) -> Option<Fragment> {
    let commits: Vec<&str> = log.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if commits.is_empty() {
        return None;
    }
    Some(
        Fragment::new(source, FragmentKind::History, commits.join("\n"), 0.6)
            .with_aspect("history")
            .with_metadata("commits", commits.len().to_string())
            .with_metadata("repo", repo.display().to_string()),
    )
}
