//! Manifest collector — the project's declared dependencies.
//!
//! Looks for `Cargo.toml`, then `package.json`, in the directory given by
//! the `root` parameter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ctxpack_core::cancel::CancellationToken;
use ctxpack_core::collector::{Collector, CollectorKind};
use ctxpack_core::error::CollectorError;
use ctxpack_core::fragment::{Fragment, FragmentKind};
use ctxpack_core::request::{Request, Scope, TaskKind};
use tracing::debug;

/// Request parameter naming the project root.
pub const PARAM_ROOT: &str = "root";

const MANIFESTS: [&str; 2] = ["Cargo.toml", "package.json"];

pub struct ManifestCollector;

/// Dependencies read from one manifest.
#[derive(Debug, Default, PartialEq)]
struct Summary {
    project: Option<String>,
    /// `(section, name, version)` in file order per section.
    dependencies: Vec<(String, String, String)>,
}

#[async_trait]
impl Collector for ManifestCollector {
    fn name(&self) -> &str {
        "manifest"
    }

    fn description(&self) -> &str {
        "Declared dependencies from Cargo.toml or package.json."
    }

    fn kind(&self) -> CollectorKind {
        CollectorKind::Hybrid
    }

    fn estimated_cost(&self) -> u32 {
        2
    }

    fn is_applicable(&self, request: &Request) -> bool {
        request.scope == Scope::Project
            || matches!(request.task_kind, TaskKind::BugFixing | TaskKind::CodeGeneration)
    }

    async fn collect(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Option<Fragment>, CollectorError> {
        let root = PathBuf::from(request.param_str(PARAM_ROOT).unwrap_or("."));

        for manifest in MANIFESTS {
            if cancel.is_cancelled() {
                return Err(CollectorError::Cancelled(self.name().into()));
            }
            let path = root.join(manifest);
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(CollectorError::Io {
                        collector: self.name().into(),
                        reason: format!("{}: {e}", path.display()),
                    });
                }
            };

            debug!(manifest = %path.display(), "Parsing manifest");
            let summary = match manifest {
                "Cargo.toml" => parse_cargo(&text),
                _ => parse_package_json(&text),
            }
            .map_err(|reason| CollectorError::Failed {
                collector: self.name().into(),
                reason: format!("{}: {reason}", path.display()),
            })?;

            return Ok(render(self.name(), manifest, &path, &summary));
        }

        Ok(None)
    }
}

fn parse_cargo(text: &str) -> Result<Summary, String> {
    let doc: toml::Table = toml::from_str(text).map_err(|e| e.to_string())?;
    let project = doc
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string);

    let mut dependencies = Vec::new();
    for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
        let Some(table) = doc.get(section).and_then(|t| t.as_table()) else {
            continue;
        };
        for (name, spec) in table {
            let version = match spec {
                toml::Value::String(v) => v.clone(),
                toml::Value::Table(t) => t
                    .get("version")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| t.get("path").map(|_| "path".to_string()))
                    .or_else(|| t.get("workspace").map(|_| "workspace".to_string()))
                    .unwrap_or_else(|| "*".to_string()),
                _ => "*".to_string(),
            };
            dependencies.push((section.to_string(), name.clone(), version));
        }
    }

    Ok(Summary {
        project,
        dependencies,
    })
}

fn parse_package_json(text: &str) -> Result<Summary, String> {
    let doc: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let project = doc["name"].as_str().map(str::to_string);

    let mut dependencies = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        let Some(map) = doc[section].as_object() else {
            continue;
        };
        for (name, version) in map {
            let version = version.as_str().unwrap_or("*").to_string();
            dependencies.push((section.to_string(), name.clone(), version));
        }
    }

    Ok(Summary {
        project,
        dependencies,
    })
}

fn render(source: &str, manifest: &str, path: &Path, summary: &Summary) -> Option<Fragment> {
    if summary.dependencies.is_empty() {
        return None;
    }

    let mut content = match &summary.project {
        Some(name) => format!("{manifest} ({name})\n"),
        None => format!("{manifest}\n"),
    };
    let mut current = "";
    for (section, name, version) in &summary.dependencies {
        if section != current {
            content.push_str(&format!("[{section}]\n"));
            current = section.as_str();
        }
        content.push_str(&format!("{name} = {version}\n"));
    }

    Some(
        Fragment::new(source, FragmentKind::Dependencies, content, 0.7)
            .with_aspect("dependencies")
            .with_metadata("manifest", path.display().to_string())
            .with_metadata("count", summary.dependencies.len().to_string()),
    )
}
