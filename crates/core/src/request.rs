//! Context requests — what the caller wants context for.
//!
//! A [`Request`] is built once by the caller and only read afterwards.
//! Widening the scope for a retry produces a new value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::fragment::FragmentKind;

/// The kind of task the context is being assembled for.
///
/// Drives section ordering in the formatter and collector applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    BugFixing,
    CodeGeneration,
    Refactoring,
    CodeReview,
    Documentation,
    Testing,
    General,
}

impl TaskKind {
    pub const ALL: [TaskKind; 7] = [
        TaskKind::BugFixing,
        TaskKind::CodeGeneration,
        TaskKind::Refactoring,
        TaskKind::CodeReview,
        TaskKind::Documentation,
        TaskKind::Testing,
        TaskKind::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BugFixing => "bug_fixing",
            Self::CodeGeneration => "code_generation",
            Self::Refactoring => "refactoring",
            Self::CodeReview => "code_review",
            Self::Documentation => "documentation",
            Self::Testing => "testing",
            Self::General => "general",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TaskKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown task kind '{s}'"))
    }
}

/// How broadly collectors may search.
///
/// Ordered: `Local < Module < Project`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Local,
    Module,
    Project,
}

impl Scope {
    /// The next broader scope, or `None` when already at the widest.
    pub fn widen(self) -> Option<Scope> {
        match self {
            Self::Local => Some(Self::Module),
            Self::Module => Some(Self::Project),
            Self::Project => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Module => "module",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "module" => Ok(Self::Module),
            "project" => Ok(Self::Project),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

/// A request for context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation ID, used only for logging.
    pub id: Uuid,

    /// Free-text description of the task.
    pub description: String,

    pub task_kind: TaskKind,

    pub scope: Scope,

    /// Hard upper bound on the estimated tokens of the package.
    pub token_budget: usize,

    /// Open parameter map consumed by individual collectors
    /// (e.g. `path`, `error_log`).
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,

    /// Tags that collectors may use to boost relevance.
    #[serde(default)]
    pub focus_areas: BTreeSet<String>,

    /// Fragment kinds the caller wants first.
    #[serde(default)]
    pub preferred_kinds: Vec<FragmentKind>,

    /// Opaque caller-supplied tag. Carried through, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_tag: Option<String>,
}

impl Request {
    /// Create a request with local scope and no parameters.
    pub fn new(description: impl Into<String>, task_kind: TaskKind, token_budget: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            task_kind,
            scope: Scope::Local,
            token_budget,
            parameters: BTreeMap::new(),
            focus_areas: BTreeSet::new(),
            preferred_kinds: Vec::new(),
            caller_tag: None,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_focus_area(mut self, tag: impl Into<String>) -> Self {
        self.focus_areas.insert(tag.into());
        self
    }

    pub fn with_preferred_kind(mut self, kind: FragmentKind) -> Self {
        if !self.preferred_kinds.contains(&kind) {
            self.preferred_kinds.push(kind);
        }
        self
    }

    pub fn with_caller_tag(mut self, tag: impl Into<String>) -> Self {
        self.caller_tag = Some(tag.into());
        self
    }

    /// Copy of this request with a different scope, keeping the same ID.
    pub fn widened_to(&self, scope: Scope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }

    /// Look up a string parameter. Non-string values are ignored.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }
}
