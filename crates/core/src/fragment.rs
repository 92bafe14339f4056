//! Fragments — immutable units of candidate context.
//!
//! A collector produces at most one fragment per request. Relevance and
//! token cost are fixed when the fragment is built; nothing downstream
//! recomputes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::token;

/// Metadata key holding a fragment's age in whole seconds.
pub const META_AGE_SECS: &str = "age_secs";

/// Metadata key holding an RFC 3339 creation timestamp.
pub const META_TIMESTAMP: &str = "timestamp";

/// Content category of a fragment.
///
/// Declaration order is the canonical section order used when a task
/// has no explicit placement for a kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    TaskDescription,
    RuntimeError,
    Implementation,
    StructuralCode,
    Patterns,
    Dependencies,
    Documentation,
    History,
    Logs,
    Examples,
    Tests,
    /// Anything a third-party collector invents.
    Custom(String),
}

impl FragmentKind {
    pub const BUILTIN: [FragmentKind; 11] = [
        FragmentKind::TaskDescription,
        FragmentKind::RuntimeError,
        FragmentKind::Implementation,
        FragmentKind::StructuralCode,
        FragmentKind::Patterns,
        FragmentKind::Dependencies,
        FragmentKind::Documentation,
        FragmentKind::History,
        FragmentKind::Logs,
        FragmentKind::Examples,
        FragmentKind::Tests,
    ];

    /// Machine name (snake_case).
    pub fn as_str(&self) -> &str {
        match self {
            Self::TaskDescription => "task_description",
            Self::RuntimeError => "runtime_error",
            Self::Implementation => "implementation",
            Self::StructuralCode => "structural_code",
            Self::Patterns => "patterns",
            Self::Dependencies => "dependencies",
            Self::Documentation => "documentation",
            Self::History => "history",
            Self::Logs => "logs",
            Self::Examples => "examples",
            Self::Tests => "tests",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Human-readable section heading.
    pub fn title(&self) -> String {
        match self {
            Self::TaskDescription => "Task Description".into(),
            Self::RuntimeError => "Runtime Errors".into(),
            Self::Implementation => "Implementation".into(),
            Self::StructuralCode => "Code Structure".into(),
            Self::Patterns => "Patterns".into(),
            Self::Dependencies => "Dependencies".into(),
            Self::Documentation => "Documentation".into(),
            Self::History => "History".into(),
            Self::Logs => "Logs".into(),
            Self::Examples => "Examples".into(),
            Self::Tests => "Tests".into(),
            Self::Custom(name) => name
                .split(['_', '-'])
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentKind {
    type Err = std::convert::Infallible;

    /// Unknown names become [`FragmentKind::Custom`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Ok(FragmentKind::BUILTIN
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .unwrap_or(FragmentKind::Custom(normalized)))
    }
}

/// One immutable unit of candidate context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    source: String,
    kind: FragmentKind,
    content: String,
    relevance: f64,
    aspects: BTreeSet<String>,
    metadata: BTreeMap<String, String>,
    estimated_tokens: usize,
    priority: i32,
}

impl Fragment {
    /// Build a fragment. Relevance is clamped to `[0, 1]` (NaN becomes 0)
    /// and the token estimate is derived from the content once.
    pub fn new(
        source: impl Into<String>,
        kind: FragmentKind,
        content: impl Into<String>,
        relevance: f64,
    ) -> Self {
        let content = content.into();
        let relevance = if relevance.is_nan() {
            0.0
        } else {
            relevance.clamp(0.0, 1.0)
        };
        Self {
            source: source.into(),
            kind,
            estimated_tokens: token::estimate_tokens(&content),
            content,
            relevance,
            aspects: BTreeSet::new(),
            metadata: BTreeMap::new(),
            priority: 0,
        }
    }

    pub fn with_aspect(mut self, aspect: impl Into<String>) -> Self {
        self.aspects.insert(aspect.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stamp the producing collector's static priority. Set by the
    /// orchestrator when the fragment crosses the collection barrier.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &FragmentKind {
        &self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn relevance(&self) -> f64 {
        self.relevance
    }

    pub fn aspects(&self) -> &BTreeSet<String> {
        &self.aspects
    }

    pub fn has_aspect(&self, aspect: &str) -> bool {
        self.aspects.contains(aspect)
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Relevance per token. Zero-token fragments count as one token.
    pub fn density(&self) -> f64 {
        self.relevance / self.estimated_tokens.max(1) as f64
    }

    /// Age in seconds relative to `now`, if the collector attached one.
    ///
    /// `age_secs` wins over `timestamp`. Unparseable values count as
    /// no age at all.
    pub fn age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        if let Some(age) = self.metadata.get(META_AGE_SECS) {
            return age.trim().parse::<i64>().ok();
        }
        let stamp = self.metadata.get(META_TIMESTAMP)?;
        let created = DateTime::parse_from_rfc3339(stamp.trim()).ok()?;
        Some((now - created.with_timezone(&Utc)).num_seconds())
    }
}
