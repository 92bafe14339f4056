//! The assembled, ordered, budget-respecting output of one run.

use serde::{Deserialize, Serialize};

use crate::fragment::{Fragment, FragmentKind};
use crate::request::Request;

/// Template used by [`Package::render`].
pub const DEFAULT_TEMPLATE: &str = "# Task\n\n{task}\n\n{sections}";

/// All selected fragments of one kind, in selection order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: FragmentKind,
    pub fragments: Vec<Fragment>,
}

impl Section {
    pub fn tokens(&self) -> usize {
        self.fragments.iter().map(Fragment::estimated_tokens).sum()
    }

    /// Render as a markdown section: a kind heading, then one
    /// sub-heading per fragment naming its collector and metadata.
    pub fn render(&self) -> String {
        let mut out = format!("## {}\n", self.kind.title());
        for fragment in &self.fragments {
            out.push('\n');
            out.push_str(&format!("### {}", fragment.source()));
            if !fragment.metadata().is_empty() {
                let meta = fragment
                    .metadata()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(" ({meta})"));
            }
            out.push('\n');
            out.push_str(fragment.content().trim_end());
            out.push('\n');
        }
        out
    }
}

/// Final result of one pipeline run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    request: Request,
    sections: Vec<Section>,
    fragments: Vec<Fragment>,
}

impl Package {
    /// Build a package from ordered sections. The flat fragment list is
    /// derived from the sections, so every fragment sits in exactly one.
    /// Empty sections are discarded.
    pub fn new(request: Request, sections: Vec<Section>) -> Self {
        let sections: Vec<Section> = sections
            .into_iter()
            .filter(|s| !s.fragments.is_empty())
            .collect();
        let fragments = sections
            .iter()
            .flat_map(|s| s.fragments.iter().cloned())
            .collect();
        Self {
            request,
            sections,
            fragments,
        }
    }

    /// A package with no content.
    pub fn empty(request: Request) -> Self {
        Self::new(request, Vec::new())
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.fragments.iter().map(Fragment::estimated_tokens).sum()
    }

    /// Render with [`DEFAULT_TEMPLATE`].
    pub fn render(&self) -> String {
        self.render_with(DEFAULT_TEMPLATE)
    }

    /// Render with a caller-supplied template. `{task}` is replaced by the
    /// request description and `{sections}` by the rendered sections.
    pub fn render_with(&self, template: &str) -> String {
        let sections = self
            .sections
            .iter()
            .map(Section::render)
            .collect::<Vec<_>>()
            .join("\n");
        let rendered = fill_template(template, self.request.description.trim(), &sections);
        format!("{}\n", rendered.trim_end())
    }
}

/// Substitute both placeholders in a single pass; inserted text is never
/// rescanned.
fn fill_template(template: &str, task: &str, sections: &str) -> String {
    let mut out = String::with_capacity(template.len() + task.len() + sections.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        if let Some(after) = tail.strip_prefix("{task}") {
            out.push_str(task);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{sections}") {
            out.push_str(sections);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
