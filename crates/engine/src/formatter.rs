//! Groups selected fragments into an ordered, task-shaped package.
//!
//! Section order comes from three sources, first match wins:
//! the request's preferred kinds, the task's ordering table, then the
//! canonical kind order, with custom kinds last in the order they first
//! appear. Within a section, fragments keep the order the
//! prioritizer produced.

use std::cmp::Ordering;

use ctxpack_core::fragment::{Fragment, FragmentKind};
use ctxpack_core::package::{Package, Section};
use ctxpack_core::request::{Request, TaskKind};

/// Kinds that lead the package for a task, first to last.
pub fn section_order(task: TaskKind) -> Vec<FragmentKind> {
    use FragmentKind::*;
    match task {
        TaskKind::BugFixing => vec![RuntimeError, Implementation, Logs, Dependencies, History, Tests],
        TaskKind::CodeGeneration => vec![TaskDescription, StructuralCode, Patterns, Dependencies, Examples],
        TaskKind::Refactoring => vec![StructuralCode, Implementation, Patterns, Tests, Dependencies],
        TaskKind::CodeReview => vec![Implementation, History, Patterns, Tests],
        TaskKind::Documentation => vec![TaskDescription, Documentation, StructuralCode, Examples],
        TaskKind::Testing => vec![Implementation, Tests, Examples, StructuralCode],
        TaskKind::General => Vec::new(),
    }
}

/// Build the package for `request` from the selected fragments.
pub fn format(fragments: Vec<Fragment>, request: &Request) -> Package {
    // Groups in order of first appearance.
    let mut groups: Vec<(FragmentKind, Vec<Fragment>)> = Vec::new();
    for fragment in fragments {
        match groups.iter_mut().find(|(kind, _)| *kind == *fragment.kind()) {
            Some((_, members)) => members.push(fragment),
            None => groups.push((fragment.kind().clone(), vec![fragment])),
        }
    }

    let leading = request
        .preferred_kinds
        .iter()
        .cloned()
        .chain(section_order(request.task_kind));

    let mut sections = Vec::with_capacity(groups.len());
    for kind in leading {
        if let Some(pos) = groups.iter().position(|(k, _)| *k == kind) {
            let (kind, fragments) = groups.remove(pos);
            sections.push(Section { kind, fragments });
        }
    }

    // Built-in kinds in canonical order, custom kinds after them as they
    // first appeared. The sort is stable.
    groups.sort_by(|(a, _), (b, _)| match (a, b) {
        (FragmentKind::Custom(_), FragmentKind::Custom(_)) => Ordering::Equal,
        _ => a.cmp(b),
    });
    sections.extend(
        groups
            .into_iter()
            .map(|(kind, fragments)| Section { kind, fragments }),
    );

    Package::new(request.clone(), sections)
}
