//! Forward date propagation over the dependency graph.
//!
//! Given a task whose dates changed (a manual edit or a shift), walks
//! its downstream closure in topological order and recomputes every
//! affected task against its incoming constraints. Tasks are only ever
//! translated forward, never resized and never moved earlier; when
//! conflicting constraints force the computed start past the computed
//! end, the task is flagged [`TaskState::Blocked`] instead of resized,
//! and propagation continues with its original duration.
//!
//! # Algorithm
//! For each task, in topological order: take the latest-forcing
//! start-constraint and the latest-forcing end-constraint across all
//! incoming edges, clamp each against the task's current dates in its
//! own constraint space, and translate the task by the largest demanded
//! delta. One pass suffices because every predecessor inside the
//! closure is processed first.

use tracing::{debug, warn};

use crate::error::{Result, ScheduleError};
use crate::models::{Task, TaskState};
use crate::resolver;
use crate::store::ScheduleGraph;

/// Result of one propagation pass.
#[derive(Debug, Clone, Default)]
pub struct PropagationOutcome {
    /// Tasks whose dates or state changed, in processing order.
    pub changed: Vec<Task>,
}

impl PropagationOutcome {
    /// Ids of work packages owning any changed task, deduplicated,
    /// in first-touched order.
    pub fn touched_work_packages(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for task in &self.changed {
            if !ids.contains(&task.work_package_id) {
                ids.push(task.work_package_id.clone());
            }
        }
        ids
    }
}

/// Recomputes the dates of every task downstream of `root_task_id`.
///
/// The root's dates are whatever the caller set (manual edits are
/// authoritative and may move a task earlier), but the root passes
/// through the same constraint evaluation as its successors, so an
/// edit violating the root's own incoming constraints is pushed
/// forward to the constraint boundary.
pub fn propagate_from(
    graph: &mut ScheduleGraph,
    root_task_id: &str,
) -> Result<PropagationOutcome> {
    if graph.task(root_task_id).is_none() {
        return Err(ScheduleError::not_found(format!("task '{root_task_id}'")));
    }

    let closure = resolver::downstream_closure(root_task_id, &graph.dependencies);
    let mut outcome = PropagationOutcome::default();

    for task_id in std::iter::once(root_task_id.to_string()).chain(closure) {
        if let Some(updated) = recompute_task(graph, &task_id)? {
            outcome.changed.push(updated);
        }
    }

    debug!(
        root = root_task_id,
        changed = outcome.changed.len(),
        "propagation pass complete"
    );
    Ok(outcome)
}

/// Applies the incoming constraints of one task. Returns the updated
/// task when its dates or state changed.
fn recompute_task(graph: &mut ScheduleGraph, task_id: &str) -> Result<Option<Task>> {
    let current = graph
        .task(task_id)
        .cloned()
        .ok_or_else(|| ScheduleError::not_found(format!("task '{task_id}'")))?;

    // Latest-forcing constraint per constraint space, across all
    // incoming edges. In-closure predecessors carry updated dates by
    // topological order; out-of-closure predecessors were not touched.
    let mut required_start = None;
    let mut required_end = None;
    for edge in graph
        .incoming(task_id)
        .cloned()
        .collect::<Vec<_>>()
    {
        let Some(pred) = graph.task(&edge.from_task_id) else {
            return Err(ScheduleError::internal(format!(
                "dependency '{}' references missing task '{}'",
                edge.id, edge.from_task_id
            )));
        };
        let required = edge.required_date(pred.start, pred.end);
        let slot = if edge.kind.constrains_start() {
            &mut required_start
        } else {
            &mut required_end
        };
        *slot = Some(match *slot {
            Some(prev) if prev >= required => prev,
            _ => required,
        });
    }

    let duration = current.duration_days();
    let computed_start = required_start.map_or(current.start, |r| r.max(current.start));
    let computed_end = required_end.map_or(current.end, |r| r.max(current.end));

    let mut updated = current.clone();
    let conflicting =
        required_start.is_some() && required_end.is_some() && computed_start > computed_end;
    if conflicting {
        // Duration inversion: start- and end-side constraints disagree.
        // Keep the original duration anchored at the computed start and
        // flag the task instead of resizing it. A start-only push past
        // the current end is not a conflict; the translate path below
        // carries the end along.
        updated.start = computed_start;
        updated.end = computed_start + chrono::Duration::days(duration);
        if updated.state != TaskState::Done {
            updated.state = TaskState::Blocked;
        }
        if updated != current {
            warn!(
                task = task_id,
                start = %computed_start,
                end = %computed_end,
                "conflicting constraints force a duration inversion; task blocked"
            );
            return Ok(apply_update(graph, updated));
        }
        return Ok(None);
    }

    let delta = (computed_start - current.start)
        .num_days()
        .max((computed_end - current.end).num_days())
        .max(0);
    if delta > 0 {
        updated.shift(delta);
        debug!(task = task_id, delta, "task pushed forward by dependency constraints");
    }
    if updated.state == TaskState::Blocked {
        // Clean recompute: the conflict is gone, recover the task.
        updated.state = if updated.progress_percent > 0.0 {
            TaskState::InProgress
        } else {
            TaskState::Pending
        };
    }

    if updated != current {
        Ok(apply_update(graph, updated))
    } else {
        Ok(None)
    }
}

fn apply_update(graph: &mut ScheduleGraph, updated: Task) -> Option<Task> {
    let slot = graph.task_mut(&updated.id)?;
    *slot = updated.clone();
    Some(updated)
}
