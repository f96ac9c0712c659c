//! Schedule mutation service.
//!
//! The only surface external callers interact with. Every operation
//! follows the same shape: resolve the owning schedule, take that
//! schedule's exclusive lock, load the subgraph, validate, mutate in
//! memory (propagation, rollup), and persist all affected records as
//! one atomic batch carrying the optimistic lock version that was
//! read. Operations on different schedules run fully in parallel;
//! nothing is propagated in the background.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::baseline;
use crate::error::{Result, ScheduleError};
use crate::models::{Dependency, DependencyType, Schedule, Task, TaskState};
use crate::propagator;
use crate::resolver;
use crate::rollup;
use crate::store::{ChangeSet, GraphStore, ScheduleGraph};

/// Attributes for a task to be created.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Caller-supplied id; minted when absent. Batch dependencies can
    /// only reference tasks whose ids the caller chose.
    pub id: Option<String>,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub estimated_hours: f64,
    pub priority: i32,
}

impl NewTask {
    /// Creates task attributes spanning `start ..= end`.
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: None,
            name: name.into(),
            start,
            end,
            estimated_hours: 0.0,
            priority: 0,
        }
    }

    /// Fixes the task id instead of minting one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the estimated hours.
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = hours;
        self
    }

    /// Sets the scheduling priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Attributes for a dependency edge to be created.
#[derive(Debug, Clone)]
pub struct NewDependency {
    pub from_task_id: String,
    pub to_task_id: String,
    pub kind: DependencyType,
    pub lag_days: i64,
}

impl NewDependency {
    /// Creates a finish-to-start edge with zero lag.
    pub fn new(from_task_id: impl Into<String>, to_task_id: impl Into<String>) -> Self {
        Self {
            from_task_id: from_task_id.into(),
            to_task_id: to_task_id.into(),
            kind: DependencyType::FinishToStart,
            lag_days: 0,
        }
    }

    /// Sets the relation kind.
    pub fn with_kind(mut self, kind: DependencyType) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the lag in days.
    pub fn with_lag(mut self, lag_days: i64) -> Self {
        self.lag_days = lag_days;
        self
    }
}

/// Partial update of a task. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub progress_percent: Option<f64>,
    pub state: Option<TaskState>,
}

impl TaskPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Patches the start date.
    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    /// Patches the end date.
    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    /// Patches the estimated hours.
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    /// Patches the completion percentage.
    pub fn with_progress(mut self, percent: f64) -> Self {
        self.progress_percent = Some(percent);
        self
    }

    /// Patches the lifecycle state. `Blocked` is engine-assigned and
    /// rejected here.
    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }
}

/// Result of a batch task creation.
#[derive(Debug, Clone)]
pub struct BatchCreated {
    /// Created tasks, with post-propagation dates.
    pub tasks: Vec<Task>,
    /// Created dependency edges.
    pub dependencies: Vec<Dependency>,
}

/// Orchestrates schedule mutations over a [`GraphStore`].
pub struct ScheduleService<S: GraphStore> {
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: GraphStore> ScheduleService<S> {
    /// Wraps a store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads a schedule's subgraph (read-only convenience).
    pub fn schedule(&self, schedule_id: &str) -> Result<ScheduleGraph> {
        self.store.load_schedule(schedule_id)
    }

    /// Creates a task under a work package and rolls up its ancestors.
    pub fn create_task(&self, work_package_id: &str, new: NewTask) -> Result<Task> {
        let schedule_id = self.store.find_schedule_of_work_package(work_package_id)?;
        let lock = self.schedule_lock(&schedule_id);
        let _guard = lock.lock();

        let mut graph = self.load_mutable(&schedule_id)?;
        let before = graph.clone();

        let task = self.build_task(&graph, work_package_id, new)?;
        graph.tasks.push(task.clone());
        rollup::recompute_ancestors(&mut graph, &[work_package_id.to_string()])?;

        self.persist(&before, &graph)?;
        info!(task = %task.id, work_package = work_package_id, "task created");
        Ok(task)
    }

    /// Creates many tasks plus their internal dependency edges in one
    /// transaction.
    ///
    /// The combined existing + new edge set must be acyclic. When
    /// `extend_work_package_end` is false, a new task reaching past the
    /// work package's current end date is rejected. Any failure rolls
    /// the whole batch back.
    pub fn create_tasks_batch(
        &self,
        work_package_id: &str,
        tasks: Vec<NewTask>,
        dependencies: Vec<NewDependency>,
        extend_work_package_end: bool,
    ) -> Result<BatchCreated> {
        let schedule_id = self.store.find_schedule_of_work_package(work_package_id)?;
        let lock = self.schedule_lock(&schedule_id);
        let _guard = lock.lock();

        let mut graph = self.load_mutable(&schedule_id)?;
        let before = graph.clone();

        if !extend_work_package_end {
            let wp = graph
                .work_package(work_package_id)
                .ok_or_else(|| {
                    ScheduleError::not_found(format!("work package '{work_package_id}'"))
                })?;
            if let Some(wp_end) = wp.end {
                if let Some(overrun) = tasks.iter().find(|t| t.end > wp_end) {
                    return Err(ScheduleError::validation(format!(
                        "task '{}' ends {} but work package '{}' ends {}",
                        overrun.name, overrun.end, work_package_id, wp_end
                    )));
                }
            }
        }

        let mut created_tasks = Vec::with_capacity(tasks.len());
        for new in tasks {
            let task = self.build_task(&graph, work_package_id, new)?;
            graph.tasks.push(task.clone());
            created_tasks.push(task);
        }

        let mut created_edges = Vec::with_capacity(dependencies.len());
        for new in dependencies {
            let edge = self.build_dependency(&graph, &schedule_id, new)?;
            graph.dependencies.push(edge.clone());
            created_edges.push(edge);
        }
        resolver::validate_acyclic(&graph.dependencies)?;

        // One forward pass per distinct predecessor makes the inserted
        // subgraph consistent at rest.
        let mut roots: Vec<String> = Vec::new();
        for edge in &created_edges {
            if !roots.contains(&edge.from_task_id) {
                roots.push(edge.from_task_id.clone());
            }
        }
        let mut touched = vec![work_package_id.to_string()];
        for root in roots {
            let outcome = propagator::propagate_from(&mut graph, &root)?;
            for wp_id in outcome.touched_work_packages() {
                if !touched.contains(&wp_id) {
                    touched.push(wp_id);
                }
            }
        }
        rollup::recompute_ancestors(&mut graph, &touched)?;

        self.persist(&before, &graph)?;
        // Hand back post-propagation records.
        for task in &mut created_tasks {
            if let Some(current) = graph.task(&task.id) {
                *task = current.clone();
            }
        }
        info!(
            work_package = work_package_id,
            tasks = created_tasks.len(),
            edges = created_edges.len(),
            "task batch created"
        );
        Ok(BatchCreated {
            tasks: created_tasks,
            dependencies: created_edges,
        })
    }

    /// Applies a partial update to a task. Date changes cascade through
    /// the dependency graph; the returned list holds every task whose
    /// dates or state changed, the edited task first.
    pub fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<Vec<Task>> {
        let schedule_id = self.store.find_schedule_of_task(task_id)?;
        let lock = self.schedule_lock(&schedule_id);
        let _guard = lock.lock();

        let mut graph = self.load_mutable(&schedule_id)?;
        let before = graph.clone();

        let current = graph
            .task(task_id)
            .cloned()
            .ok_or_else(|| ScheduleError::not_found(format!("task '{task_id}'")))?;

        let start = patch.start.unwrap_or(current.start);
        let end = patch.end.unwrap_or(current.end);
        validate_date_range(start, end)?;
        if let Some(hours) = patch.estimated_hours {
            validate_hours(hours)?;
        }
        if let Some(progress) = patch.progress_percent {
            validate_progress(progress)?;
        }
        if patch.state == Some(TaskState::Blocked) {
            return Err(ScheduleError::validation(
                "'blocked' is assigned by propagation, not by edits",
            ));
        }

        let dates_changed = start != current.start || end != current.end;
        {
            let task = graph
                .task_mut(task_id)
                .ok_or_else(|| ScheduleError::not_found(format!("task '{task_id}'")))?;
            task.start = start;
            task.end = end;
            if let Some(hours) = patch.estimated_hours {
                task.estimated_hours = hours;
            }
            if let Some(progress) = patch.progress_percent {
                task.progress_percent = progress;
            }
            if let Some(state) = patch.state {
                task.state = state;
            }
        }

        let mut touched = vec![current.work_package_id.clone()];
        if dates_changed {
            let outcome = propagator::propagate_from(&mut graph, task_id)?;
            for wp_id in outcome.touched_work_packages() {
                if !touched.contains(&wp_id) {
                    touched.push(wp_id);
                }
            }
        }
        rollup::recompute_ancestors(&mut graph, &touched)?;

        self.persist(&before, &graph)?;
        Ok(changed_tasks(&before, &graph, task_id))
    }

    /// Moves a task to new dates and cascades the change downstream.
    pub fn update_task_dates(
        &self,
        task_id: &str,
        new_start: NaiveDate,
        new_end: NaiveDate,
    ) -> Result<Vec<Task>> {
        self.update_task(
            task_id,
            TaskPatch::new().with_start(new_start).with_end(new_end),
        )
    }

    /// Adds a dependency edge. Rejected with the exact cycle path if it
    /// would close a loop; otherwise the new constraint is propagated
    /// so the graph is consistent at rest.
    pub fn create_dependency(&self, new: NewDependency) -> Result<Dependency> {
        let schedule_id = self.store.find_schedule_of_task(&new.from_task_id)?;
        let lock = self.schedule_lock(&schedule_id);
        let _guard = lock.lock();

        let mut graph = self.load_mutable(&schedule_id)?;
        let before = graph.clone();

        let edge = self.build_dependency(&graph, &schedule_id, new)?;
        graph.dependencies.push(edge.clone());
        resolver::validate_acyclic(&graph.dependencies)?;

        let outcome = propagator::propagate_from(&mut graph, &edge.from_task_id)?;
        let touched = outcome.touched_work_packages();
        if !touched.is_empty() {
            rollup::recompute_ancestors(&mut graph, &touched)?;
        }

        self.persist(&before, &graph)?;
        info!(edge = %edge.id, from = %edge.from_task_id, to = %edge.to_task_id, "dependency created");
        Ok(edge)
    }

    /// Removes a dependency edge. Removing a constraint never moves a
    /// task, but the successor's `Blocked` flag is re-evaluated against
    /// the remaining edges so it can recover.
    pub fn delete_dependency(&self, edge_id: &str) -> Result<()> {
        let schedule_id = self.store.find_schedule_of_dependency(edge_id)?;
        let lock = self.schedule_lock(&schedule_id);
        let _guard = lock.lock();

        let mut graph = self.load_mutable(&schedule_id)?;
        let before = graph.clone();

        let edge = graph
            .dependency(edge_id)
            .cloned()
            .ok_or_else(|| ScheduleError::not_found(format!("dependency '{edge_id}'")))?;
        graph.dependencies.retain(|d| d.id != edge_id);

        let outcome = propagator::propagate_from(&mut graph, &edge.to_task_id)?;
        let touched = outcome.touched_work_packages();
        if !touched.is_empty() {
            rollup::recompute_ancestors(&mut graph, &touched)?;
        }

        let mut batch = ChangeSet::new()
            .expecting(graph.schedule.id.clone(), graph.schedule.lock_version);
        batch.delete_dependency(edge_id);
        collect_changes(&before, &graph, &mut batch);
        self.store.apply(batch)?;
        info!(edge = edge_id, "dependency deleted");
        Ok(())
    }

    /// Translates a task by `delta_days` (either direction) and runs
    /// the same propagation/rollup pipeline as a date edit. Used for
    /// bulk "push the tail of the project back N days" operations.
    pub fn shift_dates(&self, root_task_id: &str, delta_days: i64) -> Result<Vec<Task>> {
        let schedule_id = self.store.find_schedule_of_task(root_task_id)?;
        let lock = self.schedule_lock(&schedule_id);
        let _guard = lock.lock();

        let mut graph = self.load_mutable(&schedule_id)?;
        let before = graph.clone();

        let work_package_id = {
            let task = graph
                .task_mut(root_task_id)
                .ok_or_else(|| ScheduleError::not_found(format!("task '{root_task_id}'")))?;
            task.shift(delta_days);
            task.work_package_id.clone()
        };

        let outcome = propagator::propagate_from(&mut graph, root_task_id)?;
        let mut touched = vec![work_package_id];
        for wp_id in outcome.touched_work_packages() {
            if !touched.contains(&wp_id) {
                touched.push(wp_id);
            }
        }
        rollup::recompute_ancestors(&mut graph, &touched)?;

        self.persist(&before, &graph)?;
        info!(root = root_task_id, delta_days, "dates shifted");
        Ok(changed_tasks(&before, &graph, root_task_id))
    }

    /// Reassigns `order` across a set of sibling phases or sibling work
    /// packages, by slice position. No date effect.
    pub fn reorder(&self, sibling_ids: &[String]) -> Result<()> {
        let Some(first) = sibling_ids.first() else {
            return Ok(());
        };
        let (schedule_id, is_phase) = match self.store.find_schedule_of_phase(first) {
            Ok(id) => (id, true),
            Err(ScheduleError::NotFound(_)) => {
                (self.store.find_schedule_of_work_package(first)?, false)
            }
            Err(e) => return Err(e),
        };
        let lock = self.schedule_lock(&schedule_id);
        let _guard = lock.lock();

        let mut graph = self.load_mutable(&schedule_id)?;
        let before = graph.clone();

        if is_phase {
            for (position, id) in sibling_ids.iter().enumerate() {
                let phase = graph
                    .phases
                    .iter_mut()
                    .find(|p| p.id == *id)
                    .ok_or_else(|| ScheduleError::not_found(format!("phase '{id}'")))?;
                phase.order = position as i32;
            }
        } else {
            let parent = graph
                .work_package(first)
                .map(|wp| wp.phase_id.clone())
                .ok_or_else(|| ScheduleError::not_found(format!("work package '{first}'")))?;
            for (position, id) in sibling_ids.iter().enumerate() {
                let wp = graph
                    .work_packages
                    .iter_mut()
                    .find(|w| w.id == *id)
                    .ok_or_else(|| ScheduleError::not_found(format!("work package '{id}'")))?;
                if wp.phase_id != parent {
                    return Err(ScheduleError::validation(format!(
                        "work package '{id}' is not a sibling of '{first}'"
                    )));
                }
                wp.order = position as i32;
            }
        }

        self.persist(&before, &graph)
    }

    /// Snapshots a live schedule into an immutable baseline attributed
    /// to `acting_user`.
    pub fn create_baseline(&self, schedule_id: &str, acting_user: &str) -> Result<Schedule> {
        let lock = self.schedule_lock(schedule_id);
        let _guard = lock.lock();

        let source = self.store.load_schedule(schedule_id)?;
        if source.schedule.is_baseline {
            return Err(ScheduleError::validation(format!(
                "schedule '{schedule_id}' is already a baseline"
            )));
        }
        baseline::create_baseline(&self.store, schedule_id, acting_user)
    }

    fn schedule_lock(&self, schedule_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(schedule_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load_mutable(&self, schedule_id: &str) -> Result<ScheduleGraph> {
        let graph = self.store.load_schedule(schedule_id)?;
        if !graph.schedule.is_mutable() {
            return Err(ScheduleError::LockedSchedule(schedule_id.to_string()));
        }
        Ok(graph)
    }

    fn build_task(
        &self,
        graph: &ScheduleGraph,
        work_package_id: &str,
        new: NewTask,
    ) -> Result<Task> {
        if graph.work_package(work_package_id).is_none() {
            return Err(ScheduleError::not_found(format!(
                "work package '{work_package_id}'"
            )));
        }
        validate_date_range(new.start, new.end)?;
        validate_hours(new.estimated_hours)?;
        let id = new.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if graph.task(&id).is_some() {
            return Err(ScheduleError::validation(format!(
                "task id '{id}' already exists"
            )));
        }
        Ok(Task::new(id, work_package_id, new.start, new.end)
            .with_name(new.name)
            .with_hours(new.estimated_hours)
            .with_priority(new.priority))
    }

    fn build_dependency(
        &self,
        graph: &ScheduleGraph,
        schedule_id: &str,
        new: NewDependency,
    ) -> Result<Dependency> {
        if new.from_task_id == new.to_task_id {
            return Err(ScheduleError::validation(format!(
                "task '{}' cannot depend on itself",
                new.from_task_id
            )));
        }
        for endpoint in [&new.from_task_id, &new.to_task_id] {
            if graph.task(endpoint).is_none() {
                // Either missing entirely or owned by another schedule.
                return Err(ScheduleError::not_found(format!(
                    "task '{endpoint}' in schedule '{schedule_id}'"
                )));
            }
        }
        let duplicate = graph.dependencies.iter().any(|d| {
            d.from_task_id == new.from_task_id
                && d.to_task_id == new.to_task_id
                && d.kind == new.kind
        });
        if duplicate {
            return Err(ScheduleError::validation(format!(
                "dependency {} -> {} ({:?}) already exists",
                new.from_task_id, new.to_task_id, new.kind
            )));
        }
        Ok(
            Dependency::new(
                Uuid::new_v4().to_string(),
                schedule_id,
                new.from_task_id,
                new.to_task_id,
            )
            .with_kind(new.kind)
            .with_lag(new.lag_days),
        )
    }

    fn persist(&self, before: &ScheduleGraph, after: &ScheduleGraph) -> Result<()> {
        let mut batch = ChangeSet::new()
            .expecting(after.schedule.id.clone(), after.schedule.lock_version);
        collect_changes(before, after, &mut batch);
        if batch.is_empty() {
            return Ok(());
        }
        self.store.apply(batch)
    }
}

/// Queues every record that differs from its loaded state.
fn collect_changes(before: &ScheduleGraph, after: &ScheduleGraph, batch: &mut ChangeSet) {
    for phase in &after.phases {
        match before.phase(&phase.id) {
            Some(prev) if prev == phase => {}
            _ => {
                batch.upsert_phase(phase.clone());
            }
        }
    }
    for wp in &after.work_packages {
        match before.work_package(&wp.id) {
            Some(prev) if prev == wp => {}
            _ => {
                batch.upsert_work_package(wp.clone());
            }
        }
    }
    for task in &after.tasks {
        match before.task(&task.id) {
            Some(prev) if prev == task => {}
            _ => {
                batch.upsert_task(task.clone());
            }
        }
    }
    for dep in &after.dependencies {
        match before.dependency(&dep.id) {
            Some(prev) if prev == dep => {}
            _ => {
                batch.upsert_dependency(dep.clone());
            }
        }
    }
}

/// Tasks whose dates or state changed, the edited task first.
fn changed_tasks(before: &ScheduleGraph, after: &ScheduleGraph, edited_id: &str) -> Vec<Task> {
    let mut changed = Vec::new();
    if let Some(task) = after.task(edited_id) {
        if before.task(edited_id) != Some(task) {
            changed.push(task.clone());
        }
    }
    for task in &after.tasks {
        if task.id == edited_id {
            continue;
        }
        match before.task(&task.id) {
            Some(prev) if prev == task => {}
            _ => changed.push(task.clone()),
        }
    }
    changed
}

fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(ScheduleError::validation(format!(
            "end date {end} precedes start date {start}"
        )));
    }
    Ok(())
}

fn validate_hours(hours: f64) -> Result<()> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(ScheduleError::validation(format!(
            "estimated hours must be a non-negative number, got {hours}"
        )));
    }
    Ok(())
}

fn validate_progress(percent: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(ScheduleError::validation(format!(
            "progress must be within 0..=100, got {percent}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Phase, ScheduleKind, WorkPackage};
    use crate::store::InMemoryGraphStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// One schedule, one phase, one work package, no tasks.
    fn service() -> ScheduleService<InMemoryGraphStore> {
        let store = InMemoryGraphStore::new();
        let mut batch = ChangeSet::new();
        batch.upsert_schedule(Schedule::new("S1", "P1", ScheduleKind::Execution));
        batch.upsert_phase(Phase::new("PH1", "S1").with_name("Execution").with_order(0));
        batch.upsert_work_package(
            WorkPackage::new("WP1", "PH1").with_name("Main package").with_order(0),
        );
        store.apply(batch).unwrap();
        ScheduleService::new(store)
    }

    fn add_task(
        svc: &ScheduleService<InMemoryGraphStore>,
        id: &str,
        start: NaiveDate,
        end: NaiveDate,
        hours: f64,
    ) -> Task {
        svc.create_task(
            "WP1",
            NewTask::new(id, start, end).with_id(id).with_hours(hours),
        )
        .unwrap()
    }

    #[test]
    fn test_create_task_rolls_up_ancestors() {
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 5), 10.0);
        add_task(&svc, "T2", d(2024, 1, 3), d(2024, 1, 12), 30.0);

        let graph = svc.schedule("S1").unwrap();
        let wp = graph.work_package("WP1").unwrap();
        assert_eq!(wp.estimated_hours, 40.0);
        assert_eq!(wp.start, Some(d(2024, 1, 1)));
        assert_eq!(wp.end, Some(d(2024, 1, 12)));
        let phase = graph.phase("PH1").unwrap();
        assert_eq!(phase.estimated_hours, 40.0);
        assert_eq!(phase.end, Some(d(2024, 1, 12)));
    }

    #[test]
    fn test_create_task_rejects_inverted_dates() {
        let svc = service();
        let result = svc.create_task("WP1", NewTask::new("bad", d(2024, 1, 5), d(2024, 1, 1)));
        assert!(matches!(result, Err(ScheduleError::Validation(_))));
    }

    #[test]
    fn test_fs_lag_cascade_preserves_duration() {
        // Scenario: X Jan 1–5, Y depends on X (FS, lag 2). Extending X
        // to Jan 10 pushes Y to Jan 12 with its duration intact.
        let svc = service();
        add_task(&svc, "X", d(2024, 1, 1), d(2024, 1, 5), 8.0);
        add_task(&svc, "Y", d(2024, 1, 8), d(2024, 1, 10), 8.0);
        svc.create_dependency(NewDependency::new("X", "Y").with_lag(2))
            .unwrap();

        let updated = svc
            .update_task_dates("X", d(2024, 1, 1), d(2024, 1, 10))
            .unwrap();

        let ids: Vec<&str> = updated.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["X", "Y"]);
        let y = updated.iter().find(|t| t.id == "Y").unwrap();
        assert!(y.start >= d(2024, 1, 12));
        assert_eq!(y.duration_days(), 2);
        assert_eq!(y.state, TaskState::Pending); // pushed, not blocked

        // Ancestors follow the cascade.
        let graph = svc.schedule("S1").unwrap();
        assert_eq!(graph.work_package("WP1").unwrap().end, Some(y.end));
    }

    #[test]
    fn test_hours_weighted_progress_rollup() {
        // Work package with 10 h at 50% and 30 h at 0% sits at 12.5%.
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 5), 10.0);
        add_task(&svc, "T2", d(2024, 1, 1), d(2024, 1, 9), 30.0);
        svc.update_task("T1", TaskPatch::new().with_progress(50.0))
            .unwrap();

        let graph = svc.schedule("S1").unwrap();
        assert_eq!(graph.work_package("WP1").unwrap().progress_percent, 12.5);
    }

    #[test]
    fn test_cycle_rejected_with_exact_path() {
        let svc = service();
        add_task(&svc, "A", d(2024, 1, 1), d(2024, 1, 5), 0.0);
        add_task(&svc, "B", d(2024, 1, 8), d(2024, 1, 10), 0.0);
        svc.create_dependency(NewDependency::new("A", "B")).unwrap();

        match svc.create_dependency(NewDependency::new("B", "A")) {
            Err(ScheduleError::CycleDetected { path }) => {
                assert_eq!(path, vec!["A", "B", "A"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        // The rejected edge left no trace.
        assert_eq!(svc.schedule("S1").unwrap().dependencies.len(), 1);
    }

    #[test]
    fn test_shift_moves_closure_and_spares_siblings() {
        // R feeds two chains of different length; U is unrelated.
        let svc = service();
        add_task(&svc, "R", d(2024, 1, 1), d(2024, 1, 5), 0.0);
        add_task(&svc, "C1", d(2024, 1, 5), d(2024, 1, 8), 0.0);
        add_task(&svc, "C2", d(2024, 1, 8), d(2024, 1, 14), 0.0);
        add_task(&svc, "D1", d(2024, 1, 5), d(2024, 1, 20), 0.0);
        add_task(&svc, "U", d(2024, 1, 1), d(2024, 1, 30), 0.0);
        svc.create_dependency(NewDependency::new("R", "C1")).unwrap();
        svc.create_dependency(NewDependency::new("C1", "C2")).unwrap();
        svc.create_dependency(NewDependency::new("R", "D1")).unwrap();

        let before = svc.schedule("S1").unwrap();
        let updated = svc.shift_dates("R", 5).unwrap();

        let after = svc.schedule("S1").unwrap();
        for id in ["R", "C1", "C2", "D1"] {
            let prev = before.task(id).unwrap();
            let next = after.task(id).unwrap();
            assert!(
                (next.start - prev.start).num_days() >= 5,
                "task {id} moved less than 5 days"
            );
            assert_eq!(next.duration_days(), prev.duration_days());
            assert_ne!(next.state, TaskState::Blocked, "task {id} wrongly blocked");
        }
        assert_eq!(after.task("U").unwrap(), before.task("U").unwrap());
        assert!(updated.iter().all(|t| t.id != "U"));
    }

    #[test]
    fn test_baseline_is_locked_and_live_keeps_mutating() {
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 5), 16.0);
        let baseline = svc.create_baseline("S1", "ana").unwrap();

        // Scenario E: editing inside the baseline is rejected without
        // touching any record.
        let copy = svc.schedule(&baseline.id).unwrap();
        let frozen = &copy.tasks[0];
        let result = svc.update_task_dates(&frozen.id, d(2024, 2, 1), d(2024, 2, 5));
        assert!(matches!(result, Err(ScheduleError::LockedSchedule(_))));
        assert_eq!(svc.schedule(&baseline.id).unwrap(), copy);

        // The live schedule is unaffected by the snapshot's lock.
        svc.update_task_dates("T1", d(2024, 3, 1), d(2024, 3, 5))
            .unwrap();
        let copy_after = svc.schedule(&baseline.id).unwrap();
        assert_eq!(copy_after.tasks[0].start, d(2024, 1, 1));
    }

    #[test]
    fn test_batch_creates_tasks_and_edges_atomically() {
        let svc = service();
        let created = svc
            .create_tasks_batch(
                "WP1",
                vec![
                    NewTask::new("Dig", d(2024, 1, 1), d(2024, 1, 5))
                        .with_id("T1")
                        .with_hours(10.0),
                    NewTask::new("Pour", d(2024, 1, 2), d(2024, 1, 4))
                        .with_id("T2")
                        .with_hours(20.0),
                ],
                vec![NewDependency::new("T1", "T2").with_lag(1)],
                true,
            )
            .unwrap();

        assert_eq!(created.tasks.len(), 2);
        assert_eq!(created.dependencies.len(), 1);
        // The internal edge was enforced on insert: T2 starts after
        // T1's finish plus one day of lag, duration preserved.
        let t2 = created.tasks.iter().find(|t| t.id == "T2").unwrap();
        assert_eq!(t2.start, d(2024, 1, 6));
        assert_eq!(t2.duration_days(), 2);
    }

    #[test]
    fn test_batch_with_cycle_rolls_back_entirely() {
        let svc = service();
        add_task(&svc, "E1", d(2024, 1, 1), d(2024, 1, 5), 4.0);
        let result = svc.create_tasks_batch(
            "WP1",
            vec![
                NewTask::new("N1", d(2024, 1, 6), d(2024, 1, 8)).with_id("N1"),
                NewTask::new("N2", d(2024, 1, 9), d(2024, 1, 10)).with_id("N2"),
            ],
            vec![
                NewDependency::new("N1", "N2"),
                NewDependency::new("N2", "N1"),
            ],
            true,
        );
        assert!(matches!(result, Err(ScheduleError::CycleDetected { .. })));

        let graph = svc.schedule("S1").unwrap();
        assert!(graph.task("N1").is_none());
        assert!(graph.task("N2").is_none());
        assert!(graph.dependencies.is_empty());
    }

    #[test]
    fn test_batch_respects_work_package_end_fence() {
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 10), 4.0);

        let result = svc.create_tasks_batch(
            "WP1",
            vec![NewTask::new("Late", d(2024, 1, 5), d(2024, 2, 1))],
            vec![],
            false,
        );
        assert!(matches!(result, Err(ScheduleError::Validation(_))));

        // With the extension allowed the same batch goes through and
        // the work package hull follows.
        svc.create_tasks_batch(
            "WP1",
            vec![NewTask::new("Late", d(2024, 1, 5), d(2024, 2, 1))],
            vec![],
            true,
        )
        .unwrap();
        let graph = svc.schedule("S1").unwrap();
        assert_eq!(graph.work_package("WP1").unwrap().end, Some(d(2024, 2, 1)));
    }

    #[test]
    fn test_delete_dependency_keeps_dates_and_recovers_blocked() {
        let svc = service();
        add_task(&svc, "A", d(2024, 1, 1), d(2024, 1, 10), 0.0);
        add_task(&svc, "B", d(2024, 1, 1), d(2024, 1, 5), 0.0);
        add_task(&svc, "C", d(2024, 1, 1), d(2024, 1, 3), 0.0);
        svc.create_dependency(NewDependency::new("A", "C")).unwrap();
        let conflicting = svc
            .create_dependency(
                NewDependency::new("B", "C").with_kind(DependencyType::FinishToFinish),
            )
            .unwrap();
        // Pushing A's finish far out while B pins C's end much earlier
        // forces the inversion.
        svc.update_task_dates("A", d(2024, 1, 1), d(2024, 1, 20))
            .unwrap();
        let blocked = svc.schedule("S1").unwrap().task("C").unwrap().clone();
        assert_eq!(blocked.state, TaskState::Blocked);

        svc.delete_dependency(&conflicting.id).unwrap();
        let graph = svc.schedule("S1").unwrap();
        let c = graph.task("C").unwrap();
        assert_eq!(c.state, TaskState::Pending);
        // Removing a constraint never moves a task.
        assert_eq!(c.start, blocked.start);
        assert_eq!(c.end, blocked.end);
        assert!(graph.dependency(&conflicting.id).is_none());
    }

    #[test]
    fn test_reorder_updates_sibling_positions_only() {
        let svc = service();
        let store = svc.store();
        let mut batch = ChangeSet::new();
        batch.upsert_work_package(WorkPackage::new("WP2", "PH1").with_order(1));
        batch.upsert_work_package(WorkPackage::new("WP3", "PH1").with_order(2));
        store.apply(batch).unwrap();

        svc.reorder(&["WP3".into(), "WP1".into(), "WP2".into()])
            .unwrap();

        let graph = svc.schedule("S1").unwrap();
        assert_eq!(graph.work_package("WP3").unwrap().order, 0);
        assert_eq!(graph.work_package("WP1").unwrap().order, 1);
        assert_eq!(graph.work_package("WP2").unwrap().order, 2);
    }

    #[test]
    fn test_reorder_rejects_mixed_parents() {
        let svc = service();
        let store = svc.store();
        let mut batch = ChangeSet::new();
        batch.upsert_phase(Phase::new("PH2", "S1").with_order(1));
        batch.upsert_work_package(WorkPackage::new("WP2", "PH2"));
        store.apply(batch).unwrap();

        let result = svc.reorder(&["WP1".into(), "WP2".into()]);
        assert!(matches!(result, Err(ScheduleError::Validation(_))));
    }

    #[test]
    fn test_manual_block_state_is_rejected() {
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 5), 0.0);
        let result = svc.update_task("T1", TaskPatch::new().with_state(TaskState::Blocked));
        assert!(matches!(result, Err(ScheduleError::Validation(_))));
    }

    #[test]
    fn test_state_walkthrough_pending_to_done() {
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 5), 8.0);
        svc.update_task(
            "T1",
            TaskPatch::new()
                .with_state(TaskState::InProgress)
                .with_progress(40.0),
        )
        .unwrap();
        svc.update_task(
            "T1",
            TaskPatch::new().with_state(TaskState::Done).with_progress(100.0),
        )
        .unwrap();

        let graph = svc.schedule("S1").unwrap();
        let t1 = graph.task("T1").unwrap();
        assert_eq!(t1.state, TaskState::Done);
        assert_eq!(graph.work_package("WP1").unwrap().progress_percent, 100.0);
    }

    #[test]
    fn test_update_rejects_out_of_range_progress() {
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 5), 8.0);
        assert!(matches!(
            svc.update_task("T1", TaskPatch::new().with_progress(150.0)),
            Err(ScheduleError::Validation(_))
        ));
        assert!(matches!(
            svc.update_task("T1", TaskPatch::new().with_progress(-1.0)),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn test_noop_patch_returns_no_tasks() {
        let svc = service();
        add_task(&svc, "T1", d(2024, 1, 1), d(2024, 1, 5), 8.0);
        let updated = svc
            .update_task_dates("T1", d(2024, 1, 1), d(2024, 1, 5))
            .unwrap();
        assert!(updated.is_empty());
    }

    #[test]
    fn test_unknown_work_package_is_not_found() {
        let svc = service();
        assert!(matches!(
            svc.create_task("ghost", NewTask::new("T", d(2024, 1, 1), d(2024, 1, 2))),
            Err(ScheduleError::NotFound(_))
        ));
    }
}
