//! Persistence seam for schedule subgraphs.
//!
//! The engine never talks to a database directly: it loads a
//! [`ScheduleGraph`] through the [`GraphStore`] trait, mutates it in
//! memory, and hands the affected records back as one [`ChangeSet`]
//! that the store applies as a single all-or-nothing batch.
//!
//! [`InMemoryGraphStore`] is the reference implementation; the
//! embedding application supplies a database-backed one.

mod memory;

pub use memory::InMemoryGraphStore;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Dependency, Phase, Schedule, ScheduleKind, Task, WorkPackage};

/// A schedule's full materialized subgraph.
///
/// Loaded deterministically ordered: phases and work packages by
/// `order` (then id), tasks by `(start, id)`, dependencies by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleGraph {
    pub schedule: Schedule,
    pub phases: Vec<Phase>,
    pub work_packages: Vec<WorkPackage>,
    pub tasks: Vec<Task>,
    pub dependencies: Vec<Dependency>,
}

impl ScheduleGraph {
    /// Creates an empty graph for a schedule record.
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            phases: Vec::new(),
            work_packages: Vec::new(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Finds a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Finds a task by id, mutably.
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Finds a work package by id.
    pub fn work_package(&self, id: &str) -> Option<&WorkPackage> {
        self.work_packages.iter().find(|wp| wp.id == id)
    }

    /// Finds a phase by id.
    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Finds a dependency edge by id.
    pub fn dependency(&self, id: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.id == id)
    }

    /// All edges whose successor is `task_id`.
    pub fn incoming<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.dependencies.iter().filter(move |d| d.to_task_id == task_id)
    }

    /// All edges whose predecessor is `task_id`.
    pub fn outgoing<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.dependencies.iter().filter(move |d| d.from_task_id == task_id)
    }

    /// All tasks belonging to a work package.
    pub fn tasks_of<'a>(&'a self, work_package_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |t| t.work_package_id == work_package_id)
    }

    /// All work packages belonging to a phase.
    pub fn work_packages_of<'a>(
        &'a self,
        phase_id: &'a str,
    ) -> impl Iterator<Item = &'a WorkPackage> + 'a {
        self.work_packages
            .iter()
            .filter(move |wp| wp.phase_id == phase_id)
    }
}

/// A batch of record upserts and deletes, applied atomically.
///
/// When `expected_lock_version` is set, the store rejects the batch
/// with [`crate::ScheduleError::ConcurrentModification`] unless the
/// schedule's stored `lock_version` still matches, and bumps the
/// counter on commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Optimistic-lock expectation: (schedule id, lock_version read).
    pub expected_lock_version: Option<(String, i64)>,
    pub schedules: Vec<Schedule>,
    pub phases: Vec<Phase>,
    pub work_packages: Vec<WorkPackage>,
    pub tasks: Vec<Task>,
    pub dependencies: Vec<Dependency>,
    pub deleted_dependencies: Vec<String>,
}

impl ChangeSet {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the optimistic-lock expectation for a schedule.
    pub fn expecting(mut self, schedule_id: impl Into<String>, lock_version: i64) -> Self {
        self.expected_lock_version = Some((schedule_id.into(), lock_version));
        self
    }

    /// Queues a schedule upsert.
    pub fn upsert_schedule(&mut self, schedule: Schedule) -> &mut Self {
        self.schedules.push(schedule);
        self
    }

    /// Queues a phase upsert.
    pub fn upsert_phase(&mut self, phase: Phase) -> &mut Self {
        self.phases.push(phase);
        self
    }

    /// Queues a work package upsert.
    pub fn upsert_work_package(&mut self, wp: WorkPackage) -> &mut Self {
        self.work_packages.push(wp);
        self
    }

    /// Queues a task upsert.
    pub fn upsert_task(&mut self, task: Task) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// Queues a dependency upsert.
    pub fn upsert_dependency(&mut self, dep: Dependency) -> &mut Self {
        self.dependencies.push(dep);
        self
    }

    /// Queues a dependency deletion.
    pub fn delete_dependency(&mut self, edge_id: impl Into<String>) -> &mut Self {
        self.deleted_dependencies.push(edge_id.into());
        self
    }

    /// Whether the batch carries no writes.
    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
            && self.phases.is_empty()
            && self.work_packages.is_empty()
            && self.tasks.is_empty()
            && self.dependencies.is_empty()
            && self.deleted_dependencies.is_empty()
    }
}

/// Transactional access to the persisted schedule graph.
///
/// Implementations must make [`GraphStore::apply`] all-or-nothing: if
/// any record in the batch fails validation, nothing is persisted.
pub trait GraphStore: Send + Sync {
    /// Loads a schedule's full subgraph by schedule id.
    fn load_schedule(&self, schedule_id: &str) -> Result<ScheduleGraph>;

    /// Resolves the schedule owning a task.
    fn find_schedule_of_task(&self, task_id: &str) -> Result<String>;

    /// Resolves the schedule owning a work package.
    fn find_schedule_of_work_package(&self, work_package_id: &str) -> Result<String>;

    /// Resolves the schedule owning a phase.
    fn find_schedule_of_phase(&self, phase_id: &str) -> Result<String>;

    /// Resolves the schedule owning a dependency edge.
    fn find_schedule_of_dependency(&self, edge_id: &str) -> Result<String>;

    /// Highest baseline version recorded for a project and kind.
    fn latest_baseline_version(&self, project_id: &str, kind: ScheduleKind)
        -> Result<Option<i32>>;

    /// Applies a batch of upserts/deletes as one atomic transaction.
    fn apply(&self, batch: ChangeSet) -> Result<()>;
}
