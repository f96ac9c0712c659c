//! In-memory [`GraphStore`] implementation.
//!
//! Reference implementation and test double. Batches are validated
//! against the merged view (stored records plus the batch itself)
//! before anything is written, so a failing batch leaves the store
//! untouched.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ChangeSet, GraphStore, ScheduleGraph};
use crate::error::{Result, ScheduleError};
use crate::models::{Dependency, Phase, Schedule, ScheduleKind, Task, WorkPackage};

#[derive(Default)]
struct Inner {
    schedules: HashMap<String, Schedule>,
    phases: HashMap<String, Phase>,
    work_packages: HashMap<String, WorkPackage>,
    tasks: HashMap<String, Task>,
    dependencies: HashMap<String, Dependency>,
}

/// Index over a batch's records, for merged-view lookups.
struct BatchIndex<'a> {
    schedules: HashMap<&'a str, &'a Schedule>,
    phases: HashMap<&'a str, &'a Phase>,
    work_packages: HashMap<&'a str, &'a WorkPackage>,
    tasks: HashMap<&'a str, &'a Task>,
}

impl<'a> BatchIndex<'a> {
    fn new(batch: &'a ChangeSet) -> Self {
        Self {
            schedules: batch.schedules.iter().map(|s| (s.id.as_str(), s)).collect(),
            phases: batch.phases.iter().map(|p| (p.id.as_str(), p)).collect(),
            work_packages: batch
                .work_packages
                .iter()
                .map(|wp| (wp.id.as_str(), wp))
                .collect(),
            tasks: batch.tasks.iter().map(|t| (t.id.as_str(), t)).collect(),
        }
    }
}

impl Inner {
    fn merged_schedule<'a>(&'a self, idx: &BatchIndex<'a>, id: &str) -> Option<&'a Schedule> {
        idx.schedules.get(id).copied().or_else(|| self.schedules.get(id))
    }

    fn merged_phase<'a>(&'a self, idx: &BatchIndex<'a>, id: &str) -> Option<&'a Phase> {
        idx.phases.get(id).copied().or_else(|| self.phases.get(id))
    }

    fn merged_work_package<'a>(
        &'a self,
        idx: &BatchIndex<'a>,
        id: &str,
    ) -> Option<&'a WorkPackage> {
        idx.work_packages
            .get(id)
            .copied()
            .or_else(|| self.work_packages.get(id))
    }

    fn merged_task<'a>(&'a self, idx: &BatchIndex<'a>, id: &str) -> Option<&'a Task> {
        idx.tasks.get(id).copied().or_else(|| self.tasks.get(id))
    }

    /// Walks task → work package → phase to the owning schedule id,
    /// through the merged view.
    fn schedule_of_task(&self, idx: &BatchIndex<'_>, task_id: &str) -> Option<String> {
        let task = self.merged_task(idx, task_id)?;
        let wp = self.merged_work_package(idx, &task.work_package_id)?;
        let phase = self.merged_phase(idx, &wp.phase_id)?;
        Some(phase.schedule_id.clone())
    }

    /// The stored schedule a stored record belongs to, if any.
    fn stored_schedule_of_phase(&self, phase_id: &str) -> Option<&Schedule> {
        let phase = self.phases.get(phase_id)?;
        self.schedules.get(&phase.schedule_id)
    }

    fn stored_schedule_of_work_package(&self, wp_id: &str) -> Option<&Schedule> {
        let wp = self.work_packages.get(wp_id)?;
        self.stored_schedule_of_phase(&wp.phase_id)
    }

    fn stored_schedule_of_task(&self, task_id: &str) -> Option<&Schedule> {
        let task = self.tasks.get(task_id)?;
        self.stored_schedule_of_work_package(&task.work_package_id)
    }

    /// Rejects a write to a record already persisted under a baseline.
    fn guard_baseline(&self, owner: Option<&Schedule>) -> Result<()> {
        if let Some(s) = owner {
            if s.is_baseline {
                return Err(ScheduleError::LockedSchedule(s.id.clone()));
            }
        }
        Ok(())
    }

    fn validate(&self, batch: &ChangeSet) -> Result<()> {
        let idx = BatchIndex::new(batch);

        if let Some((schedule_id, expected)) = &batch.expected_lock_version {
            let stored = self
                .schedules
                .get(schedule_id)
                .ok_or_else(|| ScheduleError::not_found(format!("schedule '{schedule_id}'")))?;
            if stored.lock_version != *expected {
                return Err(ScheduleError::ConcurrentModification {
                    schedule_id: schedule_id.clone(),
                    expected: *expected,
                    found: stored.lock_version,
                });
            }
        }

        let mut baseline_keys: Vec<(String, ScheduleKind, i32)> = Vec::new();
        for s in &batch.schedules {
            if let Some(existing) = self.schedules.get(&s.id) {
                if existing.is_baseline {
                    return Err(ScheduleError::LockedSchedule(s.id.clone()));
                }
            } else if s.is_baseline {
                let key = (s.project_id.clone(), s.kind, s.version);
                let collision = baseline_keys.contains(&key)
                    || self.schedules.values().any(|other| {
                        other.is_baseline
                            && other.project_id == s.project_id
                            && other.kind == s.kind
                            && other.version == s.version
                    });
                if collision {
                    return Err(ScheduleError::ConcurrentModification {
                        schedule_id: s.id.clone(),
                        expected: i64::from(s.version),
                        found: i64::from(s.version),
                    });
                }
                baseline_keys.push(key);
            }
        }

        for p in &batch.phases {
            if self.phases.contains_key(&p.id) {
                self.guard_baseline(self.stored_schedule_of_phase(&p.id))?;
            }
            if self.merged_schedule(&idx, &p.schedule_id).is_none() {
                return Err(ScheduleError::not_found(format!(
                    "schedule '{}' for phase '{}'",
                    p.schedule_id, p.id
                )));
            }
        }

        for wp in &batch.work_packages {
            if self.work_packages.contains_key(&wp.id) {
                self.guard_baseline(self.stored_schedule_of_work_package(&wp.id))?;
            }
            if self.merged_phase(&idx, &wp.phase_id).is_none() {
                return Err(ScheduleError::not_found(format!(
                    "phase '{}' for work package '{}'",
                    wp.phase_id, wp.id
                )));
            }
        }

        for t in &batch.tasks {
            if self.tasks.contains_key(&t.id) {
                self.guard_baseline(self.stored_schedule_of_task(&t.id))?;
            }
            if self.merged_work_package(&idx, &t.work_package_id).is_none() {
                return Err(ScheduleError::not_found(format!(
                    "work package '{}' for task '{}'",
                    t.work_package_id, t.id
                )));
            }
        }

        for dep in &batch.dependencies {
            if let Some(existing) = self.dependencies.get(&dep.id) {
                self.guard_baseline(
                    self.stored_schedule_of_task(&existing.from_task_id),
                )?;
            }
            if dep.from_task_id == dep.to_task_id {
                return Err(ScheduleError::validation(format!(
                    "dependency '{}' links task '{}' to itself",
                    dep.id, dep.from_task_id
                )));
            }
            for endpoint in [&dep.from_task_id, &dep.to_task_id] {
                match self.schedule_of_task(&idx, endpoint) {
                    None => {
                        return Err(ScheduleError::not_found(format!(
                            "task '{endpoint}' for dependency '{}'",
                            dep.id
                        )));
                    }
                    Some(schedule_id) if schedule_id != dep.schedule_id => {
                        return Err(ScheduleError::validation(format!(
                            "dependency '{}' crosses schedules ('{}' vs '{}')",
                            dep.id, dep.schedule_id, schedule_id
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        for edge_id in &batch.deleted_dependencies {
            let edge = self
                .dependencies
                .get(edge_id)
                .ok_or_else(|| ScheduleError::not_found(format!("dependency '{edge_id}'")))?;
            self.guard_baseline(self.stored_schedule_of_task(&edge.from_task_id))?;
        }

        Ok(())
    }

    fn commit(&mut self, batch: ChangeSet) {
        let bump = batch.expected_lock_version.clone();
        for s in batch.schedules {
            self.schedules.insert(s.id.clone(), s);
        }
        for p in batch.phases {
            self.phases.insert(p.id.clone(), p);
        }
        for wp in batch.work_packages {
            self.work_packages.insert(wp.id.clone(), wp);
        }
        for t in batch.tasks {
            self.tasks.insert(t.id.clone(), t);
        }
        for dep in batch.dependencies {
            self.dependencies.insert(dep.id.clone(), dep);
        }
        for edge_id in batch.deleted_dependencies {
            self.dependencies.remove(&edge_id);
        }
        if let Some((schedule_id, _)) = bump {
            if let Some(s) = self.schedules.get_mut(&schedule_id) {
                s.lock_version += 1;
            }
        }
    }
}

/// Thread-safe in-memory graph store.
#[derive(Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<Inner>,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn load_schedule(&self, schedule_id: &str) -> Result<ScheduleGraph> {
        let inner = self.inner.read();
        let schedule = inner
            .schedules
            .get(schedule_id)
            .cloned()
            .ok_or_else(|| ScheduleError::not_found(format!("schedule '{schedule_id}'")))?;

        let mut phases: Vec<Phase> = inner
            .phases
            .values()
            .filter(|p| p.schedule_id == schedule_id)
            .cloned()
            .collect();
        phases.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

        let phase_ids: Vec<&str> = phases.iter().map(|p| p.id.as_str()).collect();
        let mut work_packages: Vec<WorkPackage> = inner
            .work_packages
            .values()
            .filter(|wp| phase_ids.contains(&wp.phase_id.as_str()))
            .cloned()
            .collect();
        work_packages.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

        let wp_ids: Vec<&str> = work_packages.iter().map(|wp| wp.id.as_str()).collect();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| wp_ids.contains(&t.work_package_id.as_str()))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        let mut dependencies: Vec<Dependency> = inner
            .dependencies
            .values()
            .filter(|d| d.schedule_id == schedule_id)
            .cloned()
            .collect();
        dependencies.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(ScheduleGraph {
            schedule,
            phases,
            work_packages,
            tasks,
            dependencies,
        })
    }

    fn find_schedule_of_task(&self, task_id: &str) -> Result<String> {
        let inner = self.inner.read();
        inner
            .stored_schedule_of_task(task_id)
            .map(|s| s.id.clone())
            .ok_or_else(|| ScheduleError::not_found(format!("task '{task_id}'")))
    }

    fn find_schedule_of_work_package(&self, work_package_id: &str) -> Result<String> {
        let inner = self.inner.read();
        inner
            .stored_schedule_of_work_package(work_package_id)
            .map(|s| s.id.clone())
            .ok_or_else(|| {
                ScheduleError::not_found(format!("work package '{work_package_id}'"))
            })
    }

    fn find_schedule_of_phase(&self, phase_id: &str) -> Result<String> {
        let inner = self.inner.read();
        inner
            .phases
            .get(phase_id)
            .map(|p| p.schedule_id.clone())
            .ok_or_else(|| ScheduleError::not_found(format!("phase '{phase_id}'")))
    }

    fn find_schedule_of_dependency(&self, edge_id: &str) -> Result<String> {
        let inner = self.inner.read();
        inner
            .dependencies
            .get(edge_id)
            .map(|d| d.schedule_id.clone())
            .ok_or_else(|| ScheduleError::not_found(format!("dependency '{edge_id}'")))
    }

    fn latest_baseline_version(
        &self,
        project_id: &str,
        kind: ScheduleKind,
    ) -> Result<Option<i32>> {
        let inner = self.inner.read();
        Ok(inner
            .schedules
            .values()
            .filter(|s| s.is_baseline && s.project_id == project_id && s.kind == kind)
            .map(|s| s.version)
            .max())
    }

    fn apply(&self, batch: ChangeSet) -> Result<()> {
        let mut inner = self.inner.write();
        inner.validate(&batch)?;
        inner.commit(batch);
        Ok(())
    }
}
