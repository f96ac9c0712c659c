//! Baseline snapshots.
//!
//! A baseline is a deep copy of a live schedule's entire subgraph,
//! persisted under fresh ids as a locked `is_baseline` schedule with
//! the next version number. Baselines are never mutated afterwards;
//! they exist for plan-vs-actual comparison.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::error::{Result, ScheduleError};
use crate::models::Schedule;
use crate::store::{ChangeSet, GraphStore};

/// Snapshots `schedule_id` into a new immutable baseline attributed to
/// `acting_user`. Returns the created baseline schedule record.
///
/// Fails with [`ScheduleError::Internal`] if the source graph holds a
/// cycle (unreachable when the engine's invariants held on every
/// write), and with [`ScheduleError::ConcurrentModification`] if
/// another writer claimed the same version first; the caller retries
/// with a fresh version read.
pub fn create_baseline<S: GraphStore + ?Sized>(
    store: &S,
    schedule_id: &str,
    acting_user: &str,
) -> Result<Schedule> {
    let graph = store.load_schedule(schedule_id)?;

    if let Err(ScheduleError::CycleDetected { path }) =
        crate::resolver::validate_acyclic(&graph.dependencies)
    {
        return Err(ScheduleError::internal(format!(
            "schedule '{schedule_id}' holds a dependency cycle: {}",
            path.join(" -> ")
        )));
    }

    let version = store
        .latest_baseline_version(&graph.schedule.project_id, graph.schedule.kind)?
        .unwrap_or(0)
        + 1;

    let mut baseline = Schedule::new(
        Uuid::new_v4().to_string(),
        graph.schedule.project_id.clone(),
        graph.schedule.kind,
    )
    .with_created_by(acting_user)
    .with_locked(true);
    baseline.is_baseline = true;
    baseline.version = version;

    let mut batch = ChangeSet::new();
    batch.upsert_schedule(baseline.clone());

    let mut phase_ids: HashMap<String, String> = HashMap::new();
    for phase in &graph.phases {
        let mut copy = phase.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.schedule_id = baseline.id.clone();
        phase_ids.insert(phase.id.clone(), copy.id.clone());
        batch.upsert_phase(copy);
    }

    let mut wp_ids: HashMap<String, String> = HashMap::new();
    for wp in &graph.work_packages {
        let mut copy = wp.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.phase_id = phase_ids
            .get(&wp.phase_id)
            .cloned()
            .ok_or_else(|| {
                ScheduleError::internal(format!(
                    "work package '{}' references phase '{}' outside the schedule",
                    wp.id, wp.phase_id
                ))
            })?;
        wp_ids.insert(wp.id.clone(), copy.id.clone());
        batch.upsert_work_package(copy);
    }

    let mut task_ids: HashMap<String, String> = HashMap::new();
    for task in &graph.tasks {
        let mut copy = task.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.work_package_id = wp_ids
            .get(&task.work_package_id)
            .cloned()
            .ok_or_else(|| {
                ScheduleError::internal(format!(
                    "task '{}' references work package '{}' outside the schedule",
                    task.id, task.work_package_id
                ))
            })?;
        task_ids.insert(task.id.clone(), copy.id.clone());
        batch.upsert_task(copy);
    }

    for dep in &graph.dependencies {
        let mut copy = dep.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.schedule_id = baseline.id.clone();
        copy.from_task_id = task_ids
            .get(&dep.from_task_id)
            .cloned()
            .ok_or_else(|| {
                ScheduleError::internal(format!(
                    "dependency '{}' references task '{}' outside the schedule",
                    dep.id, dep.from_task_id
                ))
            })?;
        copy.to_task_id = task_ids
            .get(&dep.to_task_id)
            .cloned()
            .ok_or_else(|| {
                ScheduleError::internal(format!(
                    "dependency '{}' references task '{}' outside the schedule",
                    dep.id, dep.to_task_id
                ))
            })?;
        batch.upsert_dependency(copy);
    }

    store.apply(batch)?;
    info!(
        source = schedule_id,
        baseline = %baseline.id,
        version,
        user = acting_user,
        "baseline created"
    );
    Ok(baseline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, Phase, ScheduleKind, Task, WorkPackage};
    use crate::store::InMemoryGraphStore;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded_store() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        let mut batch = ChangeSet::new();
        batch.upsert_schedule(Schedule::new("S1", "P1", ScheduleKind::Execution));
        batch.upsert_phase(Phase::new("PH1", "S1").with_name("Build").with_order(1));
        batch.upsert_work_package(WorkPackage::new("WP1", "PH1").with_name("Foundations"));
        batch.upsert_task(
            Task::new("T1", "WP1", d(2024, 1, 1), d(2024, 1, 5))
                .with_name("Dig")
                .with_hours(24.0)
                .with_progress(50.0),
        );
        batch.upsert_task(
            Task::new("T2", "WP1", d(2024, 1, 8), d(2024, 1, 12)).with_name("Pour"),
        );
        batch.upsert_dependency(Dependency::new("D1", "S1", "T1", "T2").with_lag(2));
        store.apply(batch).unwrap();
        store
    }

    #[test]
    fn test_baseline_reproduces_structure_and_values() {
        let store = seeded_store();
        let baseline = create_baseline(&store, "S1", "ana").unwrap();

        assert!(baseline.is_baseline);
        assert!(baseline.locked);
        assert_eq!(baseline.version, 1);
        assert_eq!(baseline.created_by, "ana");

        let copy = store.load_schedule(&baseline.id).unwrap();
        assert_eq!(copy.phases.len(), 1);
        assert_eq!(copy.work_packages.len(), 1);
        assert_eq!(copy.tasks.len(), 2);
        assert_eq!(copy.dependencies.len(), 1);

        let dig = copy.tasks.iter().find(|t| t.name == "Dig").unwrap();
        assert_eq!(dig.start, d(2024, 1, 1));
        assert_eq!(dig.estimated_hours, 24.0);
        assert_eq!(dig.progress_percent, 50.0);
        // Fresh ids throughout, edge endpoints remapped onto the copies.
        assert_ne!(dig.id, "T1");
        let edge = &copy.dependencies[0];
        assert_eq!(edge.from_task_id, dig.id);
        assert_eq!(edge.lag_days, 2);
    }

    #[test]
    fn test_baseline_is_isolated_from_live_edits() {
        let store = seeded_store();
        let baseline = create_baseline(&store, "S1", "ana").unwrap();

        let mut live = store.load_schedule("S1").unwrap();
        let t1 = live.task_mut("T1").unwrap();
        t1.shift(30);
        let moved = t1.clone();
        let mut batch = ChangeSet::new();
        batch.upsert_task(moved);
        store.apply(batch).unwrap();

        let copy = store.load_schedule(&baseline.id).unwrap();
        let dig = copy.tasks.iter().find(|t| t.name == "Dig").unwrap();
        assert_eq!(dig.start, d(2024, 1, 1));
    }

    #[test]
    fn test_versions_increment() {
        let store = seeded_store();
        assert_eq!(create_baseline(&store, "S1", "ana").unwrap().version, 1);
        assert_eq!(create_baseline(&store, "S1", "ana").unwrap().version, 2);
        assert_eq!(
            store
                .latest_baseline_version("P1", ScheduleKind::Execution)
                .unwrap(),
            Some(2)
        );
    }

    #[test]
    fn test_cyclic_source_is_internal_error() {
        let store = seeded_store();
        // The store does not police acyclicity (the service does), so a
        // corrupt edge pair can be injected directly for this test.
        let mut batch = ChangeSet::new();
        batch.upsert_dependency(Dependency::new("D2", "S1", "T2", "T1"));
        store.apply(batch).unwrap();

        assert!(matches!(
            create_baseline(&store, "S1", "ana"),
            Err(ScheduleError::Internal(_))
        ));
    }
}
