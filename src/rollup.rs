//! Hierarchical rollup of effort, dates, and progress.
//!
//! Aggregates flow strictly one direction: task → work package →
//! phase, recomputed explicitly after each leaf mutation. Aggregate
//! fields are never edited directly and never computed lazily, so the
//! cost of an update is bounded by the number of touched ancestors.
//!
//! Recomputation is idempotent: a second call with no intervening task
//! change leaves the graph byte-identical.

use tracing::{debug, error};

use crate::error::{Result, ScheduleError};
use crate::store::ScheduleGraph;

/// Recomputes a work package's aggregates from its child tasks.
///
/// Hours are the plain sum; progress is the hours-weighted mean (0 for
/// a taskless or zero-hour work package); the date range becomes the
/// hull of the task ranges. A work package with no tasks keeps its
/// planned dates.
pub fn recompute_work_package(graph: &mut ScheduleGraph, work_package_id: &str) -> Result<()> {
    let pos = graph
        .work_packages
        .iter()
        .position(|wp| wp.id == work_package_id)
        .ok_or_else(|| {
            ScheduleError::not_found(format!("work package '{work_package_id}'"))
        })?;

    let mut total_hours = 0.0;
    let mut weighted_progress = 0.0;
    let mut start = None;
    let mut end = None;
    let mut task_count = 0usize;
    for task in graph.tasks_of(work_package_id) {
        total_hours += task.estimated_hours;
        weighted_progress += task.estimated_hours * task.progress_percent;
        start = Some(start.map_or(task.start, |s: chrono::NaiveDate| s.min(task.start)));
        end = Some(end.map_or(task.end, |e: chrono::NaiveDate| e.max(task.end)));
        task_count += 1;
    }

    if total_hours < 0.0 {
        error!(
            work_package = work_package_id,
            total_hours, "derived hours are negative; aggregate state is corrupt"
        );
        return Err(ScheduleError::internal(format!(
            "negative derived hours on work package '{work_package_id}'"
        )));
    }

    let wp = &mut graph.work_packages[pos];
    wp.estimated_hours = total_hours;
    wp.progress_percent = if task_count == 0 || total_hours == 0.0 {
        0.0
    } else {
        weighted_progress / total_hours
    };
    if task_count > 0 {
        wp.start = start;
        wp.end = end;
    }
    debug!(
        work_package = work_package_id,
        hours = wp.estimated_hours,
        progress = wp.progress_percent,
        "work package rolled up"
    );
    Ok(())
}

/// Recomputes a phase's aggregates from its work packages, mirroring
/// [`recompute_work_package`] one level up.
pub fn recompute_phase(graph: &mut ScheduleGraph, phase_id: &str) -> Result<()> {
    let pos = graph
        .phases
        .iter()
        .position(|p| p.id == phase_id)
        .ok_or_else(|| ScheduleError::not_found(format!("phase '{phase_id}'")))?;

    let mut total_hours = 0.0;
    let mut weighted_progress = 0.0;
    let mut start = None;
    let mut end = None;
    for wp in graph.work_packages_of(phase_id) {
        total_hours += wp.estimated_hours;
        weighted_progress += wp.estimated_hours * wp.progress_percent;
        if let Some(s) = wp.start {
            start = Some(start.map_or(s, |v: chrono::NaiveDate| v.min(s)));
        }
        if let Some(e) = wp.end {
            end = Some(end.map_or(e, |v: chrono::NaiveDate| v.max(e)));
        }
    }

    if total_hours < 0.0 {
        error!(
            phase = phase_id,
            total_hours, "derived hours are negative; aggregate state is corrupt"
        );
        return Err(ScheduleError::internal(format!(
            "negative derived hours on phase '{phase_id}'"
        )));
    }

    let phase = &mut graph.phases[pos];
    phase.estimated_hours = total_hours;
    phase.progress_percent = if total_hours == 0.0 {
        0.0
    } else {
        weighted_progress / total_hours
    };
    if start.is_some() {
        phase.start = start;
        phase.end = end;
    }
    Ok(())
}

/// Recomputes every touched ancestor bottom-up: each distinct work
/// package once, then each distinct parent phase once.
pub fn recompute_ancestors(graph: &mut ScheduleGraph, work_package_ids: &[String]) -> Result<()> {
    let mut phase_ids: Vec<String> = Vec::new();
    for wp_id in work_package_ids {
        recompute_work_package(graph, wp_id)?;
        if let Some(wp) = graph.work_package(wp_id) {
            if !phase_ids.contains(&wp.phase_id) {
                phase_ids.push(wp.phase_id.clone());
            }
        }
    }
    for phase_id in &phase_ids {
        recompute_phase(graph, phase_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Phase, Schedule, ScheduleKind, Task, WorkPackage};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_graph() -> ScheduleGraph {
        ScheduleGraph {
            schedule: Schedule::new("S1", "P1", ScheduleKind::Execution),
            phases: vec![Phase::new("PH1", "S1")],
            work_packages: vec![WorkPackage::new("WP1", "PH1")],
            tasks: vec![
                Task::new("T1", "WP1", d(2024, 1, 3), d(2024, 1, 10))
                    .with_hours(10.0)
                    .with_progress(50.0),
                Task::new("T2", "WP1", d(2024, 1, 1), d(2024, 1, 8))
                    .with_hours(30.0)
                    .with_progress(0.0),
            ],
            dependencies: vec![],
        }
    }

    #[test]
    fn test_hours_weighted_progress() {
        let mut graph = sample_graph();
        recompute_work_package(&mut graph, "WP1").unwrap();
        let wp = graph.work_package("WP1").unwrap();
        assert_eq!(wp.estimated_hours, 40.0);
        // (10 × 50 + 30 × 0) / 40 = 12.5
        assert_eq!(wp.progress_percent, 12.5);
    }

    #[test]
    fn test_date_range_is_task_hull() {
        let mut graph = sample_graph();
        recompute_work_package(&mut graph, "WP1").unwrap();
        let wp = graph.work_package("WP1").unwrap();
        assert_eq!(wp.start, Some(d(2024, 1, 1)));
        assert_eq!(wp.end, Some(d(2024, 1, 10)));
    }

    #[test]
    fn test_empty_work_package_keeps_planned_dates() {
        let mut graph = sample_graph();
        graph.work_packages.push(
            WorkPackage::new("WP2", "PH1").with_planned_dates(d(2024, 2, 1), d(2024, 2, 28)),
        );
        recompute_work_package(&mut graph, "WP2").unwrap();
        let wp = graph.work_package("WP2").unwrap();
        assert_eq!(wp.estimated_hours, 0.0);
        assert_eq!(wp.progress_percent, 0.0);
        assert_eq!(wp.start, Some(d(2024, 2, 1)));
        assert_eq!(wp.end, Some(d(2024, 2, 28)));
    }

    #[test]
    fn test_zero_hour_tasks_mean_zero_progress() {
        let mut graph = sample_graph();
        for task in &mut graph.tasks {
            task.estimated_hours = 0.0;
            task.progress_percent = 80.0;
        }
        recompute_work_package(&mut graph, "WP1").unwrap();
        assert_eq!(graph.work_package("WP1").unwrap().progress_percent, 0.0);
    }

    #[test]
    fn test_rollup_is_idempotent() {
        let mut graph = sample_graph();
        recompute_ancestors(&mut graph, &["WP1".to_string()]).unwrap();
        let first = graph.clone();
        recompute_ancestors(&mut graph, &["WP1".to_string()]).unwrap();
        assert_eq!(graph, first);
    }

    #[test]
    fn test_phase_mirrors_work_package_rollup() {
        let mut graph = sample_graph();
        graph
            .work_packages
            .push(WorkPackage::new("WP2", "PH1"));
        graph.tasks.push(
            Task::new("T3", "WP2", d(2024, 1, 15), d(2024, 1, 20))
                .with_hours(40.0)
                .with_progress(100.0),
        );
        recompute_ancestors(&mut graph, &["WP1".to_string(), "WP2".to_string()]).unwrap();

        let phase = graph.phase("PH1").unwrap();
        assert_eq!(phase.estimated_hours, 80.0);
        // (40 × 12.5 + 40 × 100) / 80 = 56.25
        assert_eq!(phase.progress_percent, 56.25);
        assert_eq!(phase.start, Some(d(2024, 1, 1)));
        assert_eq!(phase.end, Some(d(2024, 1, 20)));
    }

    #[test]
    fn test_negative_derived_hours_is_internal_error() {
        let mut graph = sample_graph();
        graph.tasks[0].estimated_hours = -50.0;
        assert!(matches!(
            recompute_work_package(&mut graph, "WP1"),
            Err(ScheduleError::Internal(_))
        ));
    }

    #[test]
    fn test_unknown_work_package_is_not_found() {
        let mut graph = sample_graph();
        assert!(matches!(
            recompute_work_package(&mut graph, "nope"),
            Err(ScheduleError::NotFound(_))
        ));
    }
}
