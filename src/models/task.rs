//! Task model.
//!
//! A task is the leaf schedulable unit: the only entity whose dates,
//! hours, and progress are directly settable. Everything above it in
//! the hierarchy is derived by the rollup.
//!
//! # Date Representation
//! Dates are inclusive calendar days (`start ..= end`); a one-day task
//! has `start == end`. Durations and lags are whole days.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Blocked` is assigned only by the date propagator when conflicting
/// dependency constraints force a duration inversion; it is recovered
/// once propagation re-runs cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    InProgress,
    Done,
    Blocked,
}

/// A leaf schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: String,
    /// Owning work package.
    pub work_package_id: String,
    /// Human-readable name.
    pub name: String,
    /// First working day (inclusive).
    pub start: NaiveDate,
    /// Last working day (inclusive).
    pub end: NaiveDate,
    /// Estimated effort in hours.
    pub estimated_hours: f64,
    /// Completion percentage, 0–100. Source of truth for rollups.
    pub progress_percent: f64,
    /// Lifecycle state.
    pub state: TaskState,
    /// Scheduling priority (higher = more important).
    pub priority: i32,
}

impl Task {
    /// Creates a new pending task spanning `start ..= end`.
    pub fn new(
        id: impl Into<String>,
        work_package_id: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            work_package_id: work_package_id.into(),
            name: String::new(),
            start,
            end,
            estimated_hours: 0.0,
            progress_percent: 0.0,
            state: TaskState::Pending,
            priority: 0,
        }
    }

    /// Sets the task name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the estimated hours.
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = hours;
        self
    }

    /// Sets the completion percentage (0–100).
    pub fn with_progress(mut self, percent: f64) -> Self {
        self.progress_percent = percent;
        self
    }

    /// Sets the lifecycle state.
    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }

    /// Sets the scheduling priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Duration in days beyond the first (a one-day task has duration 0).
    #[inline]
    pub fn duration_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Translates both dates by `delta` days, preserving duration.
    pub fn shift(&mut self, delta_days: i64) {
        self.start = self.start + Duration::days(delta_days);
        self.end = self.end + Duration::days(delta_days);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("T1", "WP1", d(2024, 1, 1), d(2024, 1, 5))
            .with_name("Groundwork")
            .with_hours(40.0)
            .with_progress(25.0)
            .with_priority(3);

        assert_eq!(task.id, "T1");
        assert_eq!(task.work_package_id, "WP1");
        assert_eq!(task.name, "Groundwork");
        assert_eq!(task.estimated_hours, 40.0);
        assert_eq!(task.progress_percent, 25.0);
        assert_eq!(task.priority, 3);
        assert_eq!(task.state, TaskState::Pending);
    }

    #[test]
    fn test_duration_days() {
        let task = Task::new("T1", "WP1", d(2024, 1, 1), d(2024, 1, 5));
        assert_eq!(task.duration_days(), 4);

        let one_day = Task::new("T2", "WP1", d(2024, 1, 1), d(2024, 1, 1));
        assert_eq!(one_day.duration_days(), 0);
    }

    #[test]
    fn test_shift_preserves_duration() {
        let mut task = Task::new("T1", "WP1", d(2024, 1, 1), d(2024, 1, 5));
        task.shift(7);
        assert_eq!(task.start, d(2024, 1, 8));
        assert_eq!(task.end, d(2024, 1, 12));
        assert_eq!(task.duration_days(), 4);

        task.shift(-7);
        assert_eq!(task.start, d(2024, 1, 1));
        assert_eq!(task.end, d(2024, 1, 5));
    }
}
