//! Schedule (cronograma) container model.
//!
//! A schedule is the full dated breakdown of work for one project or
//! quotation. A project owns one active schedule per kind plus any
//! number of immutable baseline snapshots taken from them.

use serde::{Deserialize, Serialize};

/// What stage of the project lifecycle a schedule belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Proposal-stage schedule attached to a quotation.
    Commercial,
    /// Live project schedule.
    #[default]
    Execution,
}

/// A schedule: the container for phases, work packages, tasks, and
/// dependency edges.
///
/// Baselines are created by the baseline manager and never mutated
/// afterwards. A commercial schedule is locked once an execution
/// schedule has been derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique schedule identifier.
    pub id: String,
    /// Owning project or quotation.
    pub project_id: String,
    /// Commercial or execution.
    pub kind: ScheduleKind,
    /// Whether this record is an immutable baseline snapshot.
    pub is_baseline: bool,
    /// Baseline revision number (0 for the live schedule).
    pub version: i32,
    /// Whether mutations are rejected outright.
    pub locked: bool,
    /// Optimistic-concurrency counter, bumped on every committed batch.
    pub lock_version: i64,
    /// User who created this record (baseline attribution).
    pub created_by: String,
}

impl Schedule {
    /// Creates a new live (mutable, version 0) schedule.
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, kind: ScheduleKind) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            kind,
            is_baseline: false,
            version: 0,
            locked: false,
            lock_version: 0,
            created_by: String::new(),
        }
    }

    /// Sets the creating user.
    pub fn with_created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = user.into();
        self
    }

    /// Marks the schedule as locked.
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Whether mutations are allowed on this schedule.
    #[inline]
    pub fn is_mutable(&self) -> bool {
        !self.is_baseline && !self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_schedule_is_mutable() {
        let s = Schedule::new("S1", "P1", ScheduleKind::Execution);
        assert!(s.is_mutable());
        assert_eq!(s.version, 0);
        assert!(!s.is_baseline);
    }

    #[test]
    fn test_locked_schedule_is_not_mutable() {
        let s = Schedule::new("S1", "P1", ScheduleKind::Commercial).with_locked(true);
        assert!(!s.is_mutable());
    }

    #[test]
    fn test_baseline_is_not_mutable() {
        let mut s = Schedule::new("S1", "P1", ScheduleKind::Execution);
        s.is_baseline = true;
        assert!(!s.is_mutable());
    }
}
