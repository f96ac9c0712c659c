//! Task dependency model.
//!
//! A dependency is a directed edge between two tasks of the same
//! schedule. The relation kind picks which date of the predecessor
//! constrains which date of the successor; the lag shifts the
//! constraint by a signed number of days.
//!
//! The dependency graph restricted to any one schedule must stay
//! acyclic; see [`crate::resolver`].

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Temporal relation between a predecessor and a successor task.
///
/// Each kind is a lower bound on one of the successor's dates:
///
/// | Kind | Constraint |
/// |------|-----------|
/// | `FinishToStart` | `to.start >= from.end + lag` |
/// | `StartToStart` | `to.start >= from.start + lag` |
/// | `FinishToFinish` | `to.end >= from.end + lag` |
/// | `StartToFinish` | `to.end >= from.start + lag` |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    /// Whether the relation constrains the successor's start date
    /// (as opposed to its end date).
    #[inline]
    pub fn constrains_start(self) -> bool {
        matches!(self, Self::FinishToStart | Self::StartToStart)
    }
}

/// A directed dependency edge between two tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique edge identifier.
    pub id: String,
    /// Schedule both endpoints belong to.
    pub schedule_id: String,
    /// Predecessor task.
    pub from_task_id: String,
    /// Successor task.
    pub to_task_id: String,
    /// Temporal relation kind.
    pub kind: DependencyType,
    /// Signed day offset applied on top of the constraint.
    pub lag_days: i64,
}

impl Dependency {
    /// Creates a finish-to-start dependency with zero lag.
    pub fn new(
        id: impl Into<String>,
        schedule_id: impl Into<String>,
        from_task_id: impl Into<String>,
        to_task_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            schedule_id: schedule_id.into(),
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

    /// The earliest date the constrained side of the successor may take,
    /// given the predecessor's current dates.
    pub fn required_date(&self, from_start: NaiveDate, from_end: NaiveDate) -> NaiveDate {
        let base = match self.kind {
            DependencyType::FinishToStart | DependencyType::FinishToFinish => from_end,
            DependencyType::StartToStart | DependencyType::StartToFinish => from_start,
        };
        base + Duration::days(self.lag_days)
    }
}
