//! Work package ("EDT") model.
//!
//! A work package groups the tasks of one unit of work inside a phase.
//! Its hours, progress, and date range are aggregates of its tasks and
//! must never be edited directly; the rollup recomputes them after
//! every task mutation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A unit of work inside a phase, aggregating one or more tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkPackage {
    /// Unique work package identifier.
    pub id: String,
    /// Owning phase.
    pub phase_id: String,
    /// Human-readable name.
    pub name: String,
    /// Sibling ordering within the phase.
    pub order: i32,
    /// Planned start until the first rollup; the hull of task starts after.
    pub start: Option<NaiveDate>,
    /// Planned end until the first rollup; the hull of task ends after.
    pub end: Option<NaiveDate>,
    /// Derived: sum of task hours.
    pub estimated_hours: f64,
    /// Derived: hours-weighted mean of task progress (0–100).
    pub progress_percent: f64,
}

impl WorkPackage {
    /// Creates a new empty work package.
    pub fn new(id: impl Into<String>, phase_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phase_id: phase_id.into(),
            name: String::new(),
            order: 0,
            start: None,
            end: None,
            estimated_hours: 0.0,
            progress_percent: 0.0,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the sibling order.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Sets the planned date range.
    pub fn with_planned_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}
