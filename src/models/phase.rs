//! Phase model.
//!
//! A phase is an ordered section of a schedule. Its dates, hours, and
//! progress are rollups of its work packages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An ordered container of work packages inside a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Unique phase identifier.
    pub id: String,
    /// Owning schedule.
    pub schedule_id: String,
    /// Human-readable name.
    pub name: String,
    /// Sibling ordering within the schedule.
    pub order: i32,
    /// Derived: earliest work package start.
    pub start: Option<NaiveDate>,
    /// Derived: latest work package end.
    pub end: Option<NaiveDate>,
    /// Derived: sum of work package hours.
    pub estimated_hours: f64,
    /// Derived: hours-weighted mean of work package progress (0–100).
    pub progress_percent: f64,
}

impl Phase {
    /// Creates a new empty phase.
    pub fn new(id: impl Into<String>, schedule_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schedule_id: schedule_id.into(),
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
}
