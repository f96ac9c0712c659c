//! Error types for schedule mutations.
//!
//! Every fallible operation in this crate returns [`ScheduleError`].
//! The variants map one-to-one onto the failure modes a caller can act
//! on: missing records, bad input, dependency cycles, locked schedules,
//! and optimistic-lock conflicts. [`ScheduleError::Internal`] covers
//! invariant violations that indicate a bug rather than bad input.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Failure modes of schedule operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// A referenced phase, work package, task, or dependency does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input (e.g. end date before start date, negative hours).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Adding a dependency would create a cycle.
    ///
    /// `path` is the offending cycle in edge order, with the first task
    /// repeated at the end (`[A, B, A]` for `A → B → A`).
    #[error("dependency cycle: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// Mutation attempted on a baseline or locked schedule.
    #[error("schedule '{0}' is locked")]
    LockedSchedule(String),

    /// Optimistic lock version mismatch: another writer got there first.
    #[error("concurrent modification of schedule '{schedule_id}': expected version {expected}, found {found}")]
    ConcurrentModification {
        schedule_id: String,
        expected: i64,
        found: i64,
    },

    /// An internal invariant was violated. Indicates a bug, not bad input.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl ScheduleError {
    /// Creates a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an internal-invariant error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
