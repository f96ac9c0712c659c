//! Schedule engine for project and quotation cronogramas.
//!
//! Models a hierarchical work breakdown (Phase → Work Package → Task)
//! with directed task dependencies, and keeps it consistent under
//! edits: date changes cascade forward through the dependency graph,
//! effort/progress aggregates roll up from leaves to ancestors, and
//! whole schedules can be snapshotted into immutable baselines for
//! variance analysis.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Schedule`, `Phase`, `WorkPackage`,
//!   `Task`, `Dependency`
//! - **`resolver`**: Cycle detection and topological downstream closure
//! - **`propagator`**: Forward date propagation over dependency edges
//! - **`rollup`**: Leaf → work package → phase aggregation
//! - **`baseline`**: Immutable schedule snapshots
//! - **`store`**: Transactional persistence seam (`GraphStore`)
//! - **`service`**: `ScheduleService`, the single mutation surface
//!
//! # Architecture
//!
//! The engine is deliberately not a critical-path scheduler: there is
//! no float/slack computation and no resource leveling. Propagation is
//! a single forward pass from explicit dependency edges; rollups are
//! explicit bottom-up recomputation, never lazy getters. Persistence
//! and authentication live behind seams supplied by the embedding
//! application.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use cronograma::models::{Phase, Schedule, ScheduleKind, WorkPackage};
//! use cronograma::service::{NewDependency, NewTask, ScheduleService};
//! use cronograma::store::{ChangeSet, GraphStore, InMemoryGraphStore};
//!
//! # fn main() -> cronograma::Result<()> {
//! let store = InMemoryGraphStore::new();
//! let mut seed = ChangeSet::new();
//! seed.upsert_schedule(Schedule::new("S1", "P1", ScheduleKind::Execution));
//! seed.upsert_phase(Phase::new("PH1", "S1").with_name("Execution"));
//! seed.upsert_work_package(WorkPackage::new("WP1", "PH1").with_name("Site works"));
//! store.apply(seed)?;
//!
//! let service = ScheduleService::new(store);
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
//! let dig = service.create_task("WP1", NewTask::new("Dig", start, end).with_hours(24.0))?;
//!
//! let pour_start = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
//! let pour_end = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
//! let pour = service.create_task("WP1", NewTask::new("Pour", pour_start, pour_end))?;
//! service.create_dependency(NewDependency::new(&dig.id, &pour.id).with_lag(2))?;
//!
//! // Extending "Dig" pushes "Pour" forward, duration preserved.
//! let moved = service.update_task_dates(&dig.id, start, pour_start)?;
//! assert_eq!(moved.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod error;
pub mod models;
pub mod propagator;
pub mod resolver;
pub mod rollup;
pub mod service;
pub mod store;

pub use error::{Result, ScheduleError};
pub use models::{
    Dependency, DependencyType, Phase, Schedule, ScheduleKind, Task, TaskState, WorkPackage,
};
pub use service::{BatchCreated, NewDependency, NewTask, ScheduleService, TaskPatch};
pub use store::{ChangeSet, GraphStore, InMemoryGraphStore, ScheduleGraph};
