//! Shared state for worker cohorts.

mod cohort;

pub use cohort::{CohortSignal, CohortState, Hit, SharedBudget, WorkerGuard};
