//! Building blocks for callers that drive their own search loops.
//!
//! These expose the per-anchor comparison, its error accounting and the
//! cohort primitive the parallel strategies are built on. Most users should
//! prefer [`SearchCoordinator`](crate::SearchCoordinator).

pub use crate::geometry::AnchorSpan;
pub use crate::kernel::{
    match_at, match_with_budget, neighbor_matches, ErrorSink, LocalBudget, MatchParams, Verdict,
};
pub use crate::sync::{CohortSignal, CohortState, Hit, SharedBudget, WorkerGuard};
