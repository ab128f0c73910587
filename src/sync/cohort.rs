//! Coordination state shared by one cohort of workers.
//!
//! A cohort is the set of workers launched together for one search step.
//! They share one `CohortState`: a mutex-guarded record of how many workers
//! are still running and which hit (if any) won, plus lock-free counters for
//! the shared error budget and the cancellation flag.
//!
//! Every mutation the coordinator waits on happens under the mutex and the
//! coordinator re-checks its predicate under the same mutex before sleeping,
//! so a worker that finishes before the coordinator starts waiting cannot
//! lose its wakeup. `coordinator_waiting` only lets workers skip
//! notifications nobody would receive.

use crate::geometry::Anchor;
use crate::kernel::{ErrorSink, ToleranceBudget};
use crate::trace::{trace_debug, trace_warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A successful comparison reported by a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    pub anchor: Anchor,
    /// Mismatched pixels at the anchor.
    pub errors: usize,
}

/// Why [`CohortState::await_cohort`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CohortSignal {
    /// A worker reported the winning hit.
    Matched(Hit),
    /// Every worker finished without a hit.
    Exhausted,
    /// The wait was torn down by a panicking worker.
    Interrupted,
}

#[derive(Debug, Default)]
struct Inner {
    remaining: usize,
    hit: Option<Hit>,
    coordinator_waiting: bool,
}

/// Shared record for one cohort; reused across cohorts via [`spawn`](Self::spawn).
#[derive(Debug, Default)]
pub struct CohortState {
    inner: Mutex<Inner>,
    wake: Condvar,
    cancelled: AtomicBool,
    errors: AtomicUsize,
    budget: usize,
}

impl CohortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the state for a new cohort of `workers` workers.
    ///
    /// Requires exclusive access, so it cannot race with workers of the
    /// previous cohort. Clears the hit, the error count and cancellation.
    pub fn spawn(&mut self, workers: usize, budget: ToleranceBudget) {
        self.inner = Mutex::new(Inner {
            remaining: workers,
            ..Inner::default()
        });
        *self.cancelled.get_mut() = false;
        *self.errors.get_mut() = 0;
        self.budget = budget.errors();
        trace_debug!("cohort_spawn", workers = workers, budget = self.budget);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds one error to the shared count; `true` once the budget is exceeded.
    ///
    /// Exceeding the budget also cancels the cohort.
    pub fn report_block_error(&self) -> bool {
        let seen = self.errors.fetch_add(1, Ordering::AcqRel) + 1;
        let exceeded = seen > self.budget;
        if exceeded {
            self.cancelled.store(true, Ordering::Release);
        }
        exceeded
    }

    /// Returns `true` if the shared error count is over budget.
    pub fn budget_exceeded(&self) -> bool {
        self.errors.load(Ordering::Acquire) > self.budget
    }

    /// Errors reported so far in this cohort.
    pub fn errors_so_far(&self) -> usize {
        self.errors.load(Ordering::Acquire)
    }

    /// Error budget shared by this cohort.
    pub fn error_budget(&self) -> usize {
        self.budget
    }

    /// Records `hit` if no hit was recorded yet; returns whether it won.
    ///
    /// A winning report cancels the remaining workers.
    pub fn report_match(&self, hit: Hit) -> bool {
        let mut inner = self.lock();
        if inner.hit.is_some() {
            return false;
        }
        inner.hit = Some(hit);
        self.cancelled.store(true, Ordering::Release);
        if inner.coordinator_waiting {
            self.wake.notify_all();
        }
        true
    }

    /// Marks one worker finished; returns whether others are still running.
    pub fn worker_done(&self) -> bool {
        let mut inner = self.lock();
        let Some(left) = inner.remaining.checked_sub(1) else {
            trace_warn!("cohort_extra_done", remaining = 0usize);
            return false;
        };
        inner.remaining = left;
        if left == 0 && inner.coordinator_waiting {
            self.wake.notify_all();
        }
        left > 0
    }

    /// Blocks until a hit is reported or every worker is done.
    pub fn await_cohort(&self) -> CohortSignal {
        let Ok(mut inner) = self.inner.lock() else {
            trace_warn!("cohort_wait_interrupted", stage = "lock");
            return CohortSignal::Interrupted;
        };
        loop {
            if let Some(hit) = inner.hit {
                inner.coordinator_waiting = false;
                return CohortSignal::Matched(hit);
            }
            if inner.remaining == 0 {
                inner.coordinator_waiting = false;
                return CohortSignal::Exhausted;
            }
            inner.coordinator_waiting = true;
            inner = match self.wake.wait(inner) {
                Ok(guard) => guard,
                Err(_) => {
                    trace_warn!("cohort_wait_interrupted", stage = "wait");
                    return CohortSignal::Interrupted;
                }
            };
        }
    }

    /// Asks running workers to stop at their next loop boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// The winning hit, if any.
    pub fn hit(&self) -> Option<Hit> {
        self.lock().hit
    }

    /// Workers that have not called [`worker_done`](Self::worker_done) yet.
    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }

    /// Returns a guard that calls `worker_done` when dropped, even on unwind.
    pub fn enlist(&self) -> WorkerGuard<'_> {
        WorkerGuard { state: self }
    }
}

/// Marks its worker finished when dropped.
#[must_use = "dropping the guard immediately marks the worker finished"]
pub struct WorkerGuard<'a> {
    state: &'a CohortState,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        self.state.worker_done();
    }
}

/// Error sink that charges every mismatch to the cohort-wide budget.
pub struct SharedBudget<'a> {
    state: &'a CohortState,
}

impl<'a> SharedBudget<'a> {
    pub fn new(state: &'a CohortState) -> Self {
        Self { state }
    }
}

impl ErrorSink for SharedBudget<'_> {
    fn record_error(&mut self) -> bool {
        self.state.report_block_error()
    }

    fn abandoned(&self) -> bool {
        self.state.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::{CohortSignal, CohortState, Hit};
    use crate::geometry::Anchor;
    use crate::kernel::ToleranceBudget;
    use std::thread;
    use std::time::Duration;

    fn hit(x: usize, y: usize) -> Hit {
        Hit {
            anchor: Anchor::new(x, y),
            errors: 0,
        }
    }

    #[test]
    fn first_report_wins() {
        let mut state = CohortState::new();
        state.spawn(3, ToleranceBudget::EXACT);
        assert!(state.report_match(hit(1, 2)));
        assert!(!state.report_match(hit(9, 9)));
        assert!(state.is_cancelled());
        assert_eq!(state.hit(), Some(hit(1, 2)));
        assert_eq!(state.await_cohort(), CohortSignal::Matched(hit(1, 2)));
    }

    #[test]
    fn concurrent_reports_keep_a_single_winner() {
        let mut state = CohortState::new();
        state.spawn(8, ToleranceBudget::EXACT);
        let state = &state;
        let wins: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    s.spawn(move || {
                        let _guard = state.enlist();
                        usize::from(state.report_match(hit(i, i)))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(wins, 1);
        assert_eq!(state.remaining(), 0);
        let winner = state.hit().unwrap();
        assert_eq!(state.await_cohort(), CohortSignal::Matched(winner));
    }

    #[test]
    fn workers_finishing_early_do_not_lose_the_wakeup() {
        let mut state = CohortState::new();
        state.spawn(4, ToleranceBudget::EXACT);
        let state = &state;
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(move || {
                    let _guard = state.enlist();
                });
            }
            thread::sleep(Duration::from_millis(20));
            assert_eq!(state.await_cohort(), CohortSignal::Exhausted);
        });
    }

    #[test]
    fn coordinator_sleeps_until_last_worker() {
        let mut state = CohortState::new();
        state.spawn(2, ToleranceBudget::EXACT);
        let state = &state;
        thread::scope(|s| {
            for delay in [5u64, 30] {
                s.spawn(move || {
                    thread::sleep(Duration::from_millis(delay));
                    assert!(state.remaining() > 0);
                    state.worker_done();
                });
            }
            assert_eq!(state.await_cohort(), CohortSignal::Exhausted);
            assert_eq!(state.remaining(), 0);
        });
    }

    #[test]
    fn block_errors_trip_the_shared_budget() {
        let mut state = CohortState::new();
        state.spawn(2, ToleranceBudget(2));
        assert!(!state.report_block_error());
        assert!(!state.report_block_error());
        assert!(!state.is_cancelled());
        assert!(state.report_block_error());
        assert!(state.budget_exceeded());
        assert!(state.is_cancelled());
        assert_eq!(state.errors_so_far(), 3);
    }

    #[test]
    fn spawn_resets_previous_cohort() {
        let mut state = CohortState::new();
        state.spawn(1, ToleranceBudget::EXACT);
        state.report_match(hit(3, 3));
        state.report_block_error();
        assert!(!state.worker_done());

        state.spawn(5, ToleranceBudget(4));
        assert_eq!(state.hit(), None);
        assert_eq!(state.remaining(), 5);
        assert_eq!(state.errors_so_far(), 0);
        assert_eq!(state.error_budget(), 4);
        assert!(!state.is_cancelled());
    }

    #[test]
    fn empty_cohort_is_exhausted_immediately() {
        let mut state = CohortState::new();
        state.spawn(0, ToleranceBudget::EXACT);
        assert_eq!(state.await_cohort(), CohortSignal::Exhausted);
        assert!(!state.worker_done());
    }
}
