//! Block-parallel verification for large targets.
//!
//! The target is cut into blocks once. Candidate anchors come from a sweep
//! of the first block alone; each candidate is then verified by one worker
//! per block, all charging a single shared error budget. A rejected
//! candidate advances the tile that produced it and the sweep resumes, so
//! every anchor is offered to verification at most once.

use crate::candidate::closest::ClosestTracker;
use crate::geometry::{blocks, Anchor, AnchorSpan, Rect};
use crate::image::PixelView;
use crate::kernel::{match_at, MatchParams};
use crate::search::sweep::{sweep_tiles, TileCursor};
use crate::search::Pass;
use crate::sync::{CohortSignal, CohortState, Hit, SharedBudget};
use crate::trace::{trace_debug, trace_warn};
use crate::util::ScreenMatchResult;
use rayon::ThreadPool;

/// A target split into blocks, each paired with its view.
pub(crate) struct BlockPlan<'a> {
    parts: Vec<(Rect, PixelView<'a>)>,
}

impl<'a> BlockPlan<'a> {
    pub(crate) fn new(target: PixelView<'a>, pieces: usize) -> ScreenMatchResult<Self> {
        let parts = blocks(target.width(), target.height(), pieces)
            .into_iter()
            .map(|rect| {
                target
                    .roi(rect.x, rect.y, rect.width, rect.height)
                    .map(|view| (rect, view))
            })
            .collect::<ScreenMatchResult<Vec<_>>>()?;
        Ok(Self { parts })
    }

    fn first(&self) -> Option<PixelView<'a>> {
        self.parts.first().map(|(_, view)| *view)
    }

    pub(crate) fn len(&self) -> usize {
        self.parts.len()
    }
}

/// Outcome of verifying one anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verification {
    Accepted(Hit),
    Rejected,
    Interrupted,
}

/// Verifies every block at `anchor` with one worker per block.
///
/// Accepts when the cohort finishes without exceeding the shared budget; the
/// accepted hit is recorded through `report_match`.
pub(crate) fn verify_anchor(
    pool: &ThreadPool,
    state: &mut CohortState,
    raster: PixelView<'_>,
    plan: &BlockPlan<'_>,
    anchor: Anchor,
    params: MatchParams,
) -> Verification {
    state.spawn(plan.len(), params.budget);
    let state = &*state;
    let signal = pool.in_place_scope(|scope| {
        for &(rect, view) in &plan.parts {
            scope.spawn(move |_| {
                let _done = state.enlist();
                let mut sink = SharedBudget::new(state);
                match_at(
                    raster,
                    view,
                    anchor.offset(rect.x, rect.y),
                    params.fuzzy,
                    &mut sink,
                );
            });
        }
        state.await_cohort()
    });

    match signal {
        CohortSignal::Interrupted => Verification::Interrupted,
        CohortSignal::Matched(hit) => Verification::Accepted(hit),
        CohortSignal::Exhausted if state.budget_exceeded() => Verification::Rejected,
        CohortSignal::Exhausted => {
            let hit = Hit {
                anchor,
                errors: state.errors_so_far(),
            };
            state.report_match(hit);
            Verification::Accepted(hit)
        }
    }
}

/// Searches `span` for the blocked target.
///
/// Near misses are not tracked here; partial first-block scores say little
/// about how close the full target came.
pub(crate) fn verify_blocks(
    pool: &ThreadPool,
    state: &mut CohortState,
    raster: PixelView<'_>,
    target: PixelView<'_>,
    span: AnchorSpan,
    params: MatchParams,
    pieces: usize,
) -> ScreenMatchResult<Pass> {
    let plan = BlockPlan::new(target, pieces)?;
    let Some(first) = plan.first() else {
        return Ok(Pass::miss(None));
    };
    let tracker = ClosestTracker::new(first.pixel_count(), params.budget.errors());
    let mut cursors = TileCursor::tiles(span, pieces, tracker);
    let mut candidates = 0usize;

    loop {
        let anchor = match sweep_tiles(pool, state, raster, first, params, &mut cursors) {
            CohortSignal::Matched(hit) => hit.anchor,
            CohortSignal::Exhausted => {
                trace_debug!("blocks_exhausted", candidates = candidates);
                return Ok(Pass::miss(None));
            }
            CohortSignal::Interrupted => return Ok(Pass::interrupted()),
        };
        candidates += 1;

        match verify_anchor(pool, state, raster, &plan, anchor, params) {
            Verification::Accepted(hit) => {
                trace_debug!(
                    "blocks_verified",
                    x = hit.anchor.x,
                    y = hit.anchor.y,
                    candidates = candidates
                );
                return Ok(Pass::hit(hit));
            }
            Verification::Interrupted => return Ok(Pass::interrupted()),
            Verification::Rejected => {
                let advanced = cursors.iter_mut().any(|cursor| cursor.skip(anchor));
                if !advanced {
                    trace_warn!("blocks_candidate_orphaned", x = anchor.x, y = anchor.y);
                    return Ok(Pass::miss(None));
                }
            }
        }
    }
}
