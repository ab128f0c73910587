//! Parallel sweep of anchor tiles.
//!
//! The anchor span is cut into `pieces x pieces` tiles and each non-empty
//! tile is swept by one worker. Every tile owns a [`TileCursor`] that
//! remembers where its worker stopped, so a sweep can be resumed after the
//! caller rejects the reported hit.

use crate::candidate::closest::ClosestTracker;
use crate::geometry::{Anchor, AnchorSpan};
use crate::image::PixelView;
use crate::kernel::{match_with_budget, MatchParams};
use crate::search::Pass;
use crate::sync::{CohortSignal, CohortState, Hit};
use crate::trace::trace_debug;
use rayon::ThreadPool;

/// Resume point and near-miss record for one tile.
#[derive(Clone, Debug)]
pub(crate) struct TileCursor {
    span: AnchorSpan,
    /// Next anchor to test; `None` once the tile is exhausted.
    ///
    /// A worker that reports a hit leaves `next` on the hit anchor.
    next: Option<Anchor>,
    closest: ClosestTracker,
}

impl TileCursor {
    /// Cursors for every tile of `span`, each positioned on its first anchor.
    pub(crate) fn tiles(span: AnchorSpan, pieces: usize, closest: ClosestTracker) -> Vec<Self> {
        span.tiles(pieces)
            .into_iter()
            .map(|tile| Self {
                span: tile,
                next: Some(tile.first()),
                closest,
            })
            .collect()
    }

    pub(crate) fn next(&self) -> Option<Anchor> {
        self.next
    }

    /// Moves the cursor past `anchor` if it is currently parked on it.
    pub(crate) fn skip(&mut self, anchor: Anchor) -> bool {
        if self.next != Some(anchor) {
            return false;
        }
        self.next = self.span.after(anchor);
        true
    }

    fn run(
        &mut self,
        raster: PixelView<'_>,
        target: PixelView<'_>,
        params: MatchParams,
        state: &CohortState,
    ) {
        let _done = state.enlist();
        while let Some(anchor) = self.next {
            if state.is_cancelled() {
                return;
            }
            let verdict = match_with_budget(raster, target, anchor, params);
            if verdict.ok {
                state.report_match(Hit {
                    anchor,
                    errors: verdict.errors,
                });
                return;
            }
            self.closest.observe(anchor, &verdict);
            self.next = self.span.after(anchor);
        }
    }
}

/// Runs one cohort over every unfinished cursor and waits for the outcome.
///
/// Cursors keep their positions afterwards: finished tiles hold `None`,
/// cancelled tiles hold the anchor they had not tested yet and the winning
/// tile holds the hit.
pub(crate) fn sweep_tiles(
    pool: &ThreadPool,
    state: &mut CohortState,
    raster: PixelView<'_>,
    target: PixelView<'_>,
    params: MatchParams,
    cursors: &mut [TileCursor],
) -> CohortSignal {
    let active: Vec<&mut TileCursor> = cursors.iter_mut().filter(|c| c.next().is_some()).collect();
    state.spawn(active.len(), params.budget);
    trace_debug!("sweep_cohort", workers = active.len());

    let state = &*state;
    pool.in_place_scope(|scope| {
        for cursor in active {
            scope.spawn(move |_| cursor.run(raster, target, params, state));
        }
        state.await_cohort()
    })
}

/// Sweeps the whole `span` once and merges the per-tile near misses.
pub(crate) fn sweep(
    pool: &ThreadPool,
    state: &mut CohortState,
    raster: PixelView<'_>,
    target: PixelView<'_>,
    span: AnchorSpan,
    params: MatchParams,
    pieces: usize,
) -> Pass {
    let tracker = ClosestTracker::new(target.pixel_count(), params.budget.errors());
    let mut cursors = TileCursor::tiles(span, pieces, tracker);
    match sweep_tiles(pool, state, raster, target, params, &mut cursors) {
        CohortSignal::Matched(hit) => Pass::hit(hit),
        CohortSignal::Exhausted => {
            let mut closest = tracker;
            for cursor in &cursors {
                closest.merge(&cursor.closest);
            }
            Pass::miss(closest.best())
        }
        CohortSignal::Interrupted => Pass::interrupted(),
    }
}

#[cfg(test)]
mod tests {
    use super::{sweep, sweep_tiles, TileCursor};
    use crate::candidate::closest::ClosestTracker;
    use crate::geometry::{Anchor, Rect};
    use crate::image::OwnedPixels;
    use crate::kernel::{MatchParams, ToleranceBudget};
    use crate::sync::{CohortSignal, CohortState};
    use std::thread;
    use std::time::Duration;

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap()
    }

    fn noise(width: usize, height: usize) -> OwnedPixels {
        OwnedPixels::from_fn(width, height, |x, y| {
            let v = (x * 131 + y * 71 + (x * y) % 17) as u8;
            [v, v ^ 0x5a, v.wrapping_add(y as u8)]
        })
        .unwrap()
    }

    #[test]
    fn finds_unique_pattern_in_any_tile() {
        let pool = pool();
        let mut state = CohortState::new();
        let mut raster = OwnedPixels::filled(40, 30, [3, 3, 3]).unwrap();
        let mark = noise(4, 4);
        raster.blit(mark.view(), 27, 19).unwrap();
        let span = Rect::new(0, 0, 40, 30).anchor_span(4, 4).unwrap();

        let pass = sweep(
            &pool,
            &mut state,
            raster.view(),
            mark.view(),
            span,
            MatchParams::exact(),
            4,
        );
        assert_eq!(pass.hit.unwrap().anchor, Anchor::new(27, 19));
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn exhausted_sweep_leaves_every_cursor_finished() {
        let pool = pool();
        let mut state = CohortState::new();
        let raster = OwnedPixels::filled(20, 20, [0, 0, 0]).unwrap();
        let mark = noise(3, 3);
        let span = Rect::new(0, 0, 20, 20).anchor_span(3, 3).unwrap();
        let tracker = ClosestTracker::new(9, 0);
        let mut cursors = TileCursor::tiles(span, 4, tracker);

        let signal = sweep_tiles(
            &pool,
            &mut state,
            raster.view(),
            mark.view(),
            MatchParams::exact(),
            &mut cursors,
        );
        assert_eq!(signal, CohortSignal::Exhausted);
        assert!(cursors.iter().all(|c| c.next().is_none()));
    }

    #[test]
    fn skipping_a_hit_resumes_after_it() {
        let pool = pool();
        let mut state = CohortState::new();
        let raster = OwnedPixels::filled(6, 1, [1, 1, 1]).unwrap();
        let mark = OwnedPixels::filled(1, 1, [1, 1, 1]).unwrap();
        let span = Rect::new(0, 0, 6, 1).anchor_span(1, 1).unwrap();
        let mut cursors = TileCursor::tiles(span, 1, ClosestTracker::new(1, 0));

        let mut seen = Vec::new();
        loop {
            let signal = sweep_tiles(
                &pool,
                &mut state,
                raster.view(),
                mark.view(),
                MatchParams::exact(),
                &mut cursors,
            );
            let CohortSignal::Matched(hit) = signal else {
                break;
            };
            seen.push(hit.anchor.x);
            assert!(cursors[0].skip(hit.anchor));
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    /// Uniform raster whose only match for an 8x8 marker target is at `(0, 0)`.
    fn marker_scene(width: usize, height: usize) -> (OwnedPixels, OwnedPixels) {
        let mut raster = OwnedPixels::filled(width, height, [3, 3, 3]).unwrap();
        raster.set_pixel(7, 7, [200, 10, 10]).unwrap();
        let mut target = OwnedPixels::filled(8, 8, [3, 3, 3]).unwrap();
        target.set_pixel(7, 7, [200, 10, 10]).unwrap();
        (raster, target)
    }

    #[test]
    fn early_hit_leaves_other_tiles_unfinished() {
        let pool = pool();
        let mut state = CohortState::new();
        let (raster, target) = marker_scene(800, 800);
        let span = Rect::new(0, 0, 800, 800).anchor_span(8, 8).unwrap();
        let mut cursors = TileCursor::tiles(span, 4, ClosestTracker::new(64, 0));
        assert_eq!(cursors.len(), 16);

        let signal = sweep_tiles(
            &pool,
            &mut state,
            raster.view(),
            target.view(),
            MatchParams::exact(),
            &mut cursors,
        );
        let CohortSignal::Matched(hit) = signal else {
            panic!("expected a match, got {signal:?}");
        };
        assert_eq!(hit.anchor, Anchor::new(0, 0));
        assert_eq!(cursors[0].next(), Some(Anchor::new(0, 0)));
        assert!(cursors[1..].iter().any(|c| c.next().is_some()));
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn cancelled_cohort_stops_before_the_first_anchor() {
        let (raster, target) = marker_scene(64, 64);
        let span = Rect::new(0, 0, 64, 64).anchor_span(8, 8).unwrap();
        let mut cursor = TileCursor::tiles(span, 1, ClosestTracker::new(64, 0)).remove(0);
        let mut state = CohortState::new();
        state.spawn(1, ToleranceBudget::EXACT);
        state.cancel();

        cursor.run(raster.view(), target.view(), MatchParams::exact(), &state);
        assert_eq!(cursor.next(), Some(Anchor::new(0, 0)));
        assert_eq!(state.hit(), None);
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn cancel_interrupts_a_running_tile() {
        let raster = OwnedPixels::filled(2000, 2000, [3, 3, 3]).unwrap();
        let mut target = OwnedPixels::filled(8, 8, [3, 3, 3]).unwrap();
        target.set_pixel(7, 7, [200, 10, 10]).unwrap();
        let span = Rect::new(0, 0, 2000, 2000).anchor_span(8, 8).unwrap();
        let mut cursor = TileCursor::tiles(span, 1, ClosestTracker::new(64, 0)).remove(0);
        let mut state = CohortState::new();
        state.spawn(1, ToleranceBudget::EXACT);
        let state = &state;

        thread::scope(|s| {
            let worker = s.spawn(|| {
                cursor.run(raster.view(), target.view(), MatchParams::exact(), state);
            });
            thread::sleep(Duration::from_millis(10));
            state.cancel();
            assert_eq!(state.await_cohort(), CohortSignal::Exhausted);
            worker.join().unwrap();
        });

        let stopped_at = cursor.next().expect("cancelled tile keeps an untested anchor");
        assert!(span.contains(stopped_at));
        assert_eq!(state.hit(), None);
    }
}
