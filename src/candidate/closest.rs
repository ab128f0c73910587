//! Closest near-miss tracking.

use crate::geometry::Anchor;
use crate::kernel::Verdict;
use crate::util::math::match_percentage;
use std::cmp::Ordering;

/// Anchor that came closest to matching, with how close it came.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearMiss {
    pub anchor: Anchor,
    /// Matched pixels as a percentage of the pixels required to match, `0..=100`.
    pub percent: f32,
}

fn near_miss_cmp_desc(a: &NearMiss, b: &NearMiss) -> Ordering {
    b.percent
        .total_cmp(&a.percent)
        .then_with(|| a.anchor.y.cmp(&b.anchor.y))
        .then_with(|| a.anchor.x.cmp(&b.anchor.x))
}

/// Keeps the best [`NearMiss`] seen so far.
///
/// Ties go to the anchor that comes first in row-major order, so merging
/// per-tile trackers yields the same answer regardless of tile scheduling.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClosestTracker {
    required: usize,
    best: Option<NearMiss>,
}

impl ClosestTracker {
    /// `required` is the number of pixels that must match for success.
    pub(crate) fn new(pixels: usize, budget: usize) -> Self {
        Self {
            required: pixels.saturating_sub(budget),
            best: None,
        }
    }

    /// Records a failed comparison at `anchor`.
    pub(crate) fn observe(&mut self, anchor: Anchor, verdict: &Verdict) {
        let candidate = NearMiss {
            anchor,
            percent: match_percentage(verdict.matched_pixels(), self.required),
        };
        self.offer(candidate);
    }

    fn offer(&mut self, candidate: NearMiss) {
        match self.best {
            Some(best) if near_miss_cmp_desc(&candidate, &best) != Ordering::Less => {}
            _ => self.best = Some(candidate),
        }
    }

    /// Folds another tracker's best into this one.
    pub(crate) fn merge(&mut self, other: &ClosestTracker) {
        if let Some(best) = other.best {
            self.offer(best);
        }
    }

    pub(crate) fn best(&self) -> Option<NearMiss> {
        self.best
    }
}
