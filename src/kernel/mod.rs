//! Pixel comparison at a single anchor.
//!
//! A target pixel matches when all three bands equal the raster pixel under
//! it. With fuzzy matching enabled, a mismatching pixel is rescued when any
//! of the raster pixel's eight in-bounds neighbors equals the target pixel
//! exactly. Errors are accounted through an [`ErrorSink`], which lets the
//! same loop serve a private counter and a budget shared across a cohort.

use crate::geometry::Anchor;
use crate::image::{PixelView, BANDS};
use crate::util::math::error_budget;
use crate::util::{ScreenMatchError, ScreenMatchResult};

mod fuzzy;

pub use fuzzy::neighbor_matches;

/// Maximum number of mismatched pixels a match may contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ToleranceBudget(pub usize);

impl ToleranceBudget {
    /// Budget that admits no mismatch.
    pub const EXACT: Self = Self(0);

    /// Derives the budget from the percent of `pixels` that must match.
    pub fn from_percent(percent: u8, pixels: usize) -> ScreenMatchResult<Self> {
        if percent > 100 {
            return Err(ScreenMatchError::InvalidTolerance { percent });
        }
        Ok(Self(error_budget(percent, pixels)))
    }

    pub fn errors(self) -> usize {
        self.0
    }

    pub fn is_exact(self) -> bool {
        self.0 == 0
    }
}

/// Per-search comparison parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchParams {
    /// Mismatches tolerated before a candidate is rejected.
    pub budget: ToleranceBudget,
    /// Try the 8-neighborhood before counting a pixel as an error.
    ///
    /// Applies at every budget, including [`ToleranceBudget::EXACT`]. Every
    /// target pixel of a distinct pattern is then rescued one step
    /// diagonally, so a row-major search can accept the anchor one pixel up
    /// and left of the true location.
    pub fuzzy: bool,
}

impl MatchParams {
    pub fn exact() -> Self {
        Self {
            budget: ToleranceBudget::EXACT,
            fuzzy: false,
        }
    }
}

/// Receives pixel errors while a comparison runs.
pub trait ErrorSink {
    /// Records one mismatched pixel; returns `true` once the budget is exceeded.
    fn record_error(&mut self) -> bool;

    /// Returns `true` when the comparison should stop early.
    ///
    /// Checked once per target row.
    fn abandoned(&self) -> bool {
        false
    }
}

/// Error counter owned by a single comparison.
#[derive(Clone, Copy, Debug)]
pub struct LocalBudget {
    errors: usize,
    budget: usize,
}

impl LocalBudget {
    pub fn new(budget: ToleranceBudget) -> Self {
        Self {
            errors: 0,
            budget: budget.errors(),
        }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }
}

impl ErrorSink for LocalBudget {
    fn record_error(&mut self) -> bool {
        self.errors += 1;
        self.errors > self.budget
    }
}

/// Result of comparing a target against one anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// Every pixel was compared and the budget held.
    pub ok: bool,
    /// Mismatched pixels seen before the comparison ended.
    pub errors: usize,
    /// Pixels compared before the comparison ended.
    pub compared: usize,
}

impl Verdict {
    const REJECTED: Self = Self {
        ok: false,
        errors: 0,
        compared: 0,
    };

    /// Pixels that matched (exactly or through the fuzzy rescue).
    pub fn matched_pixels(&self) -> usize {
        self.compared - self.errors
    }
}

/// Compares `target` against `raster` with its top-left corner at `anchor`.
///
/// Stops as soon as `sink` reports the budget exceeded or asks to abandon.
/// Anchors where the target would leave the raster are rejected without
/// reading any pixel.
pub fn match_at<S: ErrorSink>(
    raster: PixelView<'_>,
    target: PixelView<'_>,
    anchor: Anchor,
    fuzzy: bool,
    sink: &mut S,
) -> Verdict {
    let tw = target.width();
    let th = target.height();
    let fits = anchor
        .x
        .checked_add(tw)
        .zip(anchor.y.checked_add(th))
        .is_some_and(|(ex, ey)| ex <= raster.width() && ey <= raster.height());
    if !fits {
        return Verdict::REJECTED;
    }

    let mut errors = 0usize;
    let mut compared = 0usize;
    let x_start = anchor.x * BANDS;
    let x_end = x_start + tw * BANDS;

    for ty in 0..th {
        if sink.abandoned() {
            return Verdict {
                ok: false,
                errors,
                compared,
            };
        }
        let (Some(t_row), Some(r_row)) = (target.row(ty), raster.row(anchor.y + ty)) else {
            return Verdict::REJECTED;
        };
        let r_row = &r_row[x_start..x_end];
        for (tx, (t_px, r_px)) in t_row
            .chunks_exact(BANDS)
            .zip(r_row.chunks_exact(BANDS))
            .enumerate()
        {
            compared += 1;
            if t_px == r_px {
                continue;
            }
            let want = [t_px[0], t_px[1], t_px[2]];
            if fuzzy && neighbor_matches(raster, anchor.x + tx, anchor.y + ty, want) {
                continue;
            }
            errors += 1;
            if sink.record_error() {
                return Verdict {
                    ok: false,
                    errors,
                    compared,
                };
            }
        }
    }

    Verdict {
        ok: true,
        errors,
        compared,
    }
}

/// Compares with a private counter bounded by `params.budget`.
pub fn match_with_budget(
    raster: PixelView<'_>,
    target: PixelView<'_>,
    anchor: Anchor,
    params: MatchParams,
) -> Verdict {
    let mut sink = LocalBudget::new(params.budget);
    match_at(raster, target, anchor, params.fuzzy, &mut sink)
}

#[cfg(test)]
mod tests {
    use super::{match_with_budget, ErrorSink, MatchParams, ToleranceBudget};
    use crate::geometry::{Anchor, Rect};
    use crate::image::OwnedPixels;
    use crate::util::ScreenMatchError;

    fn checker(width: usize, height: usize) -> OwnedPixels {
        OwnedPixels::from_fn(width, height, |x, y| {
            let v = ((x * 37) ^ (y * 91)) as u8;
            [v, v.wrapping_add(13), v.wrapping_mul(3)]
        })
        .unwrap()
    }

    #[test]
    fn budget_from_percent_rejects_out_of_range() {
        assert_eq!(
            ToleranceBudget::from_percent(101, 10).unwrap_err(),
            ScreenMatchError::InvalidTolerance { percent: 101 }
        );
        assert_eq!(ToleranceBudget::from_percent(98, 64).unwrap(), ToleranceBudget(1));
        assert!(ToleranceBudget::from_percent(100, 64).unwrap().is_exact());
    }

    #[test]
    fn exact_copy_matches_with_zero_errors() {
        let raster = checker(20, 20);
        let target = OwnedPixels::from_view(raster.view().roi(4, 6, 5, 5).unwrap()).unwrap();
        let verdict = match_with_budget(
            raster.view(),
            target.view(),
            Anchor::new(4, 6),
            MatchParams::exact(),
        );
        assert!(verdict.ok);
        assert_eq!(verdict.errors, 0);
        assert_eq!(verdict.compared, 25);
    }

    #[test]
    fn single_band_difference_counts_one_error() {
        let raster = checker(12, 12);
        let mut target = OwnedPixels::from_view(raster.view().roi(2, 2, 4, 4).unwrap()).unwrap();
        let px = target.view().pixel(1, 1).unwrap();
        target
            .set_pixel(1, 1, [px[0], px[1], px[2].wrapping_add(1)])
            .unwrap();

        let strict = match_with_budget(
            raster.view(),
            target.view(),
            Anchor::new(2, 2),
            MatchParams::exact(),
        );
        assert!(!strict.ok);
        assert_eq!(strict.errors, 1);

        let tolerant = match_with_budget(
            raster.view(),
            target.view(),
            Anchor::new(2, 2),
            MatchParams {
                budget: ToleranceBudget(1),
                fuzzy: false,
            },
        );
        assert!(tolerant.ok);
        assert_eq!(tolerant.errors, 1);
        assert_eq!(tolerant.compared, 16);
    }

    #[test]
    fn early_exit_reports_partial_counts() {
        let raster = OwnedPixels::filled(10, 10, [0, 0, 0]).unwrap();
        let target = OwnedPixels::filled(4, 4, [255, 255, 255]).unwrap();
        let verdict = match_with_budget(
            raster.view(),
            target.view(),
            Anchor::new(0, 0),
            MatchParams {
                budget: ToleranceBudget(2),
                fuzzy: false,
            },
        );
        assert!(!verdict.ok);
        assert_eq!(verdict.errors, 3);
        assert_eq!(verdict.compared, 3);
        assert_eq!(verdict.matched_pixels(), 0);
    }

    #[test]
    fn fuzzy_rescues_shifted_pixel() {
        let mut raster = OwnedPixels::filled(8, 8, [10, 10, 10]).unwrap();
        raster.set_pixel(4, 3, [200, 0, 0]).unwrap();
        let mut target = OwnedPixels::filled(3, 3, [10, 10, 10]).unwrap();
        target.set_pixel(1, 1, [200, 0, 0]).unwrap();

        // The odd pixel sits one column right of where the target expects it.
        let anchor = Anchor::new(2, 2);
        let strict = match_with_budget(raster.view(), target.view(), anchor, MatchParams::exact());
        assert!(!strict.ok);

        let fuzzy = match_with_budget(
            raster.view(),
            target.view(),
            anchor,
            MatchParams {
                budget: ToleranceBudget::EXACT,
                fuzzy: true,
            },
        );
        assert!(fuzzy.ok);
        assert_eq!(fuzzy.errors, 0);
        assert_eq!(fuzzy.compared, 9);
    }

    #[test]
    fn fuzzy_at_full_tolerance_accepts_diagonal_neighbor_first() {
        let mut raster = OwnedPixels::filled(10, 10, [0, 0, 0]).unwrap();
        let target = OwnedPixels::from_fn(3, 3, |x, y| [(1 + x + 3 * y) as u8, 50, 50]).unwrap();
        raster.blit(target.view(), 5, 4).unwrap();
        let span = Rect::new(0, 0, 10, 10).anchor_span(3, 3).unwrap();

        let first_at = |fuzzy: bool| {
            let params = MatchParams {
                budget: ToleranceBudget::EXACT,
                fuzzy,
            };
            span.iter()
                .find(|&a| match_with_budget(raster.view(), target.view(), a, params).ok)
        };
        assert_eq!(first_at(false), Some(Anchor::new(5, 4)));
        assert_eq!(first_at(true), Some(Anchor::new(4, 3)));
    }

    #[test]
    fn out_of_bounds_anchor_is_rejected() {
        let raster = checker(6, 6);
        let target = checker(4, 4);
        let verdict = match_with_budget(
            raster.view(),
            target.view(),
            Anchor::new(3, 0),
            MatchParams::exact(),
        );
        assert!(!verdict.ok);
        assert_eq!(verdict.compared, 0);
    }

    struct Abandoning;

    impl ErrorSink for Abandoning {
        fn record_error(&mut self) -> bool {
            false
        }

        fn abandoned(&self) -> bool {
            true
        }
    }

    #[test]
    fn abandoned_sink_stops_before_first_row() {
        let raster = checker(6, 6);
        let target = OwnedPixels::from_view(raster.view().roi(0, 0, 2, 2).unwrap()).unwrap();
        let verdict = super::match_at(
            raster.view(),
            target.view(),
            Anchor::new(0, 0),
            false,
            &mut Abandoning,
        );
        assert!(!verdict.ok);
        assert_eq!(verdict.compared, 0);
    }
}
