//! Single-threaded row-major scan.

use crate::candidate::closest::ClosestTracker;
use crate::geometry::AnchorSpan;
use crate::image::PixelView;
use crate::kernel::{match_with_budget, MatchParams};
use crate::search::Pass;
use crate::sync::Hit;
use crate::trace::trace_debug;

/// Visits every anchor of `span` in row-major order and returns the
/// `ordinal`-th match (1-based).
///
/// Failed anchors feed the near-miss tracker; anchors that matched but were
/// skipped because an earlier ordinal was requested do not.
pub(crate) fn scan(
    raster: PixelView<'_>,
    target: PixelView<'_>,
    span: AnchorSpan,
    params: MatchParams,
    ordinal: usize,
) -> Pass {
    let mut remaining = ordinal.max(1);
    let mut closest = ClosestTracker::new(target.pixel_count(), params.budget.errors());
    let mut visited = 0usize;

    for anchor in span.iter() {
        visited += 1;
        let verdict = match_with_budget(raster, target, anchor, params);
        if !verdict.ok {
            closest.observe(anchor, &verdict);
            continue;
        }
        remaining -= 1;
        if remaining == 0 {
            trace_debug!("scan_hit", x = anchor.x, y = anchor.y, visited = visited);
            return Pass::hit(Hit {
                anchor,
                errors: verdict.errors,
            });
        }
    }

    trace_debug!("scan_exhausted", visited = visited, ordinal = ordinal);
    Pass::miss(closest.best())
}
