//! Neighborhood rescue for single mismatched pixels.

use crate::image::{PixelView, BANDS};

/// Returns `true` if any of the 8 in-bounds neighbors of `(cx, cy)` equals `want`.
///
/// The center pixel is not examined; callers only get here after it failed.
pub fn neighbor_matches(raster: PixelView<'_>, cx: usize, cy: usize, want: [u8; BANDS]) -> bool {
    let y_lo = cy.saturating_sub(1);
    let y_hi = (cy + 1).min(raster.height().saturating_sub(1));
    let x_lo = cx.saturating_sub(1);
    let x_hi = (cx + 1).min(raster.width().saturating_sub(1));

    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            if x == cx && y == cy {
                continue;
            }
            if raster.pixel(x, y) == Some(want) {
                return true;
            }
        }
    }
    false
}
