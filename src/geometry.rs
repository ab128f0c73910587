//! Anchors, search regions and the rectangular spans workers sweep.

use crate::util::math::split_even;
use crate::util::{ScreenMatchError, ScreenMatchResult};

/// Top-left raster coordinate at which a target is tested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Anchor {
    pub x: usize,
    pub y: usize,
}

impl Anchor {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns this anchor shifted by `(dx, dy)`.
    pub const fn offset(self, dx: usize, dy: usize) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Rectangle in raster coordinates, fully inside some raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    pub const fn right(&self) -> usize {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    pub const fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Anchors at which a `tw x th` target lies entirely inside this rect.
    pub fn anchor_span(&self, tw: usize, th: usize) -> Option<AnchorSpan> {
        if tw == 0 || th == 0 || tw > self.width || th > self.height {
            return None;
        }
        Some(AnchorSpan {
            x0: self.x,
            y0: self.y,
            x1: self.right() - tw,
            y1: self.bottom() - th,
        })
    }
}

/// Requested search rectangle; the origin may lie outside the raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchRegion {
    pub x: isize,
    pub y: isize,
    pub width: usize,
    pub height: usize,
}

impl SearchRegion {
    /// Creates a region; width and height must be at least 1.
    pub fn new(x: isize, y: isize, width: usize, height: usize) -> ScreenMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScreenMatchError::InvalidDimensions { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Region covering a whole `width x height` raster.
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Intersects the region with a `raster_width x raster_height` raster.
    ///
    /// Returns `RegionOutsideRaster` when nothing is left.
    pub fn clip(&self, raster_width: usize, raster_height: usize) -> ScreenMatchResult<Rect> {
        let outside = ScreenMatchError::RegionOutsideRaster {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            raster_width,
            raster_height,
        };
        let (x0, x1) = clip_axis(self.x, self.width, raster_width).ok_or_else(|| outside.clone())?;
        let (y0, y1) = clip_axis(self.y, self.height, raster_height).ok_or(outside)?;
        Ok(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

fn clip_axis(origin: isize, len: usize, bound: usize) -> Option<(usize, usize)> {
    let end = origin.saturating_add(isize::try_from(len).unwrap_or(isize::MAX));
    let lo = origin.max(0) as usize;
    let hi = if end <= 0 { 0 } else { (end as usize).min(bound) };
    (hi > lo).then_some((lo, hi))
}

/// Inclusive rectangle of anchors, visited in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnchorSpan {
    pub(crate) x0: usize,
    pub(crate) y0: usize,
    pub(crate) x1: usize,
    pub(crate) y1: usize,
}

impl AnchorSpan {
    /// Span from `first` to `last` inclusive; `None` if `last` precedes
    /// `first` on either axis.
    pub fn new(first: Anchor, last: Anchor) -> Option<Self> {
        (first.x <= last.x && first.y <= last.y).then_some(Self {
            x0: first.x,
            y0: first.y,
            x1: last.x,
            y1: last.y,
        })
    }

    /// Number of anchors in the span.
    pub fn len(&self) -> usize {
        (self.x1 - self.x0 + 1) * (self.y1 - self.y0 + 1)
    }

    /// Spans always hold at least one anchor.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> Anchor {
        Anchor::new(self.x0, self.y0)
    }

    pub fn last(&self) -> Anchor {
        Anchor::new(self.x1, self.y1)
    }

    pub fn contains(&self, a: Anchor) -> bool {
        (self.x0..=self.x1).contains(&a.x) && (self.y0..=self.y1).contains(&a.y)
    }

    /// Next anchor after `a` in row-major order, if any.
    pub fn after(&self, a: Anchor) -> Option<Anchor> {
        if a.x < self.x1 {
            Some(Anchor::new(a.x + 1, a.y))
        } else if a.y < self.y1 {
            Some(Anchor::new(self.x0, a.y + 1))
        } else {
            None
        }
    }

    /// Iterates anchors starting at `from` (inclusive) in row-major order.
    pub fn iter_from(&self, from: Anchor) -> impl Iterator<Item = Anchor> + '_ {
        std::iter::successors(Some(from).filter(|a| self.contains(*a)), move |a| self.after(*a))
    }

    /// Iterates every anchor in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Anchor> + '_ {
        self.iter_from(self.first())
    }

    /// Splits the span into up to `pieces x pieces` non-empty tiles.
    ///
    /// Tiles are listed row by row; together they cover the span exactly.
    pub fn tiles(&self, pieces: usize) -> Vec<AnchorSpan> {
        let cols = split_even(self.x0, self.x1 - self.x0 + 1, pieces);
        let rows = split_even(self.y0, self.y1 - self.y0 + 1, pieces);
        let mut out = Vec::with_capacity(cols.len() * rows.len());
        for &(y, h) in &rows {
            for &(x, w) in &cols {
                out.push(AnchorSpan {
                    x0: x,
                    y0: y,
                    x1: x + w - 1,
                    y1: y + h - 1,
                });
            }
        }
        out
    }
}

/// Splits a `width x height` grid into up to `pieces x pieces` blocks.
pub(crate) fn blocks(width: usize, height: usize, pieces: usize) -> Vec<Rect> {
    let cols = split_even(0, width, pieces);
    let rows = split_even(0, height, pieces);
    let mut out = Vec::with_capacity(cols.len() * rows.len());
    for &(y, h) in &rows {
        for &(x, w) in &cols {
            out.push(Rect::new(x, y, w, h));
        }
    }
    out
}
