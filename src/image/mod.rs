//! Pixel grids and borrowed views.
//!
//! `PixelView` is a borrowed 2D view into an interleaved RGB buffer with an
//! explicit stride. The stride counts pixels between the starts of
//! consecutive rows, so a stride larger than the width represents padded
//! rows. ROI slices are zero-copy views into the same backing slice and keep
//! the parent stride; target blocks are handed to workers this way.

use crate::util::{ScreenMatchError, ScreenMatchResult};

mod owned;

#[cfg(feature = "image-io")]
pub mod io;

pub use owned::{OwnedPixels, Raster, TargetImage};

/// Number of color bands per pixel.
pub const BANDS: usize = 3;

/// Borrowed RGB view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct PixelView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> PixelView<'a> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [u8], width: usize, height: usize) -> ScreenMatchResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride in pixels.
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> ScreenMatchResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(ScreenMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in pixels between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns `width * height`.
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the three bands of the pixel at `(x, y)` if it is in bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; BANDS]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?.checked_mul(BANDS)?;
        let px = self.data.get(idx..idx + BANDS)?;
        Some([px[0], px[1], px[2]])
    }

    /// Returns one band of the pixel at `(x, y)`.
    pub fn sample(&self, x: usize, y: usize, band: usize) -> Option<u8> {
        if band >= BANDS {
            return None;
        }
        self.pixel(x, y).map(|px| px[band])
    }

    /// Returns the interleaved bytes of row `y` (`width * 3` long).
    pub fn row(&self, y: usize) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?.checked_mul(BANDS)?;
        let end = start.checked_add(self.width * BANDS)?;
        self.data.get(start..end)
    }

    /// Returns a zero-copy ROI view into the same backing buffer.
    pub fn roi(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> ScreenMatchResult<PixelView<'a>> {
        if width == 0 || height == 0 {
            return Err(ScreenMatchError::InvalidDimensions { width, height });
        }
        let out_of_bounds = ScreenMatchError::RoiOutOfBounds {
            x,
            y,
            width,
            height,
            img_width: self.width,
            img_height: self.height,
        };
        let end_x = x.checked_add(width).ok_or_else(|| out_of_bounds.clone())?;
        let end_y = y.checked_add(height).ok_or_else(|| out_of_bounds.clone())?;
        if end_x > self.width || end_y > self.height {
            return Err(out_of_bounds);
        }

        let start = (y * self.stride + x) * BANDS;
        let data = self
            .data
            .get(start..)
            .ok_or(ScreenMatchError::BufferTooSmall {
                needed: start.saturating_add(BANDS),
                got: self.data.len(),
            })?;
        PixelView::new(data, width, height, self.stride)
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> ScreenMatchResult<usize> {
    if width == 0 || height == 0 {
        return Err(ScreenMatchError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(ScreenMatchError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .and_then(|v| v.checked_mul(BANDS))
        .ok_or(ScreenMatchError::InvalidDimensions { width, height })
}
