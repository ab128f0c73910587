//! Owned pixel buffers and the two roles they play in a search.

use crate::image::{PixelView, BANDS};
use crate::util::{ScreenMatchError, ScreenMatchResult};

/// Owned contiguous RGB buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedPixels {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedPixels {
    /// Wraps an interleaved RGB buffer of exactly `width * height * 3` bytes.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> ScreenMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScreenMatchError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(BANDS))
            .ok_or(ScreenMatchError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(ScreenMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(ScreenMatchError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Creates a buffer where every pixel is `fill`.
    pub fn filled(width: usize, height: usize, fill: [u8; BANDS]) -> ScreenMatchResult<Self> {
        Self::from_fn(width, height, |_, _| fill)
    }

    /// Creates a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> ScreenMatchResult<Self>
    where
        F: FnMut(usize, usize) -> [u8; BANDS],
    {
        let len = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(BANDS))
            .ok_or(ScreenMatchError::InvalidDimensions { width, height })?;
        let mut data = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::new(data, width, height)
    }

    /// Copies a view into a new contiguous buffer.
    pub fn from_view(view: PixelView<'_>) -> ScreenMatchResult<Self> {
        let width = view.width();
        let height = view.height();
        let mut data = Vec::with_capacity(width * height * BANDS);
        for y in 0..height {
            let row = view.row(y).ok_or(ScreenMatchError::BufferTooSmall {
                needed: (y + 1) * view.stride() * BANDS,
                got: view.as_slice().len(),
            })?;
            data.extend_from_slice(row);
        }
        Self::new(data, width, height)
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the interleaved RGB bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns a borrowed view of the whole buffer.
    pub fn view(&self) -> PixelView<'_> {
        PixelView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Overwrites the pixel at `(x, y)`.
    pub fn set_pixel(&mut self, x: usize, y: usize, px: [u8; BANDS]) -> ScreenMatchResult<()> {
        if x >= self.width || y >= self.height {
            return Err(ScreenMatchError::RoiOutOfBounds {
                x,
                y,
                width: 1,
                height: 1,
                img_width: self.width,
                img_height: self.height,
            });
        }
        let idx = (y * self.width + x) * BANDS;
        self.data[idx..idx + BANDS].copy_from_slice(&px);
        Ok(())
    }

    /// Copies `src` into this buffer with its top-left corner at `(x, y)`.
    pub fn blit(&mut self, src: PixelView<'_>, x: usize, y: usize) -> ScreenMatchResult<()> {
        let fits = x
            .checked_add(src.width())
            .zip(y.checked_add(src.height()))
            .is_some_and(|(ex, ey)| ex <= self.width && ey <= self.height);
        if !fits {
            return Err(ScreenMatchError::RoiOutOfBounds {
                x,
                y,
                width: src.width(),
                height: src.height(),
                img_width: self.width,
                img_height: self.height,
            });
        }
        let row_len = src.width() * BANDS;
        for sy in 0..src.height() {
            let Some(row) = src.row(sy) else {
                break;
            };
            let start = ((y + sy) * self.width + x) * BANDS;
            self.data[start..start + row_len].copy_from_slice(row);
        }
        Ok(())
    }
}

/// One captured snapshot of the screen (or any larger pixel grid).
///
/// Rasters are never mutated once a search starts; every worker of a cohort
/// reads the same buffer without locking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pixels: OwnedPixels,
}

impl Raster {
    /// Wraps an owned buffer as a raster.
    pub fn new(pixels: OwnedPixels) -> Self {
        Self { pixels }
    }

    /// Builds a raster from interleaved RGB bytes.
    pub fn from_rgb(data: Vec<u8>, width: usize, height: usize) -> ScreenMatchResult<Self> {
        OwnedPixels::new(data, width, height).map(Self::new)
    }

    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    pub fn view(&self) -> PixelView<'_> {
        self.pixels.view()
    }

    pub fn pixels(&self) -> &OwnedPixels {
        &self.pixels
    }

    pub fn into_pixels(self) -> OwnedPixels {
        self.pixels
    }
}

impl From<OwnedPixels> for Raster {
    fn from(pixels: OwnedPixels) -> Self {
        Self::new(pixels)
    }
}

/// The reference image being searched for.
///
/// Targets are typically loaded once and reused across many attempts, so
/// they carry an optional name (usually the source file) for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetImage {
    pixels: OwnedPixels,
    name: Option<String>,
}

impl TargetImage {
    /// Wraps an owned buffer as an unnamed target.
    pub fn new(pixels: OwnedPixels) -> Self {
        Self { pixels, name: None }
    }

    /// Builds a target from interleaved RGB bytes.
    pub fn from_rgb(data: Vec<u8>, width: usize, height: usize) -> ScreenMatchResult<Self> {
        OwnedPixels::new(data, width, height).map(Self::new)
    }

    /// Attaches a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    /// Returns `width * height`.
    pub fn pixel_count(&self) -> usize {
        self.pixels.width() * self.pixels.height()
    }

    pub fn view(&self) -> PixelView<'_> {
        self.pixels.view()
    }

    pub fn pixels(&self) -> &OwnedPixels {
        &self.pixels
    }
}

impl From<OwnedPixels> for TargetImage {
    fn from(pixels: OwnedPixels) -> Self {
        Self::new(pixels)
    }
}
