//! Error types for screenmatch.
//!
//! A search that simply does not find its target is not an error; it yields a
//! [`MatchOutcome`](crate::MatchOutcome) with `matched == false`. The variants
//! here cover inputs rejected before any worker starts and failures of the
//! capture and codec collaborators.

use thiserror::Error;

/// Result alias for screenmatch operations.
pub type ScreenMatchResult<T> = std::result::Result<T, ScreenMatchError>;

/// Errors that can occur when preparing or running a search.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScreenMatchError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Width or height is zero or overflows.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The row stride (in pixels) is smaller than the width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer is too small for the declared geometry.
    #[error("buffer too small: needed {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A sub-view does not fit inside its parent view.
    #[error("roi ({x},{y} {width}x{height}) outside {img_width}x{img_height} image")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// The search region has no overlap with the raster.
    #[error(
        "search region ({x},{y} {width}x{height}) has no area inside the {raster_width}x{raster_height} raster"
    )]
    RegionOutsideRaster {
        x: isize,
        y: isize,
        width: usize,
        height: usize,
        raster_width: usize,
        raster_height: usize,
    },
    /// The target cannot fit inside the raster at any anchor.
    #[error("target {target_width}x{target_height} is larger than the {raster_width}x{raster_height} raster")]
    TargetLargerThanRaster {
        target_width: usize,
        target_height: usize,
        raster_width: usize,
        raster_height: usize,
    },
    /// Tolerance percentages must lie in `0..=100`.
    #[error("tolerance percent {percent} is outside 0..=100")]
    InvalidTolerance { percent: u8 },
    /// The worker pool could not be created.
    #[error("worker pool: {reason}")]
    WorkerPool { reason: String },
    /// The capture collaborator failed to deliver a raster.
    #[error("capture failed: {reason}")]
    Capture { reason: String },
    /// An image file could not be decoded.
    #[error("codec error: {reason}")]
    Codec { reason: String },
    /// A filesystem operation failed while loading images.
    #[error("io error: {reason}")]
    Io { reason: String },
}

/// Coarse classification of [`ScreenMatchError`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any worker was spawned; retrying cannot help.
    Configuration,
    /// The screen capture collaborator failed.
    Capture,
    /// Decoding or reading an image failed.
    Codec,
}

impl ScreenMatchError {
    /// Returns the class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Capture { .. } => ErrorClass::Capture,
            Self::Codec { .. } | Self::Io { .. } => ErrorClass::Codec,
            Self::InvalidInput(_)
            | Self::InvalidDimensions { .. }
            | Self::InvalidStride { .. }
            | Self::BufferTooSmall { .. }
            | Self::RoiOutOfBounds { .. }
            | Self::RegionOutsideRaster { .. }
            | Self::TargetLargerThanRaster { .. }
            | Self::InvalidTolerance { .. }
            | Self::WorkerPool { .. } => ErrorClass::Configuration,
        }
    }
}
