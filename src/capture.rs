//! Raster sources the coordinator re-captures between attempts.
//!
//! The coordinator never talks to a display directly. It asks a
//! [`RasterSource`] for a fresh raster before each attempt; platform screen
//! grabbers plug in by implementing the trait or by passing a closure.

use crate::geometry::SearchRegion;
use crate::image::Raster;
use crate::util::{ScreenMatchError, ScreenMatchResult};
use std::collections::VecDeque;

/// Produces a raster for one search attempt.
pub trait RasterSource {
    /// Captures the current screen.
    ///
    /// `region` is the area the search will look at. Implementations may use
    /// it to refresh less, but the returned raster must stay in full screen
    /// coordinates. Failures should be reported as
    /// [`ScreenMatchError::Capture`].
    fn capture(&mut self, region: Option<SearchRegion>) -> ScreenMatchResult<Raster>;
}

impl<F> RasterSource for F
where
    F: FnMut(Option<SearchRegion>) -> ScreenMatchResult<Raster>,
{
    fn capture(&mut self, region: Option<SearchRegion>) -> ScreenMatchResult<Raster> {
        self(region)
    }
}

/// Source that hands out the same raster on every capture.
#[derive(Clone, Debug)]
pub struct FixedRaster {
    raster: Raster,
    captures: usize,
}

impl FixedRaster {
    pub fn new(raster: Raster) -> Self {
        Self {
            raster,
            captures: 0,
        }
    }

    /// Number of captures served so far.
    pub fn captures(&self) -> usize {
        self.captures
    }
}

impl RasterSource for FixedRaster {
    fn capture(&mut self, _region: Option<SearchRegion>) -> ScreenMatchResult<Raster> {
        self.captures += 1;
        Ok(self.raster.clone())
    }
}

/// Source that replays a scripted list of frames.
///
/// Once the script runs out the last frame repeats. An empty script fails
/// every capture.
#[derive(Clone, Debug, Default)]
pub struct RasterSequence {
    frames: VecDeque<Raster>,
    last: Option<Raster>,
}

impl RasterSequence {
    pub fn new<I: IntoIterator<Item = Raster>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            last: None,
        }
    }

    /// Frames not yet handed out.
    pub fn pending(&self) -> usize {
        self.frames.len()
    }
}

impl RasterSource for RasterSequence {
    fn capture(&mut self, _region: Option<SearchRegion>) -> ScreenMatchResult<Raster> {
        if let Some(frame) = self.frames.pop_front() {
            self.last = Some(frame.clone());
            return Ok(frame);
        }
        self.last.clone().ok_or_else(|| ScreenMatchError::Capture {
            reason: "raster sequence is empty".into(),
        })
    }
}

/// Source that re-reads a screenshot file on every capture.
#[cfg(feature = "image-io")]
#[derive(Clone, Debug)]
pub struct FileRaster {
    path: std::path::PathBuf,
}

#[cfg(feature = "image-io")]
impl FileRaster {
    pub fn new<P: Into<std::path::PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(feature = "image-io")]
impl RasterSource for FileRaster {
    fn capture(&mut self, _region: Option<SearchRegion>) -> ScreenMatchResult<Raster> {
        crate::image::io::raster_from_path(&self.path).map_err(|err| ScreenMatchError::Capture {
            reason: err.to_string(),
        })
    }
}
