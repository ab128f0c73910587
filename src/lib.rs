//! screenmatch locates a reference image inside a captured screen raster.
//!
//! Comparisons are exact per RGB pixel, with an optional tolerance (the share
//! of target pixels that must match) and an optional fuzzy rule that accepts a
//! pixel when one of its raster neighbors holds the exact target value. Small
//! targets are searched by sweeping tiles of candidate anchors in parallel;
//! large targets are split into blocks that are verified in parallel at each
//! candidate anchor. Ordinal requests fall back to a row-major scan.
//!
//! ```no_run
//! use screenmatch::{FixedRaster, Raster, SearchConfig, SearchCoordinator, SearchRequest, TargetImage};
//! # fn run(raster: Raster, target: TargetImage) -> screenmatch::ScreenMatchResult<()> {
//! let coordinator = SearchCoordinator::new(SearchConfig::default())?;
//! let mut screen = FixedRaster::new(raster);
//! let outcome = coordinator.locate(&mut screen, &target, &SearchRequest::new().with_tolerance(98))?;
//! if let Some(rect) = outcome.matched_rect() {
//!     println!("found at {},{}", rect.x, rect.y);
//! }
//! # Ok(())
//! # }
//! ```

mod candidate;
pub mod capture;
pub mod geometry;
pub mod image;
pub mod kernel;
pub mod lowlevel;
pub mod search;
pub mod sync;
mod trace;
pub mod util;

pub use candidate::NearMiss;
#[cfg(feature = "image-io")]
pub use capture::FileRaster;
pub use capture::{FixedRaster, RasterSequence, RasterSource};
pub use geometry::{Anchor, Rect, SearchRegion};
pub use image::{OwnedPixels, PixelView, Raster, TargetImage};
pub use kernel::ToleranceBudget;
pub use search::{
    MatchOutcome, Occurrence, SearchConfig, SearchCoordinator, SearchPhase, SearchRequest,
    Strategy,
};
pub use util::{ErrorClass, ScreenMatchError, ScreenMatchResult};
