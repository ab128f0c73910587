//! Loading targets and rasters through the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Every decoded image is
//! converted to 8-bit RGB; alpha is discarded.

use crate::image::{OwnedPixels, Raster, TargetImage};
use crate::util::{ScreenMatchError, ScreenMatchResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Creates an owned buffer from an RGB image.
pub fn owned_from_rgb_image(img: &image::RgbImage) -> ScreenMatchResult<OwnedPixels> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    OwnedPixels::new(img.as_raw().clone(), width, height)
}

/// Creates an owned buffer from any decoded image.
pub fn owned_from_dynamic_image(img: &image::DynamicImage) -> ScreenMatchResult<OwnedPixels> {
    owned_from_rgb_image(&img.to_rgb8())
}

fn decode(path: &Path) -> ScreenMatchResult<OwnedPixels> {
    let img = image::open(path).map_err(|err| match err {
        image::ImageError::IoError(io) => ScreenMatchError::Io {
            reason: format!("{}: {io}", path.display()),
        },
        other => ScreenMatchError::Codec {
            reason: format!("{}: {other}", path.display()),
        },
    })?;
    owned_from_dynamic_image(&img)
}

/// Loads a single target image, named after its file.
pub fn load_target<P: AsRef<Path>>(path: P) -> ScreenMatchResult<TargetImage> {
    let path = path.as_ref();
    let pixels = decode(path)?;
    Ok(TargetImage::new(pixels).with_name(path.display().to_string()))
}

/// Loads every decodable image in `dir`, sorted by file name.
///
/// Files that fail to decode are skipped; an empty result is reported as an
/// error because there is nothing to search for.
pub fn load_targets<P: AsRef<Path>>(dir: P) -> ScreenMatchResult<Vec<TargetImage>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|err| ScreenMatchError::Io {
        reason: format!("{}: {err}", dir.display()),
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let targets: Vec<TargetImage> = paths.iter().filter_map(|p| load_target(p).ok()).collect();
    if targets.is_empty() {
        return Err(ScreenMatchError::Codec {
            reason: format!("{}: no decodable images", dir.display()),
        });
    }
    Ok(targets)
}

/// Loads either one target file or every target in a directory.
pub fn load_targets_from<P: AsRef<Path>>(path: P) -> ScreenMatchResult<Vec<TargetImage>> {
    let path = path.as_ref();
    if path.is_dir() {
        load_targets(path)
    } else {
        load_target(path).map(|t| vec![t])
    }
}

/// Decodes a screenshot file into a raster.
pub fn raster_from_path<P: AsRef<Path>>(path: P) -> ScreenMatchResult<Raster> {
    decode(path.as_ref()).map(Raster::new)
}

/// Writes a pixel buffer to disk; the format follows the file extension.
pub fn save_pixels<P: AsRef<Path>>(pixels: &OwnedPixels, path: P) -> ScreenMatchResult<()> {
    let path = path.as_ref();
    let img = image::RgbImage::from_raw(
        pixels.width() as u32,
        pixels.height() as u32,
        pixels.data().to_vec(),
    )
    .ok_or(ScreenMatchError::InvalidDimensions {
        width: pixels.width(),
        height: pixels.height(),
    })?;
    img.save(path).map_err(|err| ScreenMatchError::Codec {
        reason: format!("{}: {err}", path.display()),
    })
}
