//! Bitmap assets placed on the simulation grid.
//!
//! A bitmap is decoded with the `image` crate, converted to luminance,
//! stretched to its physical footprint (`width_mm` x `height_mm` at the
//! grid's sampling density) and centred on the grid. Pixels outside the
//! footprint are zero.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use log::warn;
use ndarray::Array2;
use thiserror::Error;

/// Errors loading a bitmap asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Image not found: {0}")]
    NotFound(PathBuf),

    #[error("Cannot decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Where and how to place a bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapSpec<'a> {
    /// Image file; empty selects a solid white footprint.
    pub image_path: &'a str,
    pub width_mm: f64,
    pub height_mm: f64,
    pub is_inverted: bool,
}

/// A bitmap resampled onto the grid.
#[derive(Debug, Clone)]
pub struct PlacedBitmap {
    /// Luminance in `[0, 1]` inside the footprint, zero outside.
    pub values: Array2<f64>,
    /// 1 inside the footprint, 0 outside.
    pub support: Array2<f64>,
}

/// Load `spec` onto a `(rows, cols)` grid with `px_per_mm` sampling.
pub fn load_bitmap(
    spec: &BitmapSpec<'_>,
    shape: (usize, usize),
    px_per_mm: f64,
) -> Result<PlacedBitmap, AssetError> {
    let footprint = footprint_px(spec, px_per_mm);
    let window = visible_window(footprint, shape);
    let luma = if spec.image_path.is_empty() {
        GrayImage::from_pixel(window.width, window.height, Luma([255]))
    } else {
        let path = Path::new(spec.image_path);
        if !path.is_file() {
            return Err(AssetError::NotFound(path.to_path_buf()));
        }
        let decoded = image::open(path).map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        resample_window(&decoded, footprint, &window)
    };
    Ok(place(&luma, spec.is_inverted, shape, &window))
}

/// Like [`load_bitmap`], but an unreadable image is replaced by a solid
/// white footprint and the reason is returned as a warning.
pub fn load_bitmap_or_white(
    spec: &BitmapSpec<'_>,
    shape: (usize, usize),
    px_per_mm: f64,
) -> (PlacedBitmap, Option<String>) {
    match load_bitmap(spec, shape, px_per_mm) {
        Ok(bitmap) => (bitmap, None),
        Err(err) => {
            let message = format!("{err}; using a solid white bitmap instead");
            warn!("{message}");
            let window = visible_window(footprint_px(spec, px_per_mm), shape);
            let luma = GrayImage::from_pixel(window.width, window.height, Luma([255]));
            (place(&luma, spec.is_inverted, shape, &window), Some(message))
        }
    }
}

/// Footprint size in pixels `(width, height)`, at least 1x1.
fn footprint_px(spec: &BitmapSpec<'_>, px_per_mm: f64) -> (u32, u32) {
    let px = |mm: f64| (mm * px_per_mm).round().clamp(1.0, u32::MAX as f64) as u32;
    (px(spec.width_mm), px(spec.height_mm))
}

/// Part of a centred footprint that lands on the grid.
#[derive(Debug, Clone, PartialEq)]
struct Window {
    /// Offset of the window inside the footprint.
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
    /// Grid cell of the window's top-left pixel.
    row: usize,
    col: usize,
}

/// Intersect a footprint centred on a `(rows, cols)` grid with the grid.
/// Never larger than the grid, so huge footprints cost no more than a
/// grid-sized buffer.
fn visible_window(footprint: (u32, u32), shape: (usize, usize)) -> Window {
    let (w, h) = (i64::from(footprint.0), i64::from(footprint.1));
    let (rows, cols) = (shape.0 as i64, shape.1 as i64);
    let row0 = (rows - h) / 2;
    let col0 = (cols - w) / 2;
    let (x0, x1) = ((-col0).max(0), (cols - col0).min(w));
    let (y0, y1) = ((-row0).max(0), (rows - row0).min(h));
    Window {
        x0: x0 as u32,
        y0: y0 as u32,
        width: (x1 - x0).max(0) as u32,
        height: (y1 - y0).max(0) as u32,
        row: (row0 + y0).max(0) as usize,
        col: (col0 + x0).max(0) as usize,
    }
}

/// Stretch `image` to `footprint` and keep only `window`. Only the source
/// pixels behind the window are resized.
fn resample_window(image: &DynamicImage, footprint: (u32, u32), window: &Window) -> GrayImage {
    if window.width == 0 || window.height == 0 {
        return GrayImage::new(0, 0);
    }
    // Source span covering footprint pixels [start, start + len).
    let span = |start: u32, len: u32, full: u32, src: u32| -> (u32, u32) {
        let scale = |v: u32| u64::from(v) * u64::from(src);
        let lo = (scale(start) / u64::from(full)) as u32;
        let hi = scale(start + len).div_ceil(u64::from(full)) as u32;
        let lo = lo.min(src.saturating_sub(1));
        (lo, hi.clamp(lo + 1, src.max(lo + 1)) - lo)
    };
    let (sx, sw) = span(window.x0, window.width, footprint.0, image.width());
    let (sy, sh) = span(window.y0, window.height, footprint.1, image.height());
    image
        .crop_imm(sx, sy, sw, sh)
        .resize_exact(window.width, window.height, FilterType::Triangle)
        .to_luma8()
}

/// Copy a window-sized `luma` onto a `(rows, cols)` grid at `window`.
fn place(luma: &GrayImage, inverted: bool, shape: (usize, usize), window: &Window) -> PlacedBitmap {
    let mut values = Array2::<f64>::zeros(shape);
    let mut support = Array2::<f64>::zeros(shape);
    for (x, y, pixel) in luma.enumerate_pixels() {
        let idx = (window.row + y as usize, window.col + x as usize);
        let v = f64::from(pixel[0]) / 255.0;
        values[idx] = if inverted { 1.0 - v } else { v };
        support[idx] = 1.0;
    }
    PlacedBitmap { values, support }
}
