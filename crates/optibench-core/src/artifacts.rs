//! Solve artifacts on disk: output directory, frame images, range
//! animations and the metadata document.
//!
//! Every file is written to a temporary sibling and renamed into place, so
//! a reader never observes a partially written image under its final name.

use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, ImageFormat};
use log::{debug, info, warn};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::engine::Frame;
use crate::naming::slugify;

/// Name of the per-run metadata document.
pub const METADATA_FILE: &str = "metadata.json";

/// Errors writing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Cannot serialise {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ArtifactError {
    pub fn path(&self) -> &Path {
        match self {
            ArtifactError::Io { path, .. }
            | ArtifactError::Encode { path, .. }
            | ArtifactError::Json { path, .. } => path,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `{slug}_{distance:.2}_mm.png`, or `..._slice_{index:03}.png` for a range slice.
pub fn frame_filename(name: &str, distance_mm: f64, slice_index: Option<u32>) -> String {
    let slug = slugify(name);
    match slice_index {
        Some(index) => format!("{slug}_{distance_mm:.2}_mm_slice_{index:03}.png"),
        None => format!("{slug}_{distance_mm:.2}_mm.png"),
    }
}

/// `{slug}_{start:.2}_to_{end:.2}_mm_steps_{steps}.gif`.
pub fn animation_filename(name: &str, start_mm: f64, end_mm: f64, steps: u32) -> String {
    format!(
        "{}_{start_mm:.2}_to_{end_mm:.2}_mm_steps_{steps}.gif",
        slugify(name)
    )
}

/// File names already used by one solve.
///
/// Distinct element names can share a slug ("Screen 1" and "Screen_1"),
/// so a later file with a taken name gets a `_2`, `_3`, ... suffix before
/// its extension instead of overwriting the earlier one.
#[derive(Debug)]
pub struct FileNames {
    taken: HashSet<String>,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            taken: HashSet::from([METADATA_FILE.to_string()]),
        }
    }
}

impl FileNames {
    /// Reserve `filename`, or the first free suffixed variant of it.
    pub fn claim(&mut self, filename: String) -> String {
        if self.taken.insert(filename.clone()) {
            return filename;
        }
        let (stem, ext) = match filename.rfind('.') {
            Some(dot) => filename.split_at(dot),
            None => (filename.as_str(), ""),
        };
        let unique = (2..)
            .map(|n| format!("{stem}_{n}{ext}"))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or_default();
        self.taken.insert(unique.clone());
        unique
    }
}

/// Create the directory a solve writes into.
///
/// With `retain` every solve gets a fresh timestamped subdirectory of
/// `<root>/<workspace>`. Otherwise `<root>/<workspace>` itself is used and
/// the images, animations and metadata of the previous run are removed
/// first. Subdirectories are left alone.
pub fn prepare_output_dir(
    root: &Path,
    workspace_name: &str,
    retain: bool,
    now: DateTime<Local>,
) -> Result<PathBuf, ArtifactError> {
    let folder = if workspace_name.trim().is_empty() {
        "workspace"
    } else {
        workspace_name
    };
    let base = root.join(folder);
    let dir = if retain {
        base.join(now.format("%Y%m%d_%H%M%S_%3f").to_string())
    } else {
        base
    };
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    if !retain {
        clear_previous_run(&dir)?;
    }
    Ok(dir)
}

fn clear_previous_run(dir: &Path) -> Result<(), ArtifactError> {
    let entries = fs::read_dir(dir).map_err(io_error(dir))?;
    for entry in entries {
        let path = entry.map_err(io_error(dir))?.path();
        if !path.is_file() {
            continue;
        }
        let is_artifact = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png") || e.eq_ignore_ascii_case("gif"))
            || path.file_name().is_some_and(|n| n == METADATA_FILE);
        if is_artifact {
            debug!("removing previous artifact {}", path.display());
            if let Err(err) = fs::remove_file(&path) {
                warn!("could not remove {}: {err}", path.display());
            }
        }
    }
    Ok(())
}

/// Run `write` against a temporary file next to `path`, then move it into place.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), ArtifactError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), ArtifactError>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    write(&mut tmp)?;
    tmp.as_file().sync_all().map_err(io_error(path))?;
    tmp.persist(path).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

pub fn write_png(path: &Path, frame: &Frame) -> Result<(), ArtifactError> {
    let image = DynamicImage::ImageRgb8(frame.to_image());
    write_atomic(path, |tmp| {
        image
            .write_to(tmp, ImageFormat::Png)
            .map_err(|source| ArtifactError::Encode {
                path: path.to_path_buf(),
                source,
            })
    })?;
    info!("saved screen image {}", path.display());
    Ok(())
}

/// Looping GIF of `frames` with `delay_ms` between frames.
pub fn write_gif(path: &Path, frames: &[&Frame], delay_ms: u32) -> Result<(), ArtifactError> {
    let encode_err = |source| ArtifactError::Encode {
        path: path.to_path_buf(),
        source,
    };
    write_atomic(path, |tmp| {
        let mut encoder = GifEncoder::new_with_speed(BufWriter::new(tmp), 10);
        encoder.set_repeat(Repeat::Infinite).map_err(encode_err)?;
        for frame in frames {
            let rgba = DynamicImage::ImageRgb8(frame.to_image()).to_rgba8();
            let delay = Delay::from_numer_denom_ms(delay_ms, 1);
            encoder
                .encode_frame(image::Frame::from_parts(rgba, 0, 0, delay))
                .map_err(encode_err)?;
        }
        Ok(())
    })?;
    info!("saved animation {} ({} frames)", path.display(), frames.len());
    Ok(())
}

/// Pretty-printed JSON document.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, |tmp| {
        tmp.write_all(text.as_bytes()).map_err(io_error(path))?;
        tmp.write_all(b"\n").map_err(io_error(path))
    })?;
    info!("metadata saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filenames() {
        assert_eq!(frame_filename("Screen 1", 10.0, None), "Screen_1_10.00_mm.png");
        assert_eq!(frame_filename("Screen 1", 16.428571, Some(2)), "Screen_1_16.43_mm_slice_002.png");
        assert_eq!(
            animation_filename("Screen 1", 10.0, 100.0, 15),
            "Screen_1_10.00_to_100.00_mm_steps_15.gif"
        );
    }

    #[test]
    fn test_colliding_filenames_get_suffixes() {
        let mut names = FileNames::default();
        let first = frame_filename("Screen 1", 30.0, None);
        let second = frame_filename("Screen_1", 30.0, None);
        assert_eq!(first, second);
        assert_eq!(names.claim(first), "Screen_1_30.00_mm.png");
        assert_eq!(names.claim(second), "Screen_1_30.00_mm_2.png");
        assert_eq!(names.claim("Screen_1_30.00_mm.png".into()), "Screen_1_30.00_mm_3.png");
        assert_eq!(names.claim(METADATA_FILE.into()), "metadata_2.json");
    }

    #[test]
    fn test_prepare_clears_previous_run() {
        let root = TempDir::new().unwrap();
        let dir = prepare_output_dir(root.path(), "Bench", false, Local::now()).unwrap();
        fs::write(dir.join("old.png"), b"x").unwrap();
        fs::write(dir.join("old.gif"), b"x").unwrap();
        fs::write(dir.join(METADATA_FILE), b"{}").unwrap();
        fs::write(dir.join("notes.txt"), b"keep").unwrap();
        fs::create_dir(dir.join("20240101_000000_000")).unwrap();

        let again = prepare_output_dir(root.path(), "Bench", false, Local::now()).unwrap();
        assert_eq!(again, dir);
        let mut left: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["20240101_000000_000", "notes.txt"]);
    }

    #[test]
    fn test_prepare_retain_uses_fresh_subdir() {
        let root = TempDir::new().unwrap();
        let base = prepare_output_dir(root.path(), "Bench", false, Local::now()).unwrap();
        fs::write(base.join("old.png"), b"x").unwrap();
        let dir = prepare_output_dir(root.path(), "Bench", true, Local::now()).unwrap();
        assert_eq!(dir.parent().unwrap(), base);
        assert!(base.join("old.png").exists());
    }

    #[test]
    fn test_png_and_gif_are_readable() {
        let dir = TempDir::new().unwrap();
        let frame = crate::engine::bitmap::radial_gradient(6, 4);
        let png = dir.path().join("f.png");
        write_png(&png, &frame).unwrap();
        let decoded = image::open(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 6));

        let gif = dir.path().join("a.gif");
        write_gif(&gif, &[&frame, &frame], 120).unwrap();
        let decoded = image::open(&gif).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 6));

        // Only the two artifacts remain; no temporary files are left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_unwritable_root_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let err = prepare_output_dir(&blocker, "Bench", false, Local::now()).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
