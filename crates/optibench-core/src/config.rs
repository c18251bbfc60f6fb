//! User preferences that shape editing and solving.
//!
//! Every field has a default, so a partial TOML table such as
//!
//! ```toml
//! [sequence]
//! default_offset_mm = 25.0
//! ```
//!
//! deserialises into a complete [`Preferences`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::element::RetrievalMethod;

/// Top-level preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub sequence: SequenceSettings,
    #[serde(default)]
    pub elements: ElementDefaults,
    #[serde(default)]
    pub output: OutputSettings,
}

/// Behaviour of the element sequence editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSettings {
    /// Spacing (mm) between the last element and a newly inserted one.
    #[serde(default = "default_offset_mm")]
    pub default_offset_mm: f64,
    /// Rename default-named elements when their kind changes.
    #[serde(default = "default_true")]
    pub rename_on_type_change: bool,
    /// Minimum length of an element name.
    #[serde(default = "default_element_min_name_len")]
    pub element_min_name_len: usize,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            default_offset_mm: default_offset_mm(),
            rename_on_type_change: true,
            element_min_name_len: default_element_min_name_len(),
        }
    }
}

/// Payload values given to freshly inserted or re-typed elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefaults {
    #[serde(default = "default_focal_length_mm")]
    pub lens_focal_length_mm: f64,
    #[serde(default = "default_size_mm")]
    pub aperture_width_mm: f64,
    #[serde(default = "default_size_mm")]
    pub aperture_height_mm: f64,
    /// Bitmap for new apertures and targets. Empty means solid white.
    #[serde(default)]
    pub image_path: String,
    /// Step count applied when a collapsed screen range is opened.
    #[serde(default = "default_screen_steps")]
    pub screen_steps: u32,
    #[serde(default = "default_retrieval_maxiter")]
    pub retrieval_maxiter: u32,
    #[serde(default)]
    pub retrieval_padding: u32,
    #[serde(default)]
    pub retrieval_method: RetrievalMethod,
}

impl Default for ElementDefaults {
    fn default() -> Self {
        Self {
            lens_focal_length_mm: default_focal_length_mm(),
            aperture_width_mm: default_size_mm(),
            aperture_height_mm: default_size_mm(),
            image_path: String::new(),
            screen_steps: default_screen_steps(),
            retrieval_maxiter: default_retrieval_maxiter(),
            retrieval_padding: 0,
            retrieval_method: RetrievalMethod::default(),
        }
    }
}

impl ElementDefaults {
    /// Size new apertures to cover the whole simulated window.
    pub fn sized_to_extent(mut self, extent_x_mm: f64, extent_y_mm: f64) -> Self {
        self.aperture_width_mm = extent_x_mm;
        self.aperture_height_mm = extent_y_mm;
        self
    }
}

/// Where and how solve artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Root directory; each workspace writes under `<root_dir>/<workspace>`.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Keep earlier runs by writing each solve into a timestamped subdirectory.
    #[serde(default)]
    pub retain_previous_runs: bool,
    /// Assemble a GIF for every screen range with two or more frames.
    #[serde(default = "default_true")]
    pub auto_animate: bool,
    #[serde(default = "default_frame_delay_ms")]
    pub animation_frame_delay_ms: u32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            retain_previous_runs: false,
            auto_animate: true,
            animation_frame_delay_ms: default_frame_delay_ms(),
        }
    }
}

fn default_offset_mm() -> f64 {
    10.0
}
fn default_true() -> bool {
    true
}
fn default_element_min_name_len() -> usize {
    1
}
fn default_focal_length_mm() -> f64 {
    1000.0
}
fn default_size_mm() -> f64 {
    1.0
}
fn default_screen_steps() -> u32 {
    10
}
fn default_retrieval_maxiter() -> u32 {
    200
}
fn default_root_dir() -> PathBuf {
    PathBuf::from("simulation_results")
}
fn default_frame_delay_ms() -> u32 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_fills_defaults() {
        let prefs: Preferences = toml::from_str(
            r#"
            [sequence]
            default_offset_mm = 25.0

            [output]
            retain_previous_runs = true
            "#,
        )
        .unwrap();
        assert_eq!(prefs.sequence.default_offset_mm, 25.0);
        assert!(prefs.sequence.rename_on_type_change);
        assert_eq!(prefs.elements.lens_focal_length_mm, 1000.0);
        assert!(prefs.output.retain_previous_runs);
        assert_eq!(prefs.output.animation_frame_delay_ms, 120);
    }

    #[test]
    fn test_empty_document_is_default() {
        let prefs: Preferences = toml::from_str("").unwrap();
        assert_eq!(prefs, Preferences::default());
    }
}
