//! Workspaces: a named element sequence plus the global field parameters,
//! and their JSON record.
//!
//! ```json
//! {
//!   "workspace_name": "Bench",
//!   "system_params": { "engine": "forward", "field_type": "Monochromatic",
//!                      "wavelength_nm": 633.0, "extent_x_mm": 4.0,
//!                      "extent_y_mm": 4.0, "resolution_px_per_mm": 256.0 },
//!   "elements": [ { "type": "Aperture", "name": "Aperture 1", "distance": 10.0, ... } ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Preferences;
use crate::element::{ElementDocument, ElementRecord};
use crate::naming::{self, WORKSPACE_MIN_NAME_LEN};
use crate::pipeline::SolveInput;
use crate::sequence::{ElementSequence, SequenceError};

/// Errors loading, saving or validating a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed workspace record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid element sequence: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Invalid system parameters: {0}")]
    InvalidParams(String),
}

/// Spectral content of the source field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldType {
    #[default]
    Monochromatic,
    Polychromatic,
}

/// Global field and grid parameters of a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemParams {
    /// Engine identifier, see [`crate::engine::create_engine`].
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub field_type: FieldType,
    /// Vacuum wavelength (nm).
    #[serde(default = "default_wavelength_nm")]
    pub wavelength_nm: f64,
    /// Width of the simulated window (mm).
    #[serde(default = "default_extent_mm")]
    pub extent_x_mm: f64,
    /// Height of the simulated window (mm).
    #[serde(default = "default_extent_mm")]
    pub extent_y_mm: f64,
    /// Sampling density (pixels per mm).
    #[serde(default = "default_resolution")]
    pub resolution_px_per_mm: f64,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            field_type: FieldType::Monochromatic,
            wavelength_nm: default_wavelength_nm(),
            extent_x_mm: default_extent_mm(),
            extent_y_mm: default_extent_mm(),
            resolution_px_per_mm: default_resolution(),
        }
    }
}

impl SystemParams {
    /// Check that the grid parameters describe a usable window.
    pub fn validate(&self) -> Result<(), WorkspaceError> {
        let checks = [
            ("wavelength_nm", self.wavelength_nm),
            ("extent_x_mm", self.extent_x_mm),
            ("extent_y_mm", self.extent_y_mm),
            ("resolution_px_per_mm", self.resolution_px_per_mm),
        ];
        for (field, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(WorkspaceError::InvalidParams(format!(
                    "{field} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Grid shape `(rows, cols)`, each at least one pixel.
    pub fn grid_shape(&self) -> (usize, usize) {
        let px = |extent_mm: f64| (extent_mm * self.resolution_px_per_mm).round().max(1.0) as usize;
        (px(self.extent_y_mm), px(self.extent_x_mm))
    }

    /// Sample spacing (mm).
    pub fn pixel_pitch_mm(&self) -> f64 {
        1.0 / self.resolution_px_per_mm
    }
}

fn default_engine() -> String {
    "forward".into()
}
fn default_wavelength_nm() -> f64 {
    633.0
}
fn default_extent_mm() -> f64 {
    4.0
}
fn default_resolution() -> f64 {
    256.0
}

/// Serialised workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub workspace_name: String,
    #[serde(default)]
    pub system_params: SystemParams,
    /// Elements in axis order, source excluded. Legacy key names load too.
    #[serde(default, deserialize_with = "crate::element::deserialize_documents")]
    pub elements: Vec<ElementDocument>,
}

/// A named bench: system parameters plus the element sequence.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub params: SystemParams,
    pub sequence: ElementSequence,
}

impl Workspace {
    pub fn new(name: impl Into<String>, params: SystemParams, prefs: &Preferences) -> Self {
        Self {
            name: name.into(),
            params,
            sequence: ElementSequence::new(prefs.sequence.clone(), prefs.elements.clone()),
        }
    }

    pub fn to_record(&self) -> WorkspaceRecord {
        WorkspaceRecord {
            workspace_name: self.name.clone(),
            system_params: self.params.clone(),
            elements: self.sequence.records().map(ElementRecord::export).collect(),
        }
    }

    /// Rebuild a workspace from its record. A workspace name that fails the
    /// naming rules is replaced by a sanitised variant.
    pub fn from_record(record: WorkspaceRecord, prefs: &Preferences) -> Result<Self, WorkspaceError> {
        record.system_params.validate()?;
        let records = record
            .elements
            .into_iter()
            .map(ElementRecord::from_document)
            .collect();
        let sequence =
            ElementSequence::from_records(records, prefs.sequence.clone(), prefs.elements.clone())?;

        let mut name = record.workspace_name;
        if naming::is_valid_name(&name, WORKSPACE_MIN_NAME_LEN, None).is_err() {
            let fixed = naming::suggest_unique_name(&name, []);
            warn!("workspace name '{name}' is not valid, using '{fixed}'");
            name = fixed;
        }

        Ok(Self {
            name,
            params: record.system_params,
            sequence,
        })
    }

    /// Rename this workspace if its name is already used by one of `open`.
    /// Returns whether the name changed.
    pub fn resolve_name_collision<'a, I>(&mut self, open: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique = naming::suggest_unique_name(&self.name, open);
        if unique == self.name {
            return false;
        }
        info!("workspace '{}' renamed to '{}'", self.name, unique);
        self.name = unique;
        true
    }

    pub fn load(path: &Path, prefs: &Preferences) -> Result<Self, WorkspaceError> {
        let text = fs::read_to_string(path).map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let record: WorkspaceRecord = serde_json::from_str(&text)?;
        Self::from_record(record, prefs)
    }

    pub fn save(&self, path: &Path) -> Result<(), WorkspaceError> {
        let text = serde_json::to_string_pretty(&self.to_record())?;
        fs::write(path, text).map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved workspace '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Immutable copy of everything a solve needs.
    pub fn solve_input(&self) -> SolveInput {
        SolveInput {
            workspace_name: self.name.clone(),
            params: self.params.clone(),
            elements: self.sequence.records().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;

    #[test]
    fn test_grid_shape() {
        let params = SystemParams {
            extent_x_mm: 2.0,
            extent_y_mm: 1.0,
            resolution_px_per_mm: 64.0,
            ..SystemParams::default()
        };
        assert_eq!(params.grid_shape(), (64, 128));
        assert_eq!(SystemParams::default().grid_shape(), (1024, 1024));
    }

    #[test]
    fn test_validate_rejects_zero_extent() {
        let params = SystemParams { extent_x_mm: 0.0, ..SystemParams::default() };
        assert!(matches!(params.validate(), Err(WorkspaceError::InvalidParams(_))));
    }

    #[test]
    fn test_record_roundtrip() {
        let prefs = Preferences::default();
        let mut ws = Workspace::new("Bench", SystemParams::default(), &prefs);
        ws.sequence.insert(ElementKind::Aperture);
        let lens = ws.sequence.insert(ElementKind::Lens);
        ws.sequence.insert(ElementKind::Screen);
        ws.sequence.set_focal_length(lens, 150.0).unwrap();

        let text = serde_json::to_string(&ws.to_record()).unwrap();
        let record: WorkspaceRecord = serde_json::from_str(&text).unwrap();
        let back = Workspace::from_record(record, &prefs).unwrap();
        assert_eq!(back.name, "Bench");
        assert_eq!(back.params, ws.params);
        let a: Vec<_> = ws.sequence.records().cloned().collect();
        let b: Vec<_> = back.sequence.records().cloned().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_workspace_name_is_sanitised() {
        let record = WorkspaceRecord {
            workspace_name: "my/bench".into(),
            system_params: SystemParams::default(),
            elements: Vec::new(),
        };
        let ws = Workspace::from_record(record, &Preferences::default()).unwrap();
        assert_eq!(ws.name, "my_bench_2");
    }

    #[test]
    fn test_resolve_name_collision() {
        let mut ws = Workspace::new("Bench 1", SystemParams::default(), &Preferences::default());
        assert!(!ws.resolve_name_collision(["Other"]));
        assert!(ws.resolve_name_collision(["Bench 1"]));
        assert_eq!(ws.name, "Bench 2");
    }
}
