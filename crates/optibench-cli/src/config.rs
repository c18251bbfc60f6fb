//! TOML job files.
//!
//! A job either points at a saved workspace:
//!
//! ```toml
//! workspace_file = "bench.json"
//! ```
//!
//! or describes the bench inline with a `[system]` table and `[[element]]`
//! entries using the same keys as the workspace JSON record. Optional
//! `[preferences]`, `[compute]` and `[output]` tables refine the run.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use optibench_core::config::{OutputSettings, Preferences};
use optibench_core::element::ElementRecord;
use optibench_core::workspace::{SystemParams, Workspace, WorkspaceRecord};

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    /// Workspace name for an inline bench (default: "Workspace").
    #[serde(default = "default_name")]
    pub name: String,
    /// Saved workspace JSON, relative to the job file.
    #[serde(default)]
    pub workspace_file: Option<PathBuf>,
    #[serde(default)]
    pub system: Option<SystemParams>,
    #[serde(default, rename = "element")]
    pub elements: Vec<toml::Value>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub compute: ComputeConfig,
    /// Overrides `[preferences.output]`.
    #[serde(default)]
    pub output: Option<OutputSettings>,
}

fn default_name() -> String {
    "Workspace".into()
}

/// Compute backend selection.
#[derive(Debug, Deserialize)]
pub struct ComputeConfig {
    /// "cpu" (Rayon) or "serial". Default: "cpu".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Worker threads for the CPU backend (default: all cores).
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            threads: None,
        }
    }
}

fn default_backend() -> String {
    "cpu".into()
}

/// A parsed job with paths resolved against its file.
#[derive(Debug)]
pub struct Job {
    pub config: JobConfig,
    pub base_dir: PathBuf,
}

impl Job {
    /// Preferences with `[output]` applied and aperture defaults sized to
    /// the workspace extent unless set explicitly.
    pub fn preferences(&self, params: &SystemParams) -> Preferences {
        let mut prefs = self.config.preferences.clone();
        if let Some(output) = &self.config.output {
            prefs.output = output.clone();
        }
        let defaults = optibench_core::config::ElementDefaults::default();
        if prefs.elements.aperture_width_mm == defaults.aperture_width_mm
            && prefs.elements.aperture_height_mm == defaults.aperture_height_mm
        {
            prefs.elements = prefs
                .elements
                .sized_to_extent(params.extent_x_mm, params.extent_y_mm);
        }
        if prefs.output.root_dir.is_relative() {
            prefs.output.root_dir = self.base_dir.join(&prefs.output.root_dir);
        }
        prefs
    }

    /// Build the workspace the job describes.
    pub fn workspace(&self) -> Result<(Workspace, Preferences)> {
        let job = &self.config;
        if let Some(file) = &job.workspace_file {
            if job.system.is_some() || !job.elements.is_empty() {
                bail!("Use either 'workspace_file' or an inline [system]/[[element]] bench, not both");
            }
            let path = self.base_dir.join(file);
            // Load once with plain preferences to learn the extent.
            let initial = Workspace::load(&path, &job.preferences)
                .with_context(|| format!("Failed to load workspace {}", path.display()))?;
            let prefs = self.preferences(&initial.params);
            let workspace = Workspace::from_record(initial.to_record(), &prefs)?;
            return Ok((workspace, prefs));
        }

        let params = job.system.clone().unwrap_or_default();
        let prefs = self.preferences(&params);
        let mut documents = Vec::with_capacity(job.elements.len());
        for (i, value) in job.elements.iter().enumerate() {
            let json = serde_json::to_value(value)
                .with_context(|| format!("Element #{} is not representable as JSON", i + 1))?;
            let record = ElementRecord::from_value(json)
                .with_context(|| format!("Element #{} is invalid", i + 1))?;
            documents.push(record.export());
        }
        let record = WorkspaceRecord {
            workspace_name: job.name.clone(),
            system_params: params,
            elements: documents,
        };
        let workspace = Workspace::from_record(record, &prefs).context("Invalid bench")?;
        Ok((workspace, prefs))
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<Job> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: JobConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(Job { config, base_dir })
}
