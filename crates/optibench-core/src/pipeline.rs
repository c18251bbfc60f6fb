//! Propagation pipeline: expands a snapshot of the element sequence, hands it
//! to an [`Engine`], and turns the captured frames into on-disk artifacts.
//!
//! ## Stages
//!
//! | Stage | Work |
//! |-------|------|
//! | `Expanding` | screen ranges become per-slice screens, sorted for simulation |
//! | `Propagating` | the engine walks the sorted list |
//! | `Capturing` | one PNG per captured frame |
//! | `Finalizing` | range animations, `metadata.json`, preview |
//!
//! A solve never returns an error. Failures are typed ([`SolveFailure`]),
//! recorded in the metadata document, and produce a blank preview of the
//! grid shape.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifacts::{self, ArtifactError, FileNames, METADATA_FILE};
use crate::config::OutputSettings;
use crate::element::{ElementDocument, ElementKind, ElementPayload, ElementRecord};
use crate::engine::{Engine, EngineError, Frame, RenderRequest, SimElement, SimRole, SliceInfo};
use crate::range;
use crate::workspace::{FieldType, SystemParams};

/// Immutable snapshot a solve runs against.
#[derive(Debug, Clone)]
pub struct SolveInput {
    pub workspace_name: String,
    pub params: SystemParams,
    /// Axial order, source excluded.
    pub elements: Vec<ElementRecord>,
}

/// Pipeline state of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStage {
    Idle,
    Expanding,
    Propagating,
    Capturing,
    Finalizing,
    Failed,
}

/// Why a solve produced a placeholder instead of results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveFailure {
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),

    #[error("Cannot write to {path}: {reason}")]
    UnwritableOutputLocation { path: PathBuf, reason: String },

    #[error("Target plane at {target_mm} mm is not after the result plane at {result_mm} mm")]
    NonPositiveInverseDistance { result_mm: f64, target_mm: f64 },

    #[error("Field type {0:?} is not supported by the active engine")]
    UnsupportedFieldType(FieldType),

    #[error("Engine fault: {0}")]
    EngineFault(String),
}

impl SolveFailure {
    /// Stable category name, as written to the metadata document.
    pub fn kind(&self) -> &'static str {
        match self {
            SolveFailure::MissingRequiredElement(_) => "MissingRequiredElement",
            SolveFailure::UnwritableOutputLocation { .. } => "UnwritableOutputLocation",
            SolveFailure::NonPositiveInverseDistance { .. } => "NonPositiveInverseDistance",
            SolveFailure::UnsupportedFieldType(_) => "UnsupportedFieldType",
            SolveFailure::EngineFault(_) => "EngineFault",
        }
    }
}

impl From<EngineError> for SolveFailure {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MissingRequiredElement(what) => SolveFailure::MissingRequiredElement(what),
            EngineError::NonPositiveInverseDistance { result_mm, target_mm } => {
                SolveFailure::NonPositiveInverseDistance { result_mm, target_mm }
            }
            EngineError::UnsupportedFieldType(field_type) => {
                SolveFailure::UnsupportedFieldType(field_type)
            }
            other => SolveFailure::EngineFault(other.to_string()),
        }
    }
}

impl From<&ArtifactError> for SolveFailure {
    fn from(err: &ArtifactError) -> Self {
        SolveFailure::UnwritableOutputLocation {
            path: err.path().to_path_buf(),
            reason: err.to_string(),
        }
    }
}

// ─── Metadata document ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: String,
    pub message: String,
}

impl From<&SolveFailure> for FailureRecord {
    fn from(failure: &SolveFailure) -> Self {
        Self {
            kind: failure.kind().to_string(),
            message: failure.to_string(),
        }
    }
}

/// Identity of one captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub name: String,
    pub kind: ElementKind,
    pub distance_mm: f64,
    pub is_from_range: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceInfo>,
    /// File name inside the output directory; `None` when not written.
    #[serde(default)]
    pub filename: Option<String>,
    /// `[height, width, 3]`.
    pub shape: [usize; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationRecord {
    pub name: String,
    pub range_start_mm: f64,
    pub range_end_mm: f64,
    pub steps: u32,
    pub frame_count: usize,
    pub filename: String,
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub workspace_name: String,
    pub timestamp: DateTime<Local>,
    pub engine: String,
    pub backend: Option<String>,
    pub system_params: SystemParams,
    pub output_dir: Option<PathBuf>,
    pub retain_previous_runs: bool,
    pub elements: Vec<ElementDocument>,
    pub frames: Vec<FrameRecord>,
    pub animations: Vec<AnimationRecord>,
    pub warnings: Vec<String>,
    pub error: Option<FailureRecord>,
}

/// A captured frame and its identity.
#[derive(Debug, Clone)]
pub struct SolvedFrame {
    pub record: FrameRecord,
    pub frame: Frame,
}

/// Everything a solve produced.
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Last captured frame, the engine's placeholder, or a blank frame.
    pub preview: Frame,
    pub frames: Vec<SolvedFrame>,
    pub metadata: RunMetadata,
    pub failure: Option<SolveFailure>,
    /// Stages visited, starting at `Idle`.
    pub stages: Vec<SolveStage>,
}

impl SolveReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.metadata.output_dir.as_deref()
    }
}

// ─── Expansion ──────────────────────────────────────────────────────────

/// Replace every screen by its range slices; other elements map one to one.
pub fn expand_elements(records: &[ElementRecord]) -> Vec<SimElement> {
    let mut expanded = Vec::with_capacity(records.len());
    for record in records {
        let role = match &record.payload {
            ElementPayload::Screen(screen) => {
                let samples = range::expand(
                    record.distance_mm,
                    screen.is_range,
                    screen.range_end_mm,
                    screen.steps,
                );
                let total_steps = samples.len() as u32;
                for (i, distance_mm) in samples.into_iter().enumerate() {
                    let slice = screen.is_range.then(|| SliceInfo {
                        slice_index: i as u32 + 1,
                        range_start_mm: record.distance_mm,
                        range_end_mm: screen.range_end_mm,
                        total_steps,
                    });
                    expanded.push(SimElement {
                        name: record.name.clone(),
                        distance_mm,
                        role: SimRole::Screen(slice),
                    });
                }
                continue;
            }
            ElementPayload::Aperture(p) => SimRole::Aperture(p.clone()),
            ElementPayload::Lens(p) => SimRole::Lens(p.clone()),
            ElementPayload::ApertureResult(p) => SimRole::ApertureResult(p.clone()),
            ElementPayload::TargetIntensity(p) => SimRole::TargetIntensity(p.clone()),
        };
        expanded.push(SimElement {
            name: record.name.clone(),
            distance_mm: record.distance_mm,
            role,
        });
    }
    expanded
}

/// Stable sort by `(distance, screen last)`: at equal distance, elements
/// act on the field before screens capture it.
pub fn sort_for_simulation(elements: &mut [SimElement]) {
    elements.sort_by(|a, b| {
        a.distance_mm
            .total_cmp(&b.distance_mm)
            .then(a.is_screen().cmp(&b.is_screen()))
    });
}

// ─── Pipeline ───────────────────────────────────────────────────────────

/// Runs solves for one engine and output configuration.
pub struct SolvePipeline {
    engine: Arc<dyn Engine>,
    output: OutputSettings,
}

struct StageTrace(Vec<SolveStage>);

impl StageTrace {
    fn new() -> Self {
        Self(vec![SolveStage::Idle])
    }

    fn enter(&mut self, stage: SolveStage) {
        if let Some(last) = self.0.last() {
            debug!("solve stage {last:?} -> {stage:?}");
        }
        self.0.push(stage);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "engine panicked".to_string()
    }
}

impl SolvePipeline {
    pub fn new(engine: Arc<dyn Engine>, output: OutputSettings) -> Self {
        Self { engine, output }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn output(&self) -> &OutputSettings {
        &self.output
    }

    /// Run one solve against `input`.
    pub fn solve(&self, input: &SolveInput) -> SolveReport {
        let info = self.engine.info();
        let (rows, cols) = input.params.grid_shape();
        let mut trace = StageTrace::new();
        let mut metadata = RunMetadata {
            workspace_name: input.workspace_name.clone(),
            timestamp: Local::now(),
            engine: info.name.to_string(),
            backend: self.engine.device().map(|d| d.name),
            system_params: input.params.clone(),
            output_dir: None,
            retain_previous_runs: self.output.retain_previous_runs,
            elements: input.elements.iter().map(ElementRecord::export).collect(),
            frames: Vec::new(),
            animations: Vec::new(),
            warnings: Vec::new(),
            error: None,
        };
        info!(
            "solving '{}' with the {} engine ({} elements, {rows} x {cols} px)",
            input.workspace_name,
            info.name,
            input.elements.len()
        );

        trace.enter(SolveStage::Expanding);
        let mut expanded = expand_elements(&input.elements);
        sort_for_simulation(&mut expanded);
        for record in &input.elements {
            if !info.supports(record.kind()) {
                let warning = format!(
                    "'{}' ({}) is ignored by the {} engine",
                    record.name,
                    record.kind(),
                    info.name
                );
                warn!("{warning}");
                metadata.warnings.push(warning);
            }
        }
        debug!("expanded to {} simulation elements", expanded.len());

        if let Err(err) = input.params.validate() {
            let failure = SolveFailure::EngineFault(err.to_string());
            return self.fail(failure, metadata, trace, (rows, cols));
        }

        trace.enter(SolveStage::Propagating);
        let request = RenderRequest {
            params: &input.params,
            elements: &expanded,
            workspace_name: &input.workspace_name,
        };
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| self.engine.render(&request)));
        let output = match rendered {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return self.fail(err.into(), metadata, trace, (rows, cols)),
            Err(payload) => {
                let failure = SolveFailure::EngineFault(panic_message(payload));
                return self.fail(failure, metadata, trace, (rows, cols));
            }
        };
        metadata.warnings.extend(output.warnings);

        let mut failure = None;
        let dir = match self.prepare_output_dir(&input.workspace_name, metadata.timestamp) {
            Ok(dir) => Some(dir),
            Err(err) => {
                warn!("{err}");
                failure = Some(SolveFailure::from(&err));
                None
            }
        };
        metadata.output_dir = dir.clone();

        let mut names = FileNames::default();
        let mut frames = Vec::with_capacity(output.frames.len());
        for captured in output.frames {
            trace.enter(SolveStage::Capturing);
            let Some(element) = expanded.get(captured.element) else {
                warn!("engine returned a frame for unknown element #{}", captured.element);
                continue;
            };
            let slice = match &element.role {
                SimRole::Screen(slice) => slice.clone(),
                _ => None,
            };
            let mut record = FrameRecord {
                name: element.name.clone(),
                kind: element.kind(),
                distance_mm: element.distance_mm,
                is_from_range: slice.is_some(),
                slice,
                filename: None,
                shape: captured.frame.shape(),
            };
            if let Some(dir) = dir.as_ref().filter(|_| failure.is_none()) {
                let wanted = artifacts::frame_filename(
                    &record.name,
                    record.distance_mm,
                    record.slice.as_ref().map(|s| s.slice_index),
                );
                let filename = names.claim(wanted.clone());
                if filename != wanted {
                    metadata
                        .warnings
                        .push(format!("'{}' would overwrite {wanted}; saved as {filename}", record.name));
                }
                match artifacts::write_png(&dir.join(&filename), &captured.frame) {
                    Ok(()) => record.filename = Some(filename),
                    Err(err) => {
                        warn!("{err}");
                        failure = Some(SolveFailure::from(&err));
                    }
                }
            }
            frames.push(SolvedFrame { record, frame: captured.frame });
        }

        trace.enter(SolveStage::Finalizing);
        if let Some(dir) = dir.as_ref().filter(|_| failure.is_none()) {
            if self.output.auto_animate {
                match self.write_animations(dir, &frames, &mut names, &mut metadata.warnings) {
                    Ok(animations) => metadata.animations = animations,
                    Err(err) => {
                        warn!("{err}");
                        failure = Some(SolveFailure::from(&err));
                    }
                }
            }
        }
        metadata.frames = frames.iter().map(|f| f.record.clone()).collect();
        metadata.error = failure.as_ref().map(FailureRecord::from);
        if let Some(dir) = &dir {
            if let Err(err) = artifacts::write_json(&dir.join(METADATA_FILE), &metadata) {
                warn!("{err}");
                if failure.is_none() {
                    let unwritable = SolveFailure::from(&err);
                    metadata.error = Some(FailureRecord::from(&unwritable));
                    failure = Some(unwritable);
                }
            }
        }

        let preview = match &failure {
            Some(_) => Frame::blank(rows, cols),
            None => frames
                .last()
                .map(|f| f.frame.clone())
                .or(output.preview)
                .unwrap_or_else(|| Frame::blank(rows, cols)),
        };
        trace.enter(if failure.is_some() {
            SolveStage::Failed
        } else {
            SolveStage::Idle
        });
        if let Some(failure) = &failure {
            warn!("solve of '{}' failed: {failure}", input.workspace_name);
        } else {
            info!(
                "solve of '{}' finished: {} frames, {} animations",
                input.workspace_name,
                frames.len(),
                metadata.animations.len()
            );
        }
        SolveReport {
            preview,
            frames,
            metadata,
            failure,
            stages: trace.0,
        }
    }

    fn prepare_output_dir(
        &self,
        workspace_name: &str,
        now: DateTime<Local>,
    ) -> Result<PathBuf, ArtifactError> {
        artifacts::prepare_output_dir(
            &self.output.root_dir,
            workspace_name,
            self.output.retain_previous_runs,
            now,
        )
    }

    /// One GIF per range group `(name, start, end, steps)` with two or more frames.
    fn write_animations(
        &self,
        dir: &Path,
        frames: &[SolvedFrame],
        names: &mut FileNames,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<AnimationRecord>, ArtifactError> {
        let mut groups: Vec<(&str, &SliceInfo, Vec<(u32, &Frame)>)> = Vec::new();
        for solved in frames {
            let Some(slice) = &solved.record.slice else {
                continue;
            };
            let name = solved.record.name.as_str();
            let existing = groups.iter_mut().find(|(n, s, _)| {
                *n == name
                    && s.range_start_mm == slice.range_start_mm
                    && s.range_end_mm == slice.range_end_mm
                    && s.total_steps == slice.total_steps
            });
            match existing {
                Some((_, _, members)) => members.push((slice.slice_index, &solved.frame)),
                None => groups.push((name, slice, vec![(slice.slice_index, &solved.frame)])),
            }
        }

        let mut animations = Vec::new();
        for (name, slice, mut members) in groups {
            if members.len() < 2 {
                continue;
            }
            members.sort_by_key(|(index, _)| *index);
            let wanted = artifacts::animation_filename(
                name,
                slice.range_start_mm,
                slice.range_end_mm,
                slice.total_steps,
            );
            let filename = names.claim(wanted.clone());
            if filename != wanted {
                warnings.push(format!("'{name}' would overwrite {wanted}; saved as {filename}"));
            }
            let ordered: Vec<&Frame> = members.iter().map(|(_, frame)| *frame).collect();
            artifacts::write_gif(
                &dir.join(&filename),
                &ordered,
                self.output.animation_frame_delay_ms,
            )?;
            animations.push(AnimationRecord {
                name: name.to_string(),
                range_start_mm: slice.range_start_mm,
                range_end_mm: slice.range_end_mm,
                steps: slice.total_steps,
                frame_count: members.len(),
                filename,
            });
        }
        Ok(animations)
    }

    /// Degrade to a blank preview, recording `failure` in the metadata.
    fn fail(
        &self,
        failure: SolveFailure,
        mut metadata: RunMetadata,
        mut trace: StageTrace,
        (rows, cols): (usize, usize),
    ) -> SolveReport {
        warn!("solve of '{}' failed: {failure}", metadata.workspace_name);
        metadata.error = Some(FailureRecord::from(&failure));
        match self.prepare_output_dir(&metadata.workspace_name, metadata.timestamp) {
            Ok(dir) => {
                metadata.output_dir = Some(dir.clone());
                if let Err(err) = artifacts::write_json(&dir.join(METADATA_FILE), &metadata) {
                    warn!("{err}");
                }
            }
            Err(err) => warn!("{err}"),
        }
        trace.enter(SolveStage::Failed);
        SolveReport {
            preview: Frame::blank(rows, cols),
            frames: Vec::new(),
            metadata,
            failure: Some(failure),
            stages: trace.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElementDefaults;
    use crate::element::ScreenParams;
    use crate::engine::{EngineInfo, RenderOutput};
    use std::fs;
    use tempfile::TempDir;

    fn record(name: &str, kind: ElementKind, distance: f64) -> ElementRecord {
        let payload = ElementPayload::default_for(kind, distance, &ElementDefaults::default());
        ElementRecord::new(name, distance, payload)
    }

    fn ranged_screen(name: &str, start: f64, end: f64, steps: u32) -> ElementRecord {
        ElementRecord::new(
            name,
            start,
            ElementPayload::Screen(ScreenParams { is_range: true, range_end_mm: end, steps }),
        )
    }

    fn small_params() -> SystemParams {
        SystemParams {
            extent_x_mm: 1.0,
            extent_y_mm: 0.5,
            resolution_px_per_mm: 16.0,
            ..SystemParams::default()
        }
    }

    fn output_in(dir: &TempDir) -> OutputSettings {
        OutputSettings {
            root_dir: dir.path().to_path_buf(),
            ..OutputSettings::default()
        }
    }

    struct FailingEngine(fn() -> Result<RenderOutput, EngineError>);

    impl Engine for FailingEngine {
        fn info(&self) -> EngineInfo {
            crate::engine::bitmap::INFO
        }

        fn render(&self, _: &RenderRequest<'_>) -> Result<RenderOutput, EngineError> {
            (self.0)()
        }
    }

    #[test]
    fn test_expand_screen_range() {
        let records = vec![
            record("Lens 1", ElementKind::Lens, 5.0),
            ranged_screen("Screen 1", 10.0, 20.0, 3),
        ];
        let expanded = expand_elements(&records);
        assert_eq!(expanded.len(), 4);
        let distances: Vec<f64> = expanded.iter().map(|e| e.distance_mm).collect();
        assert_eq!(distances, vec![5.0, 10.0, 15.0, 20.0]);
        match &expanded[3].role {
            SimRole::Screen(Some(slice)) => {
                assert_eq!(slice.slice_index, 3);
                assert_eq!(slice.total_steps, 3);
                assert_eq!(slice.range_start_mm, 10.0);
                assert_eq!(slice.range_end_mm, 20.0);
            }
            other => panic!("unexpected role {other:?}"),
        }
        assert!(expanded[1..].iter().all(|e| e.name == "Screen 1"));
    }

    #[test]
    fn test_plain_screen_has_no_slice() {
        let expanded = expand_elements(&[record("Screen 1", ElementKind::Screen, 7.0)]);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].role, SimRole::Screen(None));
    }

    #[test]
    fn test_sort_puts_screens_after_optics() {
        let records = vec![
            ranged_screen("Screen 1", 0.0, 20.0, 3),
            record("Lens 1", ElementKind::Lens, 10.0),
            record("Aperture 1", ElementKind::Aperture, 10.0),
        ];
        let mut expanded = expand_elements(&records);
        sort_for_simulation(&mut expanded);
        let names: Vec<&str> = expanded.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Screen 1", "Lens 1", "Aperture 1", "Screen 1", "Screen 1"]);
        assert_eq!(expanded[3].distance_mm, 10.0);
    }

    #[test]
    fn test_engine_error_maps_to_failure() {
        let failure: SolveFailure = EngineError::MissingRequiredElement("target".into()).into();
        assert_eq!(failure.kind(), "MissingRequiredElement");
        let failure: SolveFailure = EngineError::InvalidGrid("0 x 0".into()).into();
        assert_eq!(failure.kind(), "EngineFault");
    }

    #[test]
    fn test_engine_error_degrades_to_blank() {
        let dir = TempDir::new().unwrap();
        let engine = FailingEngine(|| {
            Err(EngineError::NonPositiveInverseDistance { result_mm: 5.0, target_mm: 5.0 })
        });
        let pipeline = SolvePipeline::new(Arc::new(engine), output_in(&dir));
        let input = SolveInput {
            workspace_name: "Bench".into(),
            params: small_params(),
            elements: vec![record("Screen 1", ElementKind::Screen, 1.0)],
        };
        let report = pipeline.solve(&input);
        assert!(!report.is_success());
        assert_eq!(report.preview.shape(), [8, 16, 3]);
        assert!(report.preview.is_blank());
        assert_eq!(report.stages.last(), Some(&SolveStage::Failed));
        let error = report.metadata.error.as_ref().unwrap();
        assert_eq!(error.kind, "NonPositiveInverseDistance");

        let text = fs::read_to_string(dir.path().join("Bench").join(METADATA_FILE)).unwrap();
        let saved: RunMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(saved.error, report.metadata.error);
    }

    #[test]
    fn test_engine_panic_is_contained() {
        let dir = TempDir::new().unwrap();
        let engine = FailingEngine(|| panic!("grid exploded"));
        let pipeline = SolvePipeline::new(Arc::new(engine), output_in(&dir));
        let input = SolveInput {
            workspace_name: "Bench".into(),
            params: small_params(),
            elements: Vec::new(),
        };
        let report = pipeline.solve(&input);
        assert_eq!(
            report.failure,
            Some(SolveFailure::EngineFault("grid exploded".into()))
        );
        assert!(report.preview.is_blank());
    }

    #[test]
    fn test_unwritable_output_location() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let output = OutputSettings { root_dir: blocker, ..OutputSettings::default() };
        let pipeline = SolvePipeline::new(Arc::new(crate::engine::bitmap::BitmapEngine), output);
        let input = SolveInput {
            workspace_name: "Bench".into(),
            params: small_params(),
            elements: vec![record("Screen 1", ElementKind::Screen, 1.0)],
        };
        let report = pipeline.solve(&input);
        assert!(matches!(
            report.failure,
            Some(SolveFailure::UnwritableOutputLocation { .. })
        ));
        assert!(report.preview.is_blank());
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.frames[0].record.filename, None);
    }

    #[test]
    fn test_invalid_params_fail_before_render() {
        let dir = TempDir::new().unwrap();
        let pipeline = SolvePipeline::new(Arc::new(crate::engine::bitmap::BitmapEngine), output_in(&dir));
        let input = SolveInput {
            workspace_name: "Bench".into(),
            params: SystemParams { resolution_px_per_mm: 0.0, ..small_params() },
            elements: Vec::new(),
        };
        let report = pipeline.solve(&input);
        assert_eq!(report.failure.as_ref().map(SolveFailure::kind), Some("EngineFault"));
        assert!(!report.stages.contains(&SolveStage::Propagating));
    }
}
