//! Integration tests for the solve pipeline.
//!
//! ## Coverage
//! - Artifact names, animations and metadata with the bitmap engine
//! - Delete-then-write and retain-previous-runs output modes
//! - Distinct names that share a file-name slug
//! - Degrade-to-blank for an inverse solve with no target
//! - Solves run against a snapshot while the workspace keeps changing

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use optibench_compute::SerialBackend;
use optibench_core::artifacts::METADATA_FILE;
use optibench_core::config::{OutputSettings, Preferences};
use optibench_core::element::ElementKind;
use optibench_core::engine::create_engine;
use optibench_core::pipeline::{RunMetadata, SolveFailure, SolvePipeline, SolveStage};
use optibench_core::sequence::ElementId;
use optibench_core::solve::SolveRunner;
use optibench_core::workspace::{SystemParams, Workspace};

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

fn small_params(engine: &str) -> SystemParams {
    SystemParams {
        engine: engine.into(),
        extent_x_mm: 1.0,
        extent_y_mm: 0.5,
        resolution_px_per_mm: 16.0,
        ..SystemParams::default()
    }
}

fn pipeline(engine: &str, output: OutputSettings) -> SolvePipeline {
    let engine = create_engine(engine, Arc::new(SerialBackend)).unwrap();
    SolvePipeline::new(engine, output)
}

fn output_in(dir: &TempDir) -> OutputSettings {
    OutputSettings {
        root_dir: dir.path().to_path_buf(),
        ..OutputSettings::default()
    }
}

fn files_in(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

/// Result plane at 10, lens at 20, plain screen at 30, ranged screen 40..70.
fn retrieval_bench() -> (Workspace, ElementId) {
    let mut ws = Workspace::new("Bench", small_params("bitmap"), &Preferences::default());
    let seq = &mut ws.sequence;
    seq.insert(ElementKind::ApertureResult);
    seq.insert(ElementKind::Lens);
    seq.insert(ElementKind::Screen);
    let sweep = seq.insert(ElementKind::Screen);
    seq.set_range_enabled(sweep, true).unwrap();
    seq.set_range_end(sweep, 70.0).unwrap();
    seq.set_steps(sweep, 4).unwrap();
    (ws, sweep)
}

// ─────────────────────────────────────────────────────────────
// Artifacts
// ─────────────────────────────────────────────────────────────

#[test]
fn test_bitmap_solve_writes_named_artifacts() {
    let dir = TempDir::new().unwrap();
    let (ws, _) = retrieval_bench();
    let report = pipeline("bitmap", output_in(&dir)).solve(&ws.solve_input());

    assert!(report.is_success(), "{:?}", report.failure);
    assert_eq!(report.frames.len(), 5);
    assert_eq!(report.preview.shape(), [8, 16, 3]);
    assert!(!report.preview.is_blank());
    assert_eq!(
        report.stages.first().copied(),
        Some(SolveStage::Idle)
    );
    assert_eq!(report.stages.last().copied(), Some(SolveStage::Idle));
    assert!(report.stages.contains(&SolveStage::Finalizing));

    let out = dir.path().join("Bench");
    assert_eq!(report.output_dir(), Some(out.as_path()));
    let expected: BTreeSet<String> = [
        "Screen_1_30.00_mm.png",
        "Screen_2_40.00_mm_slice_001.png",
        "Screen_2_50.00_mm_slice_002.png",
        "Screen_2_60.00_mm_slice_003.png",
        "Screen_2_70.00_mm_slice_004.png",
        "Screen_2_40.00_to_70.00_mm_steps_4.gif",
        METADATA_FILE,
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(files_in(&out), expected);

    let saved: RunMetadata =
        serde_json::from_str(&fs::read_to_string(out.join(METADATA_FILE)).unwrap()).unwrap();
    assert_eq!(saved.workspace_name, "Bench");
    assert_eq!(saved.engine, "bitmap");
    assert_eq!(saved.system_params, ws.params);
    assert_eq!(saved.elements.len(), 4);
    assert_eq!(saved.frames.len(), 5);
    assert!(saved.error.is_none());
    assert_eq!(saved.animations.len(), 1);
    assert_eq!(saved.animations[0].frame_count, 4);
    let last = saved.frames.last().unwrap();
    let slice = last.slice.as_ref().unwrap();
    assert_eq!((slice.slice_index, slice.total_steps), (4, 4));
    assert_eq!(last.filename.as_deref(), Some("Screen_2_70.00_mm_slice_004.png"));
    // The lens is outside the bitmap engine's vocabulary.
    assert!(saved.warnings.iter().any(|w| w.contains("Lens 1")));
}

#[test]
fn test_rerun_replaces_previous_artifacts() {
    let dir = TempDir::new().unwrap();
    let (mut ws, sweep) = retrieval_bench();
    let pipeline = pipeline("bitmap", output_in(&dir));
    pipeline.solve(&ws.solve_input());

    ws.sequence.set_range_enabled(sweep, false).unwrap();
    let report = pipeline.solve(&ws.solve_input());
    assert!(report.is_success());
    assert!(report.metadata.animations.is_empty());

    let expected: BTreeSet<String> = ["Screen_1_30.00_mm.png", "Screen_2_40.00_mm.png", METADATA_FILE]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(files_in(&dir.path().join("Bench")), expected);
}

#[test]
fn test_retain_mode_keeps_each_run() {
    let dir = TempDir::new().unwrap();
    let (ws, _) = retrieval_bench();
    let output = OutputSettings {
        retain_previous_runs: true,
        auto_animate: false,
        ..output_in(&dir)
    };
    let pipeline = pipeline("bitmap", output);
    let first = pipeline.solve(&ws.solve_input());
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = pipeline.solve(&ws.solve_input());

    let (a, b) = (first.output_dir().unwrap(), second.output_dir().unwrap());
    assert_ne!(a, b);
    for run in [a, b] {
        let files = files_in(run);
        assert_eq!(files.len(), 6);
        assert!(files.iter().all(|f| !f.ends_with(".gif")));
    }
}

#[test]
fn test_screens_sharing_a_slug_keep_separate_files() {
    let dir = TempDir::new().unwrap();
    let mut ws = Workspace::new("Slugs", small_params("bitmap"), &Preferences::default());
    let first = ws.sequence.insert(ElementKind::Screen);
    let second = ws.sequence.insert(ElementKind::Screen);
    ws.sequence.set_distance(first, 30.0).unwrap();
    ws.sequence.set_name(second, "Screen_1").unwrap();
    ws.sequence.set_distance(second, 30.0).unwrap();

    let report = pipeline("bitmap", output_in(&dir)).solve(&ws.solve_input());
    assert!(report.is_success(), "{:?}", report.failure);

    let saved: Vec<&str> = report
        .frames
        .iter()
        .filter_map(|f| f.record.filename.as_deref())
        .collect();
    assert_eq!(saved.len(), 2);
    assert_ne!(saved[0], saved[1]);
    let expected: BTreeSet<String> = ["Screen_1_30.00_mm.png", "Screen_1_30.00_mm_2.png", METADATA_FILE]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(files_in(&dir.path().join("Slugs")), expected);
    assert!(report.metadata.warnings.iter().any(|w| w.contains("Screen_1_30.00_mm_2.png")));
}

// ─────────────────────────────────────────────────────────────
// Failures
// ─────────────────────────────────────────────────────────────

#[test]
fn test_inverse_solve_without_target_degrades_to_blank() {
    let dir = TempDir::new().unwrap();
    let mut ws = Workspace::new("Inverse", small_params("reverse"), &Preferences::default());
    ws.sequence.insert(ElementKind::ApertureResult);
    ws.sequence.insert(ElementKind::Screen);

    let report = pipeline("reverse", output_in(&dir)).solve(&ws.solve_input());
    assert!(matches!(report.failure, Some(SolveFailure::MissingRequiredElement(_))));
    assert_eq!(report.preview.shape(), [8, 16, 3]);
    assert!(report.preview.is_blank());
    assert!(report.frames.is_empty());
    assert_eq!(report.stages.last().copied(), Some(SolveStage::Failed));

    let text = fs::read_to_string(dir.path().join("Inverse").join(METADATA_FILE)).unwrap();
    let saved: RunMetadata = serde_json::from_str(&text).unwrap();
    assert_eq!(saved.error.unwrap().kind, "MissingRequiredElement");
    assert_eq!(saved.elements.len(), 2);
}

// ─────────────────────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────────────────────

#[test]
fn test_solve_uses_snapshot_taken_at_submit() {
    let dir = TempDir::new().unwrap();
    let (mut ws, sweep) = retrieval_bench();
    let runner = SolveRunner::new(pipeline("bitmap", output_in(&dir)));

    let handle = runner.submit(ws.solve_input()).unwrap();
    // Edits after submit belong to the next solve.
    ws.sequence.delete(&[sweep]);
    ws.sequence.insert(ElementKind::Screen);
    let report = handle.wait().unwrap();

    assert_eq!(report.frames.len(), 5);
    assert_eq!(report.metadata.elements.len(), 4);
    assert!(report.frames.iter().all(|f| f.record.name != "Screen 3"));
}
