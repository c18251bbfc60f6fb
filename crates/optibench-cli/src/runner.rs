//! Job runner: ties together the workspace, the engine and the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use optibench_compute::{ComputeBackend, CpuBackend, SerialBackend};
use optibench_core::engine::{available_engines, create_engine, SimRole};
use optibench_core::pipeline::{expand_elements, sort_for_simulation, SolvePipeline, SolveReport};
use optibench_core::sequence::AxisEntry;
use optibench_core::solve::SolveRunner;
use optibench_core::workspace::Workspace;

use crate::config::{ComputeConfig, Job};

/// Create a compute backend from the `[compute]` table.
fn create_backend(compute: &ComputeConfig) -> Result<Arc<dyn ComputeBackend>> {
    let backend: Arc<dyn ComputeBackend> = match compute.backend.to_ascii_lowercase().as_str() {
        "cpu" => match compute.threads {
            Some(n) => Arc::new(CpuBackend::with_threads(n).context("Cannot build thread pool")?),
            None => Arc::new(CpuBackend::new()),
        },
        "serial" => Arc::new(SerialBackend),
        other => bail!("Unknown compute backend '{other}'. Valid backends: cpu, serial"),
    };
    println!("Backend: {}", backend.device_info().name);
    Ok(backend)
}

/// Solve the job's workspace and write its artifacts.
pub fn run_job(job: &Job, output: Option<PathBuf>) -> Result<SolveReport> {
    let (workspace, mut prefs) = job.workspace()?;
    if let Some(root) = output {
        prefs.output.root_dir = root;
    }
    print_summary(&workspace);

    let backend = create_backend(&job.config.compute)?;
    let engine = create_engine(&workspace.params.engine, backend)?;
    println!("Engine: {}", engine.info().display_name);

    let runner = SolveRunner::new(SolvePipeline::new(engine, prefs.output));
    let report = runner
        .submit(workspace.solve_input())?
        .wait()?;

    for frame in &report.frames {
        match &frame.record.filename {
            Some(file) => println!("  {:>10.2} mm  {}", frame.record.distance_mm, file),
            None => println!("  {:>10.2} mm  {} (not saved)", frame.record.distance_mm, frame.record.name),
        }
    }
    for animation in &report.metadata.animations {
        println!("  animation    {} ({} frames)", animation.filename, animation.frame_count);
    }
    for warning in &report.metadata.warnings {
        println!("Warning: {warning}");
    }
    if let Some(dir) = report.output_dir() {
        println!("Output: {}", dir.display());
    }
    Ok(report)
}

/// Check that the job describes a solvable bench.
pub fn validate_job(job: &Job) -> Result<Workspace> {
    let (workspace, _) = job.workspace()?;
    workspace.params.validate()?;
    let engine = create_engine(&workspace.params.engine, Arc::new(SerialBackend))?;
    let info = engine.info();
    for record in workspace.sequence.records() {
        if !info.supports(record.kind()) {
            println!(
                "Note: '{}' ({}) is ignored by the {} engine",
                record.name,
                record.kind(),
                info.name
            );
        }
    }
    Ok(workspace)
}

fn print_summary(workspace: &Workspace) {
    let p = &workspace.params;
    let (rows, cols) = p.grid_shape();
    println!("Workspace: {}", workspace.name);
    println!(
        "  {:.1} nm, {:.3} x {:.3} mm at {} px/mm ({cols} x {rows} px), {} element(s)",
        p.wavelength_nm,
        p.extent_x_mm,
        p.extent_y_mm,
        p.resolution_px_per_mm,
        workspace.sequence.len()
    );
}

/// Print the axis and the simulation order of its expanded elements.
pub fn inspect_job(job: &Job) -> Result<()> {
    let (workspace, _) = job.workspace()?;
    print_summary(&workspace);

    println!();
    println!("Axis:");
    for (position, entry) in workspace.sequence.snapshot().iter().enumerate() {
        match entry {
            AxisEntry::Source => println!("  {position:>3}  {:<24} {:>10}", entry.name(), "origin"),
            AxisEntry::Element { record, .. } => println!(
                "  {position:>3}  {:<24} {:>10.3} mm  {}",
                record.name,
                record.distance_mm,
                record.kind()
            ),
        }
    }

    let records: Vec<_> = workspace.sequence.records().cloned().collect();
    let mut expanded = expand_elements(&records);
    sort_for_simulation(&mut expanded);
    println!();
    println!("Simulation order ({} steps):", expanded.len());
    for element in &expanded {
        let slice = match &element.role {
            SimRole::Screen(Some(s)) => format!("  slice {}/{}", s.slice_index, s.total_steps),
            _ => String::new(),
        };
        println!(
            "  {:>10.3} mm  {:<24} {}{slice}",
            element.distance_mm,
            element.name,
            element.kind()
        );
    }
    Ok(())
}

/// List the built-in engines.
pub fn print_engines() {
    println!("Available engines:");
    println!();
    for info in available_engines() {
        let kinds: Vec<String> = info.kinds.iter().map(|k| k.to_string()).collect();
        println!("  {:<8} {}", info.name, info.display_name);
        println!("           elements: {}", kinds.join(", "));
    }
}
