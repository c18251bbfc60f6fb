//! Background solves, at most one in flight per runner.
//!
//! A runner belongs to one workspace. [`SolveRunner::submit`] takes an
//! immutable [`SolveInput`] snapshot, so the caller can keep editing the
//! live sequence while the solve runs. A second submit while a solve is in
//! flight is rejected with [`SolveError::Busy`] rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use thiserror::Error;

use crate::pipeline::{SolveInput, SolvePipeline, SolveReport};

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("A solve is already running for this workspace")]
    Busy,

    #[error("Cannot start solve worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Solve worker panicked")]
    WorkerPanicked,
}

/// Releases the in-flight slot when the worker ends, even by unwinding.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
        debug!("solve slot released");
    }
}

/// Single-flight solve scheduler for one workspace.
pub struct SolveRunner {
    pipeline: Arc<SolvePipeline>,
    in_flight: Arc<AtomicBool>,
}

impl SolveRunner {
    pub fn new(pipeline: SolvePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pipeline(&self) -> &SolvePipeline {
        &self.pipeline
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a solve on a worker thread.
    ///
    /// Dropping the returned handle abandons the result; the worker still
    /// finishes its writes and frees the slot.
    pub fn submit(&self, input: SolveInput) -> Result<SolveHandle, SolveError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("solve of '{}' rejected: another solve is running", input.workspace_name);
            return Err(SolveError::Busy);
        }
        let slot = SlotGuard(Arc::clone(&self.in_flight));
        let pipeline = Arc::clone(&self.pipeline);
        let thread = thread::Builder::new()
            .name("optibench-solve".into())
            .spawn(move || {
                let _slot = slot;
                pipeline.solve(&input)
            })
            // On failure the closure is dropped, and the slot with it.
            .map_err(SolveError::Spawn)?;
        Ok(SolveHandle { thread })
    }
}

/// A solve running in the background.
pub struct SolveHandle {
    thread: JoinHandle<SolveReport>,
}

impl SolveHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the solve ends.
    pub fn wait(self) -> Result<SolveReport, SolveError> {
        self.thread.join().map_err(|_| SolveError::WorkerPanicked)
    }
}
