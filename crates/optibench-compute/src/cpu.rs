//! CPU compute backend using Rayon for shared-memory parallelism.

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, FftDirection};
use crate::fft::fft2_in_place;

/// CPU backend that parallelises work across threads via Rayon.
pub struct CpuBackend {
    num_threads: usize,
    /// Dedicated pool when a thread count was requested; otherwise the
    /// global Rayon pool is used.
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuBackend {
    /// Create a new CPU backend using all available threads.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend with a specified thread count.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("optibench-cpu-{i}"))
            .build()
            .map_err(|e| ComputeError::Unavailable(e.to_string()))?;
        Ok(Self {
            num_threads: pool.current_num_threads(),
            pool: Some(Arc::new(pool)),
        })
    }

    fn run<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            compute_units: Some(self.num_threads),
        }
    }

    fn parallel_grid_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> Complex64 + Send + Sync),
    ) -> Result<Array2<Complex64>, ComputeError> {
        use rayon::prelude::*;

        let data: Vec<Complex64> = self.run(|| {
            (0..rows * cols)
                .into_par_iter()
                .map(|idx| {
                    let i = idx / cols;
                    let j = idx % cols;
                    fill_fn(i, j)
                })
                .collect()
        });

        Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| ComputeError::DeviceError(e.to_string()))
    }

    fn fft2(
        &self,
        grid: &mut Array2<Complex64>,
        direction: FftDirection,
    ) -> Result<(), ComputeError> {
        self.run(|| fft2_in_place(grid, direction, true))
    }
}

/// Single-threaded backend. Produces bit-identical results to
/// [`CpuBackend`] and is convenient in tests and constrained environments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial".into(),
            backend_type: BackendType::Serial,
            compute_units: Some(1),
        }
    }

    fn parallel_grid_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> Complex64 + Send + Sync),
    ) -> Result<Array2<Complex64>, ComputeError> {
        Ok(Array2::from_shape_fn((rows, cols), |(i, j)| fill_fn(i, j)))
    }

    fn fft2(
        &self,
        grid: &mut Array2<Complex64>,
        direction: FftDirection,
    ) -> Result<(), ComputeError> {
        fft2_in_place(grid, direction, false)
    }
}
