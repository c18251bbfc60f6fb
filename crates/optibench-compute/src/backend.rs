//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over the execution environment
//! (thread pool or plain serial loop) so that the field propagation code in
//! `optibench-core` stays device-agnostic.

use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: Option<usize>,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Rayon thread pool.
    Cpu,
    /// Single-threaded reference loop.
    Serial,
}

/// Direction of a 2-D discrete Fourier transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftDirection {
    /// Unnormalised forward transform.
    Forward,
    /// Inverse transform, normalised by `1 / (rows * cols)`.
    Inverse,
}

/// Abstraction over compute backends.
///
/// The scalar field code operates against this trait. Implementations
/// provide execution for the hot-path grid operations: filling transfer
/// functions and phase screens, 2-D FFTs, and element-wise products.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Fill a `rows x cols` complex grid by evaluating `fill_fn(row, col)`.
    ///
    /// Used to build angular-spectrum transfer functions and lens phase
    /// screens; every sample is independent.
    fn parallel_grid_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> Complex64 + Send + Sync),
    ) -> Result<Array2<Complex64>, ComputeError>;

    /// In-place 2-D FFT of `grid`.
    ///
    /// Conventions match `numpy.fft.fft2` / `numpy.fft.ifft2`: the forward
    /// transform is unnormalised, the inverse applies `1 / (rows * cols)`.
    fn fft2(&self, grid: &mut Array2<Complex64>, direction: FftDirection)
        -> Result<(), ComputeError>;

    /// Element-wise product `grid *= factor`.
    fn multiply_in_place(
        &self,
        grid: &mut Array2<Complex64>,
        factor: &Array2<Complex64>,
    ) -> Result<(), ComputeError> {
        if grid.dim() != factor.dim() {
            return Err(ComputeError::ShapeMismatch {
                expected: grid.dim(),
                actual: factor.dim(),
            });
        }
        grid.zip_mut_with(factor, |g, f| *g *= *f);
        Ok(())
    }
}
