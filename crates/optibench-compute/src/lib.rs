//! # Optibench Compute
//!
//! Compute backend abstraction for the Optibench optical bench. This crate
//! provides a [`ComputeBackend`](backend::ComputeBackend) trait that isolates
//! the scalar-diffraction code from execution details.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Notes |
//! |---------|-------------|--------|
//! | CPU (Rayon) | `cpu` (default) | Row-parallel FFTs and grid fills |
//! | Serial | `cpu` (default) | Single thread, deterministic reference |

pub mod backend;

#[cfg(feature = "cpu")]
pub mod cpu;

#[cfg(feature = "cpu")]
pub mod fft;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, FftDirection};

#[cfg(feature = "cpu")]
pub use cpu::{CpuBackend, SerialBackend};
