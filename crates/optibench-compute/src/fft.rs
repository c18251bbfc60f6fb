//! 2-D FFT kernels on top of `rustfft`.
//!
//! Rows are transformed in place, the grid is transposed so the columns
//! become contiguous rows, and the result is transposed back. The inverse
//! transform is normalised by `1 / (rows * cols)` so that a forward/inverse
//! pair is the identity, matching numpy.

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::backend::{ComputeError, FftDirection};

/// Transform `grid` in place. Rows are distributed over the current Rayon
/// pool when `parallel` is set.
pub fn fft2_in_place(
    grid: &mut Array2<Complex64>,
    direction: FftDirection,
    parallel: bool,
) -> Result<(), ComputeError> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return Ok(());
    }

    let mut planner = FftPlanner::<f64>::new();
    let (row_fft, col_fft) = match direction {
        FftDirection::Forward => (planner.plan_fft_forward(cols), planner.plan_fft_forward(rows)),
        FftDirection::Inverse => (planner.plan_fft_inverse(cols), planner.plan_fft_inverse(rows)),
    };

    transform_rows(grid, &row_fft, parallel)?;

    let mut transposed = grid.t().as_standard_layout().into_owned();
    transform_rows(&mut transposed, &col_fft, parallel)?;
    grid.assign(&transposed.t());

    if direction == FftDirection::Inverse {
        let norm = 1.0 / (rows * cols) as f64;
        grid.mapv_inplace(|c| c * norm);
    }
    Ok(())
}

fn transform_rows(
    grid: &mut Array2<Complex64>,
    fft: &Arc<dyn Fft<f64>>,
    parallel: bool,
) -> Result<(), ComputeError> {
    let cols = grid.ncols();
    let data = grid
        .as_slice_mut()
        .ok_or_else(|| ComputeError::DeviceError("grid is not contiguous".into()))?;

    if parallel {
        data.par_chunks_mut(cols).for_each(|row| fft.process(row));
    } else {
        // rustfft processes every `len`-sized chunk of the buffer in turn.
        fft.process(data);
    }
    Ok(())
}
