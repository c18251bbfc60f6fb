//! Monochromatic scalar field on a rectangular grid.
//!
//! Propagation uses the angular-spectrum method:
//!
//! $U(z + \Delta z) = \mathcal{F}^{-1}\{\mathcal{F}\{U(z)\}\, H\}$, with
//! $H(f_x, f_y) = \exp\!\big(i 2\pi \Delta z \sqrt{\lambda^{-2} - f_x^2 - f_y^2}\big)$
//! for propagating components and $H = 0$ for evanescent ones.
//!
//! All lengths are millimetres. Grid coordinates are centred, with sample
//! `(rows/2, cols/2)` on the optical axis.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;
use optibench_compute::{ComputeBackend, FftDirection};

use super::color;
use super::{EngineError, Frame};

/// Complex amplitude sampled on a grid.
#[derive(Clone)]
pub struct ScalarField {
    pub(crate) amplitude: Array2<Complex64>,
    wavelength_mm: f64,
    dx_mm: f64,
    dy_mm: f64,
    backend: Arc<dyn ComputeBackend>,
}

impl std::fmt::Debug for ScalarField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarField")
            .field("shape", &self.amplitude.dim())
            .field("wavelength_mm", &self.wavelength_mm)
            .field("dx_mm", &self.dx_mm)
            .field("dy_mm", &self.dy_mm)
            .finish()
    }
}

impl ScalarField {
    /// Unit-amplitude plane wave.
    pub fn plane_wave(
        shape: (usize, usize),
        wavelength_nm: f64,
        pitch_mm: (f64, f64),
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<Self, EngineError> {
        Self::from_amplitude(
            Array2::from_elem(shape, Complex64::new(1.0, 0.0)),
            wavelength_nm,
            pitch_mm,
            backend,
        )
    }

    /// Wrap an existing complex amplitude. `pitch_mm` is `(dx, dy)`.
    pub fn from_amplitude(
        amplitude: Array2<Complex64>,
        wavelength_nm: f64,
        pitch_mm: (f64, f64),
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<Self, EngineError> {
        let (rows, cols) = amplitude.dim();
        if rows == 0 || cols == 0 {
            return Err(EngineError::InvalidGrid("empty grid".into()));
        }
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(wavelength_nm) || !valid(pitch_mm.0) || !valid(pitch_mm.1) {
            return Err(EngineError::InvalidGrid(format!(
                "wavelength {wavelength_nm} nm, pitch {pitch_mm:?} mm"
            )));
        }
        Ok(Self {
            amplitude,
            wavelength_mm: wavelength_nm * 1e-6,
            dx_mm: pitch_mm.0,
            dy_mm: pitch_mm.1,
            backend,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.amplitude.dim()
    }

    pub fn amplitude(&self) -> &Array2<Complex64> {
        &self.amplitude
    }

    /// Same grid and optics, different amplitude.
    pub fn with_amplitude(&self, amplitude: Array2<Complex64>) -> Self {
        Self {
            amplitude,
            wavelength_mm: self.wavelength_mm,
            dx_mm: self.dx_mm,
            dy_mm: self.dy_mm,
            backend: Arc::clone(&self.backend),
        }
    }

    /// Propagate by `dz_mm` (negative values propagate backwards).
    pub fn propagate(&mut self, dz_mm: f64) -> Result<(), EngineError> {
        let (rows, cols) = self.shape();
        let transfer = self.transfer_function(rows, cols, dz_mm)?;
        self.backend.fft2(&mut self.amplitude, FftDirection::Forward)?;
        self.backend.multiply_in_place(&mut self.amplitude, &transfer)?;
        self.backend.fft2(&mut self.amplitude, FftDirection::Inverse)?;
        Ok(())
    }

    fn transfer_function(
        &self,
        rows: usize,
        cols: usize,
        dz_mm: f64,
    ) -> Result<Array2<Complex64>, EngineError> {
        let inv_lambda_sq = 1.0 / (self.wavelength_mm * self.wavelength_mm);
        let (dfx, dfy) = (1.0 / (cols as f64 * self.dx_mm), 1.0 / (rows as f64 * self.dy_mm));
        let fill = move |i: usize, j: usize| {
            let fy = fft_frequency(i, rows) * dfy;
            let fx = fft_frequency(j, cols) * dfx;
            let arg = inv_lambda_sq - fx * fx - fy * fy;
            if arg <= 0.0 {
                Complex64::new(0.0, 0.0)
            } else {
                Complex64::from_polar(1.0, 2.0 * PI * dz_mm * arg.sqrt())
            }
        };
        Ok(self.backend.parallel_grid_fill(rows, cols, &fill)?)
    }

    /// Thin lens of focal length `focal_length_mm`:
    /// $t(x, y) = \exp(-i \pi (x^2 + y^2) / (\lambda f))$.
    pub fn apply_lens(&mut self, focal_length_mm: f64) -> Result<(), EngineError> {
        let (rows, cols) = self.shape();
        let (dx, dy) = (self.dx_mm, self.dy_mm);
        let k = PI / (self.wavelength_mm * focal_length_mm);
        let fill = move |i: usize, j: usize| {
            let y = (i as f64 - rows as f64 / 2.0) * dy;
            let x = (j as f64 - cols as f64 / 2.0) * dx;
            Complex64::from_polar(1.0, -k * (x * x + y * y))
        };
        let phase = self.backend.parallel_grid_fill(rows, cols, &fill)?;
        self.backend.multiply_in_place(&mut self.amplitude, &phase)?;
        Ok(())
    }

    /// Multiply by an amplitude mask in `[0, 1]`.
    pub fn apply_amplitude_mask(&mut self, mask: &Array2<f64>) -> Result<(), EngineError> {
        let factor = mask.mapv(|m| Complex64::new(m, 0.0));
        self.backend.multiply_in_place(&mut self.amplitude, &factor)?;
        Ok(())
    }

    /// Multiply by `support * exp(i 2 pi values)`.
    pub fn apply_phase_mask(
        &mut self,
        values: &Array2<f64>,
        support: &Array2<f64>,
    ) -> Result<(), EngineError> {
        let mut factor = values.mapv(|v| Complex64::from_polar(1.0, 2.0 * PI * v));
        factor.zip_mut_with(support, |f, &s| *f *= s);
        self.backend.multiply_in_place(&mut self.amplitude, &factor)?;
        Ok(())
    }

    pub fn intensity(&self) -> Array2<f64> {
        self.amplitude.mapv(|a| a.norm_sqr())
    }

    /// Intensity as a frame tinted with the wavelength's colour.
    pub fn capture(&self) -> Frame {
        color::intensity_frame(&self.intensity(), color::wavelength_rgb(self.wavelength_mm * 1e6))
    }

    pub fn total_power(&self) -> f64 {
        self.amplitude.iter().map(|a| a.norm_sqr()).sum()
    }
}

/// Signed frequency index of FFT bin `i` out of `n`, as in `numpy.fft.fftfreq`.
fn fft_frequency(i: usize, n: usize) -> f64 {
    if i < n.div_ceil(2) {
        i as f64
    } else {
        i as f64 - n as f64
    }
}
