//! Mapping field quantities to displayable RGB frames.

use std::f64::consts::PI;

use ndarray::{Array2, Array3};
use num_complex::Complex64;

use super::Frame;

/// Approximate linear RGB of a spectral colour.
///
/// Piecewise fit over 380-780 nm with intensity roll-off at both ends of the
/// visible band. Wavelengths outside the band render as white so that
/// infrared and ultraviolet sources stay visible.
pub fn wavelength_rgb(wavelength_nm: f64) -> [f64; 3] {
    let w = wavelength_nm;
    let (r, g, b) = match w {
        w if (380.0..440.0).contains(&w) => (-(w - 440.0) / 60.0, 0.0, 1.0),
        w if (440.0..490.0).contains(&w) => (0.0, (w - 440.0) / 50.0, 1.0),
        w if (490.0..510.0).contains(&w) => (0.0, 1.0, -(w - 510.0) / 20.0),
        w if (510.0..580.0).contains(&w) => ((w - 510.0) / 70.0, 1.0, 0.0),
        w if (580.0..645.0).contains(&w) => (1.0, -(w - 645.0) / 65.0, 0.0),
        w if (645.0..=780.0).contains(&w) => (1.0, 0.0, 0.0),
        _ => return [1.0, 1.0, 1.0],
    };
    let falloff = if w < 420.0 {
        0.3 + 0.7 * (w - 380.0) / 40.0
    } else if w > 700.0 {
        0.3 + 0.7 * (780.0 - w) / 80.0
    } else {
        1.0
    };
    [r * falloff, g * falloff, b * falloff]
}

/// sRGB transfer curve for a linear value in `[0, 1]`.
fn encode_srgb(linear: f64) -> f64 {
    let v = linear.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Intensity normalised to its maximum and tinted with `tint`.
/// An all-zero intensity gives a black frame.
pub fn intensity_frame(intensity: &Array2<f64>, tint: [f64; 3]) -> Frame {
    let (rows, cols) = intensity.dim();
    let peak = intensity.iter().copied().fold(0.0_f64, f64::max);
    let scale = if peak > 0.0 && peak.is_finite() { 1.0 / peak } else { 0.0 };
    let data = Array3::from_shape_fn((rows, cols, 3), |(r, c, ch)| {
        to_byte(encode_srgb(intensity[[r, c]] * scale * tint[ch]))
    });
    Frame { data }
}

/// Greyscale phase map: `-pi` is black, `+pi` is white. Pixels where
/// `support` is zero stay black.
pub fn phase_frame(field: &Array2<Complex64>, support: &Array2<f64>) -> Frame {
    let (rows, cols) = field.dim();
    let data = Array3::from_shape_fn((rows, cols, 3), |(r, c, _)| {
        if support[[r, c]] <= 0.0 {
            return 0;
        }
        to_byte((field[[r, c]].arg() + PI) / (2.0 * PI))
    });
    Frame { data }
}

/// Centred `rows x cols` window of a larger grid.
pub fn crop_center<T: Clone>(grid: &Array2<T>, rows: usize, cols: usize) -> Array2<T> {
    let (gr, gc) = grid.dim();
    let r0 = gr.saturating_sub(rows) / 2;
    let c0 = gc.saturating_sub(cols) / 2;
    grid.slice(ndarray::s![r0..r0 + rows.min(gr), c0..c0 + cols.min(gc)])
        .to_owned()
}
