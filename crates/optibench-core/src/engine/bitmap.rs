//! Bitmap stand-in engine.
//!
//! Synthesises a fixed radial gradient at every screen slice without any
//! propagation. It exercises the whole solve pipeline (expansion, file
//! naming, animations, metadata) in milliseconds, which makes it the engine
//! of choice for tests and for checking a bench layout.

use ndarray::Array3;

use super::{Engine, EngineError, EngineInfo, Frame, RenderOutput, RenderRequest};
use super::{CapturedFrame, SimElement};
use crate::element::ElementKind;

pub const INFO: EngineInfo = EngineInfo {
    name: "bitmap",
    display_name: "Bitmap Reverse",
    kinds: &[
        ElementKind::ApertureResult,
        ElementKind::TargetIntensity,
        ElementKind::Screen,
    ],
};

#[derive(Debug, Default, Clone, Copy)]
pub struct BitmapEngine;

/// Radial gradient: red grows and green fades with distance from the
/// centre, blue is constant at one half.
pub fn radial_gradient(rows: usize, cols: usize) -> Frame {
    let (cy, cx) = (rows as f64 / 2.0, cols as f64 / 2.0);
    let radius = |r: usize, c: usize| ((r as f64 - cy).powi(2) + (c as f64 - cx).powi(2)).sqrt();
    // The farthest sample from the centre is a corner.
    let r_max = radius(0, 0);
    let scale = if r_max > 0.0 { 1.0 / r_max } else { 0.0 };
    let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0) as u8;
    let data = Array3::from_shape_fn((rows, cols, 3), |(r, c, ch)| {
        let t = radius(r, c) * scale;
        match ch {
            0 => byte(t),
            1 => byte(1.0 - t),
            _ => byte(0.5),
        }
    });
    Frame { data }
}

impl Engine for BitmapEngine {
    fn info(&self) -> EngineInfo {
        INFO
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, EngineError> {
        let (rows, cols) = request.params.grid_shape();
        let frame = radial_gradient(rows, cols);
        let frames = request
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| SimElement::is_screen(e))
            .map(|(element, _)| CapturedFrame {
                element,
                frame: frame.clone(),
            })
            .collect();
        Ok(RenderOutput {
            frames,
            preview: Some(frame),
            warnings: Vec::new(),
        })
    }
}
