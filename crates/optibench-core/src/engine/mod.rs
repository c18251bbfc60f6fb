//! Engine adapter: swappable renderers behind one interface.
//!
//! | Engine | Identifier | Elements used |
//! |--------|-----------|---------------|
//! | [`forward::ForwardEngine`] | `forward` / "Diffractsim Forward" | Aperture, Lens, Screen |
//! | [`reverse::ReverseEngine`] | `reverse` / "Diffractsim Reverse" | ApertureResult, Lens, TargetIntensity, Screen |
//! | [`bitmap::BitmapEngine`] | `bitmap` / "Bitmap Reverse" | ApertureResult, TargetIntensity, Screen |
//!
//! Engines receive elements already expanded into screen slices and sorted
//! for simulation (see [`crate::pipeline`]). Every engine returns one frame
//! per screen slice; kinds an engine does not use are skipped.

pub mod bitmap;
pub mod color;
pub mod field;
pub mod forward;
pub mod reverse;
pub(crate) mod walk;

use std::sync::Arc;

use ndarray::Array3;
use optibench_compute::{ComputeBackend, ComputeError, DeviceInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::{
    ApertureParams, ApertureResultParams, ElementKind, LensParams, TargetIntensityParams,
};
use crate::workspace::{FieldType, SystemParams};

/// Faults raised while rendering.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),

    #[error("Target plane at {target_mm} mm is not after the result plane at {result_mm} mm")]
    NonPositiveInverseDistance { result_mm: f64, target_mm: f64 },

    #[error("Field type {0:?} is not supported by this engine")]
    UnsupportedFieldType(FieldType),

    #[error("Invalid simulation grid: {0}")]
    InvalidGrid(String),

    #[error("Unknown engine '{0}'")]
    UnknownEngine(String),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

/// An RGB image, `height x width x 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Array3<u8>,
}

impl Frame {
    /// All-black frame of the given grid shape.
    pub fn blank(rows: usize, cols: usize) -> Self {
        Self {
            data: Array3::zeros((rows.max(1), cols.max(1), 3)),
        }
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    /// `[height, width, 3]`.
    pub fn shape(&self) -> [usize; 3] {
        let (h, w, c) = self.data.dim();
        [h, w, c]
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    pub fn to_image(&self) -> image::RgbImage {
        let (h, w, _) = self.data.dim();
        image::RgbImage::from_fn(w as u32, h as u32, |x, y| {
            let (r, c) = (y as usize, x as usize);
            image::Rgb([self.data[[r, c, 0]], self.data[[r, c, 1]], self.data[[r, c, 2]]])
        })
    }
}

/// Position of a screen slice inside its range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceInfo {
    /// 1-based.
    pub slice_index: u32,
    pub range_start_mm: f64,
    pub range_end_mm: f64,
    pub total_steps: u32,
}

/// Engine-side form of one element.
#[derive(Debug, Clone, PartialEq)]
pub enum SimRole {
    Aperture(ApertureParams),
    Lens(LensParams),
    /// Capture point; `Some` when the screen came from an enabled range.
    Screen(Option<SliceInfo>),
    ApertureResult(ApertureResultParams),
    TargetIntensity(TargetIntensityParams),
}

/// One entry of the expanded, simulation-ordered element list.
#[derive(Debug, Clone, PartialEq)]
pub struct SimElement {
    pub name: String,
    pub distance_mm: f64,
    pub role: SimRole,
}

impl SimElement {
    pub fn kind(&self) -> ElementKind {
        match self.role {
            SimRole::Aperture(_) => ElementKind::Aperture,
            SimRole::Lens(_) => ElementKind::Lens,
            SimRole::Screen(_) => ElementKind::Screen,
            SimRole::ApertureResult(_) => ElementKind::ApertureResult,
            SimRole::TargetIntensity(_) => ElementKind::TargetIntensity,
        }
    }

    pub fn is_screen(&self) -> bool {
        matches!(self.role, SimRole::Screen(_))
    }
}

/// Everything an engine needs for one render.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub params: &'a SystemParams,
    /// Expanded and sorted for simulation.
    pub elements: &'a [SimElement],
    pub workspace_name: &'a str,
}

/// A frame captured at `elements[element]` of the request.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub element: usize,
    pub frame: Frame,
}

/// Result of a render.
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    /// One entry per capture, in simulation order.
    pub frames: Vec<CapturedFrame>,
    /// Engine-chosen preview when no frame was captured.
    pub preview: Option<Frame>,
    /// Degraded behaviour worth reporting (substituted bitmaps, ...).
    pub warnings: Vec<String>,
}

/// Static description of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub kinds: &'static [ElementKind],
}

impl EngineInfo {
    pub fn supports(&self, kind: ElementKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// A renderer for expanded element lists.
pub trait Engine: Send + Sync {
    fn info(&self) -> EngineInfo;

    /// Compute device the engine runs on, if any.
    fn device(&self) -> Option<DeviceInfo> {
        None
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, EngineError>;
}

/// Descriptions of every built-in engine.
pub fn available_engines() -> [EngineInfo; 3] {
    [forward::INFO, reverse::INFO, bitmap::INFO]
}

/// Build an engine from its identifier or display name (case-insensitive).
pub fn create_engine(
    name: &str,
    backend: Arc<dyn ComputeBackend>,
) -> Result<Arc<dyn Engine>, EngineError> {
    let key = name.trim().to_ascii_lowercase();
    let matches = |info: &EngineInfo| {
        key == info.name || key == info.display_name.to_ascii_lowercase()
    };
    if matches(&forward::INFO) {
        Ok(Arc::new(forward::ForwardEngine::new(backend)))
    } else if matches(&reverse::INFO) {
        Ok(Arc::new(reverse::ReverseEngine::new(backend)))
    } else if matches(&bitmap::INFO) {
        Ok(Arc::new(bitmap::BitmapEngine))
    } else {
        Err(EngineError::UnknownEngine(name.to_string()))
    }
}
