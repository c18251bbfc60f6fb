//! Forward scalar propagation: a plane wave through apertures and lenses,
//! captured at every screen slice.

use std::sync::Arc;

use log::debug;
use optibench_compute::{ComputeBackend, DeviceInfo};

use super::field::ScalarField;
use super::walk::{walk, Walker};
use super::{Engine, EngineError, EngineInfo, Frame, RenderOutput, RenderRequest, SimElement, SimRole};
use crate::assets::{load_bitmap_or_white, BitmapSpec};
use crate::element::ElementKind;
use crate::workspace::{FieldType, SystemParams};

pub const INFO: EngineInfo = EngineInfo {
    name: "forward",
    display_name: "Diffractsim Forward",
    kinds: &[ElementKind::Aperture, ElementKind::Lens, ElementKind::Screen],
};

/// Angular-spectrum forward propagation.
pub struct ForwardEngine {
    backend: Arc<dyn ComputeBackend>,
}

impl ForwardEngine {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }
}

/// Plane wave on the request's grid, after checking the field type.
pub(crate) fn initial_field(
    params: &SystemParams,
    backend: &Arc<dyn ComputeBackend>,
) -> Result<ScalarField, EngineError> {
    if params.field_type != FieldType::Monochromatic {
        return Err(EngineError::UnsupportedFieldType(params.field_type));
    }
    let shape = params.grid_shape();
    let pitch = (
        params.extent_x_mm / shape.1 as f64,
        params.extent_y_mm / shape.0 as f64,
    );
    ScalarField::plane_wave(shape, params.wavelength_nm, pitch, Arc::clone(backend))
}

struct ForwardWalk<'a> {
    field: ScalarField,
    params: &'a SystemParams,
    warnings: Vec<String>,
}

impl Walker for ForwardWalk<'_> {
    fn propagate(&mut self, delta_mm: f64) -> Result<(), EngineError> {
        self.field.propagate(delta_mm)
    }

    fn visit(&mut self, element: &SimElement) -> Result<Option<Frame>, EngineError> {
        match &element.role {
            SimRole::Aperture(p) => {
                let spec = BitmapSpec {
                    image_path: &p.image_path,
                    width_mm: p.width_mm,
                    height_mm: p.height_mm,
                    is_inverted: p.is_inverted,
                };
                let (bitmap, warning) = load_bitmap_or_white(
                    &spec,
                    self.field.shape(),
                    self.params.resolution_px_per_mm,
                );
                if let Some(w) = warning {
                    self.warnings.push(format!("{}: {w}", element.name));
                }
                if p.is_phasemask {
                    self.field.apply_phase_mask(&bitmap.values, &bitmap.support)?;
                } else {
                    self.field.apply_amplitude_mask(&bitmap.values)?;
                }
                Ok(None)
            }
            SimRole::Lens(p) => {
                debug!("lens '{}' f = {} mm", element.name, p.focal_length_mm);
                self.field.apply_lens(p.focal_length_mm)?;
                Ok(None)
            }
            SimRole::Screen(_) => Ok(Some(self.field.capture())),
            SimRole::ApertureResult(_) | SimRole::TargetIntensity(_) => Ok(None),
        }
    }
}

impl Engine for ForwardEngine {
    fn info(&self) -> EngineInfo {
        INFO
    }

    fn device(&self) -> Option<DeviceInfo> {
        Some(self.backend.device_info())
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, EngineError> {
        let mut state = ForwardWalk {
            field: initial_field(request.params, &self.backend)?,
            params: request.params,
            warnings: Vec::new(),
        };
        let frames = walk(&mut state, request.elements)?;
        Ok(RenderOutput {
            frames,
            preview: Some(state.field.capture()),
            warnings: state.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ApertureParams, LensParams};
    use crate::engine::SliceInfo;
    use optibench_compute::SerialBackend;

    fn params() -> SystemParams {
        SystemParams {
            extent_x_mm: 1.0,
            extent_y_mm: 1.0,
            resolution_px_per_mm: 32.0,
            ..SystemParams::default()
        }
    }

    fn aperture(d: f64) -> SimElement {
        SimElement {
            name: "Aperture 1".into(),
            distance_mm: d,
            role: SimRole::Aperture(ApertureParams {
                image_path: String::new(),
                width_mm: 0.25,
                height_mm: 0.25,
                is_inverted: false,
                is_phasemask: false,
            }),
        }
    }

    fn screen(d: f64, slice: Option<SliceInfo>) -> SimElement {
        SimElement { name: "Screen 1".into(), distance_mm: d, role: SimRole::Screen(slice) }
    }

    #[test]
    fn test_one_frame_per_screen() {
        let engine = ForwardEngine::new(Arc::new(SerialBackend));
        let p = params();
        let elements = vec![
            aperture(10.0),
            SimElement {
                name: "Lens 1".into(),
                distance_mm: 20.0,
                role: SimRole::Lens(LensParams { focal_length_mm: 50.0 }),
            },
            screen(30.0, None),
            screen(40.0, None),
        ];
        let out = engine
            .render(&RenderRequest { params: &p, elements: &elements, workspace_name: "t" })
            .unwrap();
        assert_eq!(out.frames.len(), 2);
        assert_eq!(out.frames[0].element, 2);
        assert_eq!(out.frames[0].frame.shape(), [32, 32, 3]);
        assert!(!out.frames[0].frame.is_blank());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_screen_at_aperture_sees_the_aperture() {
        let engine = ForwardEngine::new(Arc::new(SerialBackend));
        let p = params();
        let elements = vec![aperture(10.0), screen(10.0, None)];
        let out = engine
            .render(&RenderRequest { params: &p, elements: &elements, workspace_name: "t" })
            .unwrap();
        let frame = &out.frames[0].frame;
        // 8 x 8 px opening centred on 32 x 32.
        assert!(frame.data[[16, 16, 0]] > 0);
        assert_eq!(frame.data[[0, 0, 0]], 0);
    }

    #[test]
    fn test_missing_bitmap_is_a_warning() {
        let engine = ForwardEngine::new(Arc::new(SerialBackend));
        let p = params();
        let mut ap = aperture(5.0);
        if let SimRole::Aperture(a) = &mut ap.role {
            a.image_path = "/nonexistent/slit.png".into();
        }
        let elements = vec![ap, screen(6.0, None)];
        let out = engine
            .render(&RenderRequest { params: &p, elements: &elements, workspace_name: "t" })
            .unwrap();
        assert_eq!(out.frames.len(), 1);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].starts_with("Aperture 1"));
    }

    #[test]
    fn test_polychromatic_is_unsupported() {
        let engine = ForwardEngine::new(Arc::new(SerialBackend));
        let p = SystemParams { field_type: FieldType::Polychromatic, ..params() };
        let err = engine
            .render(&RenderRequest { params: &p, elements: &[], workspace_name: "t" })
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFieldType(FieldType::Polychromatic)));
    }
}
