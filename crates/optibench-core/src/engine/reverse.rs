//! Inverse design by phase retrieval.
//!
//! Finds a phase profile on the ApertureResult plane whose propagated
//! intensity on the TargetIntensity plane matches the target bitmap, passing
//! through any lenses in between. The amplitude on the result plane is
//! fixed to 1 inside the support rectangle and 0 outside.
//!
//! | Method | Update |
//! |--------|--------|
//! | Gerchberg-Saxton | Alternate projections onto the target amplitude and the support |
//! | Conjugate gradient | Fletcher-Reeves on $L(\varphi) = \sum (|Fu|^2 - T)^2$ |
//!
//! Captures: the retrieved phase at the result plane, the reconstructed
//! intensity at the target plane and at every screen downstream of the
//! result plane. Screens upstream of it receive a blank frame.

use std::f64::consts::PI;
use std::sync::Arc;

use log::{debug, info};
use ndarray::{Array2, Zip};
use num_complex::Complex64;
use optibench_compute::{ComputeBackend, DeviceInfo};

use super::color::{self, crop_center};
use super::field::ScalarField;
use super::forward::initial_field;
use super::walk::{walk, Walker, DISTANCE_TOLERANCE_MM};
use super::{Engine, EngineError, EngineInfo, Frame, RenderOutput, RenderRequest, SimElement, SimRole};
use crate::assets::{load_bitmap, load_bitmap_or_white, BitmapSpec};
use crate::element::{ApertureResultParams, ElementKind, RetrievalMethod, TargetIntensityParams};

pub const INFO: EngineInfo = EngineInfo {
    name: "reverse",
    display_name: "Diffractsim Reverse",
    kinds: &[
        ElementKind::ApertureResult,
        ElementKind::Lens,
        ElementKind::TargetIntensity,
        ElementKind::Screen,
    ],
};

/// Phase retrieval between an ApertureResult and a TargetIntensity plane.
pub struct ReverseEngine {
    backend: Arc<dyn ComputeBackend>,
}

impl ReverseEngine {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Propagate(f64),
    Lens(f64),
}

/// Linear optics between the result and target planes.
#[derive(Debug, Clone)]
struct Optics {
    stages: Vec<Stage>,
}

impl Optics {
    fn between(elements: &[SimElement], result: usize, target: usize) -> Self {
        let mut stages = Vec::new();
        let mut position = elements[result].distance_mm;
        for element in &elements[result + 1..target] {
            if let SimRole::Lens(lens) = &element.role {
                let dz = element.distance_mm - position;
                if dz.abs() > DISTANCE_TOLERANCE_MM {
                    stages.push(Stage::Propagate(dz));
                    position = element.distance_mm;
                }
                stages.push(Stage::Lens(lens.focal_length_mm));
            }
        }
        let dz = elements[target].distance_mm - position;
        if dz.abs() > DISTANCE_TOLERANCE_MM {
            stages.push(Stage::Propagate(dz));
        }
        Self { stages }
    }

    fn forward(&self, field: &mut ScalarField) -> Result<(), EngineError> {
        for stage in &self.stages {
            match *stage {
                Stage::Propagate(dz) => field.propagate(dz)?,
                Stage::Lens(f) => field.apply_lens(f)?,
            }
        }
        Ok(())
    }

    /// Adjoint of [`forward`](Self::forward).
    fn backward(&self, field: &mut ScalarField) -> Result<(), EngineError> {
        for stage in self.stages.iter().rev() {
            match *stage {
                Stage::Propagate(dz) => field.propagate(-dz)?,
                Stage::Lens(f) => field.apply_lens(-f)?,
            }
        }
        Ok(())
    }
}

/// Inputs of one retrieval on the (padded) grid.
struct Problem {
    optics: Optics,
    /// Template field carrying grid and wavelength.
    template: ScalarField,
    support: Array2<f64>,
    /// Target intensity scaled to the power passing the support.
    target: Array2<f64>,
}

impl Problem {
    fn aperture_field(&self, phase: &Array2<f64>) -> Array2<Complex64> {
        let mut u = phase.mapv(|p| Complex64::from_polar(1.0, p));
        u.zip_mut_with(&self.support, |a, &s| *a *= s);
        u
    }

    fn propagate(&self, u: Array2<Complex64>) -> Result<ScalarField, EngineError> {
        let mut field = self.template.with_amplitude(u);
        self.optics.forward(&mut field)?;
        Ok(field)
    }

    fn loss(&self, phase: &Array2<f64>) -> Result<f64, EngineError> {
        let v = self.propagate(self.aperture_field(phase))?;
        Ok(Zip::from(v.amplitude())
            .and(&self.target)
            .fold(0.0, |acc, a, &t| {
                let r = a.norm_sqr() - t;
                acc + r * r
            }))
    }

    /// Loss and its gradient with respect to the phase.
    fn loss_and_gradient(&self, phase: &Array2<f64>) -> Result<(f64, Array2<f64>), EngineError> {
        let u = self.aperture_field(phase);
        let mut v = self.propagate(u.clone())?;
        let mut loss = 0.0;
        v.amplitude.zip_mut_with(&self.target, |a, &t| {
            let r = a.norm_sqr() - t;
            loss += r * r;
            *a *= 2.0 * r;
        });
        self.optics.backward(&mut v)?;
        let mut grad = Array2::<f64>::zeros(u.dim());
        Zip::from(&mut grad)
            .and(v.amplitude())
            .and(&u)
            .for_each(|g, w, u| *g = 2.0 * (w * u.conj()).im);
        Ok((loss, grad))
    }
}

/// Deterministic scrambled starting phase.
fn initial_phase(shape: (usize, usize)) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(r, c)| {
        let s = (r as f64 * 12.9898 + c as f64 * 78.233).sin() * 43_758.545_3;
        2.0 * PI * (s - s.floor())
    })
}

fn gerchberg_saxton(problem: &Problem, maxiter: u32) -> Result<Array2<f64>, EngineError> {
    let amplitude = problem.target.mapv(f64::sqrt);
    let mut phase = initial_phase(problem.support.dim());
    for _ in 0..maxiter {
        let mut v = problem.propagate(problem.aperture_field(&phase))?;
        v.amplitude
            .zip_mut_with(&amplitude, |a, &t| *a = Complex64::from_polar(t, a.arg()));
        problem.optics.backward(&mut v)?;
        phase = v.amplitude().mapv(|a| a.arg());
    }
    Ok(phase)
}

fn dot(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    Zip::from(a).and(b).fold(0.0, |acc, x, y| acc + x * y)
}

fn conjugate_gradient(problem: &Problem, maxiter: u32) -> Result<Array2<f64>, EngineError> {
    const RESTART: u32 = 20;
    const MAX_HALVINGS: u32 = 30;

    let mut phase = initial_phase(problem.support.dim());
    let (mut loss, mut grad) = problem.loss_and_gradient(&phase)?;
    let mut direction = grad.mapv(|g| -g);
    let mut grad_sq = dot(&grad, &grad);

    for iter in 0..maxiter {
        if grad_sq == 0.0 {
            break;
        }
        let peak = direction.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
        if peak == 0.0 {
            break;
        }
        // First trial step moves no pixel by more than half a radian.
        let mut step = 0.5 / peak;
        let mut accepted = None;
        for _ in 0..MAX_HALVINGS {
            let trial = &phase + &(&direction * step);
            let trial_loss = problem.loss(&trial)?;
            if trial_loss < loss {
                accepted = Some(trial);
                break;
            }
            step *= 0.5;
        }
        let Some(next) = accepted else {
            debug!("conjugate gradient stalled after {iter} iterations");
            break;
        };
        phase = next;

        let (next_loss, next_grad) = problem.loss_and_gradient(&phase)?;
        let next_grad_sq = dot(&next_grad, &next_grad);
        let beta = if (iter + 1) % RESTART == 0 { 0.0 } else { next_grad_sq / grad_sq };
        direction = &direction * beta - &next_grad;
        if dot(&direction, &next_grad) >= 0.0 {
            direction = next_grad.mapv(|g| -g);
        }
        loss = next_loss;
        grad = next_grad;
        grad_sq = next_grad_sq;
    }
    debug!("conjugate gradient final loss {loss:.4e}, |g|^2 {:.4e}", dot(&grad, &grad));
    Ok(phase)
}

struct ReverseWalk {
    retrieved: ScalarField,
    support: Array2<f64>,
    field: Option<ScalarField>,
    shape: (usize, usize),
    tint: [f64; 3],
    warnings: Vec<String>,
}

impl ReverseWalk {
    fn capture_intensity(&self, field: &ScalarField) -> Frame {
        let (rows, cols) = self.shape;
        color::intensity_frame(&crop_center(&field.intensity(), rows, cols), self.tint)
    }
}

impl Walker for ReverseWalk {
    fn propagate(&mut self, delta_mm: f64) -> Result<(), EngineError> {
        match self.field.as_mut() {
            Some(field) => field.propagate(delta_mm),
            None => Ok(()),
        }
    }

    fn visit(&mut self, element: &SimElement) -> Result<Option<Frame>, EngineError> {
        let (rows, cols) = self.shape;
        match &element.role {
            SimRole::ApertureResult(_) if self.field.is_none() => {
                let field = self.retrieved.clone();
                let frame = color::phase_frame(
                    &crop_center(field.amplitude(), rows, cols),
                    &crop_center(&self.support, rows, cols),
                );
                self.field = Some(field);
                Ok(Some(frame))
            }
            SimRole::Lens(lens) => {
                if let Some(field) = self.field.as_mut() {
                    field.apply_lens(lens.focal_length_mm)?;
                }
                Ok(None)
            }
            SimRole::TargetIntensity(_) => Ok(self.field.as_ref().map(|f| self.capture_intensity(f))),
            SimRole::Screen(_) => match &self.field {
                Some(field) => Ok(Some(self.capture_intensity(field))),
                None => {
                    self.warnings.push(format!(
                        "{}: screen at {:.2} mm lies before the result plane; blank frame",
                        element.name, element.distance_mm
                    ));
                    Ok(Some(Frame::blank(rows, cols)))
                }
            },
            _ => Ok(None),
        }
    }
}

fn find_planes(
    elements: &[SimElement],
) -> Result<(usize, &ApertureResultParams, usize, &TargetIntensityParams), EngineError> {
    let result = elements.iter().enumerate().find_map(|(i, e)| match &e.role {
        SimRole::ApertureResult(p) => Some((i, p)),
        _ => None,
    });
    let target = elements.iter().enumerate().find_map(|(i, e)| match &e.role {
        SimRole::TargetIntensity(p) => Some((i, p)),
        _ => None,
    });
    match (result, target) {
        (Some((ri, rp)), Some((ti, tp))) => {
            let (result_mm, target_mm) = (elements[ri].distance_mm, elements[ti].distance_mm);
            if target_mm <= result_mm || ti < ri {
                return Err(EngineError::NonPositiveInverseDistance { result_mm, target_mm });
            }
            Ok((ri, rp, ti, tp))
        }
        (None, _) => Err(EngineError::MissingRequiredElement(
            "a reverse solve needs an ApertureResult element".into(),
        )),
        (_, None) => Err(EngineError::MissingRequiredElement(
            "a reverse solve needs a TargetIntensity element".into(),
        )),
    }
}

impl Engine for ReverseEngine {
    fn info(&self) -> EngineInfo {
        INFO
    }

    fn device(&self) -> Option<DeviceInfo> {
        Some(self.backend.device_info())
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, EngineError> {
        let params = request.params;
        let base = initial_field(params, &self.backend)?;
        let (result_idx, result, target_idx, target) = find_planes(request.elements)?;

        let shape = base.shape();
        let pad = result.padding as usize;
        let padded = (shape.0 + 2 * pad, shape.1 + 2 * pad);
        let pitch = (
            params.extent_x_mm / shape.1 as f64,
            params.extent_y_mm / shape.0 as f64,
        );
        let template = ScalarField::plane_wave(padded, params.wavelength_nm, pitch, Arc::clone(&self.backend))?;

        let px_per_mm = params.resolution_px_per_mm;
        let support_spec = BitmapSpec {
            image_path: "",
            width_mm: result.width_mm,
            height_mm: result.height_mm,
            is_inverted: false,
        };
        let support = load_bitmap(&support_spec, padded, px_per_mm)
            .map(|b| b.support)
            .unwrap_or_else(|_| Array2::ones(padded));

        let mut warnings = Vec::new();
        let target_spec = BitmapSpec {
            image_path: &target.image_path,
            width_mm: target.width_mm,
            height_mm: target.height_mm,
            is_inverted: target.is_inverted,
        };
        let (target_bitmap, warning) = load_bitmap_or_white(&target_spec, padded, px_per_mm);
        if let Some(w) = warning {
            warnings.push(format!("{}: {w}", request.elements[target_idx].name));
        }
        let mut target_intensity = target_bitmap.values;
        let target_power = target_intensity.sum();
        if target_power > 0.0 {
            target_intensity *= support.sum() / target_power;
        }

        let problem = Problem {
            optics: Optics::between(request.elements, result_idx, target_idx),
            template,
            support,
            target: target_intensity,
        };
        info!(
            "phase retrieval ({:?}, {} iterations, {}x{} grid)",
            result.method, result.maxiter, padded.0, padded.1
        );
        let phase = match result.method {
            RetrievalMethod::GerchbergSaxton => gerchberg_saxton(&problem, result.maxiter)?,
            RetrievalMethod::ConjugateGradient => conjugate_gradient(&problem, result.maxiter)?,
        };
        debug!("retrieval loss {:.4e}", problem.loss(&phase)?);

        let retrieved = problem.template.with_amplitude(problem.aperture_field(&phase));
        let tint = color::wavelength_rgb(params.wavelength_nm);
        let mut state = ReverseWalk {
            retrieved,
            support: problem.support,
            field: None,
            shape,
            tint,
            warnings,
        };
        let frames = walk(&mut state, request.elements)?;
        let preview = state.field.as_ref().map(|f| state.capture_intensity(f));
        Ok(RenderOutput {
            frames,
            preview,
            warnings: state.warnings,
        })
    }
}
