//! The propagate-then-visit loop shared by the engines.

use log::debug;

use super::{CapturedFrame, EngineError, Frame, SimElement};

/// Distance steps at or below this (mm) are not propagated.
pub(crate) const DISTANCE_TOLERANCE_MM: f64 = 1e-12;

/// Per-engine behaviour at each element of the walk.
pub(crate) trait Walker {
    /// Advance the field by `delta_mm`.
    fn propagate(&mut self, delta_mm: f64) -> Result<(), EngineError>;

    /// Apply or capture `element`. Returning a frame records a capture.
    fn visit(&mut self, element: &SimElement) -> Result<Option<Frame>, EngineError>;
}

/// Walk `elements` in order, starting at the first element's distance.
pub(crate) fn walk<W: Walker>(
    walker: &mut W,
    elements: &[SimElement],
) -> Result<Vec<CapturedFrame>, EngineError> {
    let mut frames = Vec::new();
    let Some(first) = elements.first() else {
        return Ok(frames);
    };
    let mut position_mm = first.distance_mm;
    for (index, element) in elements.iter().enumerate() {
        let delta = element.distance_mm - position_mm;
        if delta.abs() > DISTANCE_TOLERANCE_MM {
            debug!("propagate {:.4} mm to '{}'", delta, element.name);
            walker.propagate(delta)?;
            position_mm = element.distance_mm;
        }
        if let Some(frame) = walker.visit(element)? {
            debug!("captured '{}' at {:.4} mm", element.name, element.distance_mm);
            frames.push(CapturedFrame { element: index, frame });
        }
    }
    Ok(frames)
}
