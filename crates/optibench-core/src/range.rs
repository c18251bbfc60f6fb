//! Screen range expansion.

/// Concrete sampling distances (mm) represented by a screen.
///
/// Returns `[distance]` when the range is disabled or `steps <= 1`; otherwise
/// `steps` evenly spaced samples from `distance` to `range_end` inclusive.
/// The last sample is `range_end` exactly.
pub fn expand(distance: f64, is_range: bool, range_end: f64, steps: u32) -> Vec<f64> {
    if !is_range || steps <= 1 {
        return vec![distance];
    }
    let n = steps as usize;
    let span = range_end - distance;
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| {
            if i == n - 1 {
                range_end
            } else {
                distance + span * (i as f64) / denom
            }
        })
        .collect()
}
