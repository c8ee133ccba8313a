//! Scene-change metric.

use strand_core::error::{EngineError, Result};
use strand_core::types::Frame;

/// Mean absolute byte difference between two frames, as a percentage of the
/// full 0–255 range.  Identical frames score 0, black against white 100.
pub fn frame_difference(a: &Frame, b: &Frame) -> Result<f32> {
    if !a.same_layout(b) {
        return Err(EngineError::Process(format!(
            "cannot compare {}x{} {} with {}x{} {}",
            a.width(),
            a.height(),
            a.format(),
            b.width(),
            b.height(),
            b.format()
        )));
    }
    let bytes = a.data().len();
    if bytes == 0 {
        return Ok(0.0);
    }
    let total: u64 = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    Ok((total as f64 * 100.0 / (bytes as f64 * 255.0)) as f32)
}
