//! Unit conversion between millimeters and stepper pulse counts
//!
//! All device motion is expressed in whole steps; callers work in
//! millimeters. The conversion factor (`steps_per_mm`) is configured per
//! axis.
//!
//! Rounding policy: half-away-from-zero. A delta of 0.05mm at 10 steps/mm
//! is one step, -0.05mm is minus one step. Truncating toward zero instead
//! would silently drop up to one step of travel per move and drift over
//! long move sequences.

/// Convert a millimeter distance to a signed whole step count.
///
/// * `delta_mm` - Distance in millimeters (signed)
/// * `steps_per_mm` - Axis step density
pub fn mm_to_steps(delta_mm: f64, steps_per_mm: f64) -> i64 {
    (delta_mm * steps_per_mm).round() as i64
}

/// Convert a raw step count back to millimeters.
///
/// * `steps` - Signed step count
/// * `steps_per_mm` - Axis step density
pub fn steps_to_mm(steps: i64, steps_per_mm: f64) -> f64 {
    steps as f64 / steps_per_mm
}

/// Compute the step period in microseconds for a feed speed.
///
/// The period is derived from the X axis step density only; the firmware
/// uses it as the shared timing base for all axes.
///
/// * `steps_per_mm_x` - X axis step density
/// * `mm_per_s` - Requested feed speed
pub fn step_period_us(steps_per_mm_x: f64, mm_per_s: f64) -> i64 {
    (1_000_000.0 / (steps_per_mm_x * mm_per_s)).round() as i64
}

/// Resolution of one step in millimeters (`1 / steps_per_mm`).
pub fn step_resolution_mm(steps_per_mm: f64) -> f64 {
    1.0 / steps_per_mm
}
