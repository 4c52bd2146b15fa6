//! Pure conversions from raw axis values to command percentages
//!
//! DualShock sticks and triggers report `0..=255`; sticks rest near 128. All
//! results are on the `[-100, 100]` scale used by drive and accessory commands.

/// Width of the band around zero that is snapped to zero
pub const DEFAULT_DEADZONE: f64 = 6.2;

/// Stick scale factor: `raw * 0.78 - 100` puts the resting position near 0
pub const STICK_SCALE: f64 = 0.78;

/// Full-scale trigger reading
pub const DEFAULT_TRIGGER_MAX: i32 = 255;

/// Default weight of the cubic term in [`shape`]
pub const DEFAULT_SHAPING_WEIGHT: f64 = 0.6;

/// Snap `|value| < band` to exactly zero, leave everything else untouched
pub fn apply_deadzone(value: f64, band: f64) -> f64 {
    if value.abs() < band {
        0.0
    } else {
        value
    }
}

/// Stick reading to percent, `128 -> -0.16`
pub fn stick_to_percent(raw: i32) -> f64 {
    (raw as f64 * STICK_SCALE - 100.0).clamp(-100.0, 100.0)
}

/// Right trigger drives forward, left trigger backward
pub fn triggers_to_speed(right: i32, left: i32, max: i32) -> f64 {
    let max = max.max(1) as f64;
    let speed = (right as f64 / max) * 100.0 - (left as f64 / max) * 100.0;
    speed.clamp(-100.0, 100.0)
}

/// Cubic-plus-linear response curve `w*x^3 + (1-w)*x` on the percent scale
///
/// Odd, monotonic for `w` in `[0, 1]` and keeps `±100` at the ends, so small
/// deflections get gentler without losing full lock.
pub fn shape(value: f64, weight: f64) -> f64 {
    let weight = weight.clamp(0.0, 1.0);
    let x = (value / 100.0).clamp(-1.0, 1.0);
    (weight * x * x * x + (1.0 - weight) * x) * 100.0
}
