//! Clamping rules shared by every fault magnitude.
//!
//! `f64::max` and `f64::min` return the non-NaN operand, so a NaN input lands
//! on the lower bound (0) instead of slipping past the range check.

pub const MIN_MAGNITUDE: f64 = 0.0;
pub const MAX_PERCENT: f64 = 100.0;

/// `max(0, x)`. NaN maps to 0, `+inf` is kept.
pub fn non_negative(x: f64) -> f64 {
    // adding 0.0 folds -0.0 into +0.0
    x.max(MIN_MAGNITUDE) + 0.0
}

/// `min(max(0, x), 100)`. NaN maps to 0.
pub fn percent(x: f64) -> f64 {
    non_negative(x).min(MAX_PERCENT)
}

/// True when storing `requested` would change the value.
pub fn was_coerced(requested: f64, stored: f64) -> bool {
    requested.is_nan() || requested != stored
}
