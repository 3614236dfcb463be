//! Arithmetic primitives.
//!
//! Fractional quantities are i64 fixed-point (SCALE = 10_000).
//! Rounding is truncation toward zero, everywhere.

/// Fixed-point scale factor. All "real" values are stored as `real * SCALE`.
pub const SCALE: i64 = 10_000;

/// Convert a whole percentage (e.g. `15` for 15%) to fixed-point.
pub const fn pct(percent: i64) -> i64 {
    percent * SCALE / 100
}

/// Multiply an integer by a fixed-point factor, truncating toward zero.
pub fn scale_mul(value: i64, factor_fp: i64) -> i64 {
    value.saturating_mul(factor_fp) / SCALE
}

/// Multiply two fixed-point values, truncating toward zero.
pub fn fp_mul(a_fp: i64, b_fp: i64) -> i64 {
    a_fp.saturating_mul(b_fp) / SCALE
}

/// Clamp a fixed-point probability into `[0, SCALE]`.
pub fn clamp_probability(p_fp: i64) -> i64 {
    p_fp.clamp(0, SCALE)
}

/// Fixed-point to float, for display and contract accessors only.
pub fn to_f64(value_fp: i64) -> f64 {
    value_fp as f64 / SCALE as f64
}
