//! Linearly interpolated percentiles over sorted samples.
//!
//! The interpolation convention is the "linear" method: for percentile `p`
//! over `n` sorted values, the fractional rank is `p/100 * (n - 1)` and the
//! result interpolates between the two bracketing order statistics. The
//! median is `percentile(values, 50.0)` and both agree with the midpoint
//! convention for even-length inputs.

/// Interpolated percentile over an ascending-sorted, non-empty slice.
///
/// `p` is clamped to `[0, 100]`. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let frac = rank - lower as f64;
    if lower + 1 >= sorted.len() {
        return Some(sorted[sorted.len() - 1]);
    }
    Some(sorted[lower] * (1.0 - frac) + sorted[lower + 1] * frac)
}

/// Median of an ascending-sorted, non-empty slice.
pub fn median(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
