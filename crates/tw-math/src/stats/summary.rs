//! Five-number summaries for sliding-window threshold computation.
//!
//! `std` is the population standard deviation (divisor `n`, not `n - 1`):
//! a window is the whole population of interest, not a sample from one.
//! Percentiles use the linear interpolation from [`crate::stats::percentile`].

use serde::Serialize;

use super::percentile::{median, percentile};

/// Summary statistics over the retained values of one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Compute a [`Summary`] over the given samples.
///
/// Non-finite samples (NaN, infinities) are ignored; returns `None` when no
/// finite samples remain.
pub fn summarize(samples: &[f64]) -> Option<Summary> {
    let mut values: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    Some(Summary {
        mean,
        std: variance.sqrt(),
        median: median(&values)?,
        p95: percentile(&values, 95.0)?,
        p99: percentile(&values, 99.0)?,
    })
}

/// Coefficient of variation (`std / mean`), the volatility signal.
///
/// Returns `None` when the mean is zero: the ratio is undefined there, and
/// callers must treat "undefined" explicitly rather than see a division
/// artifact.
pub fn coefficient_of_variation(std: f64, mean: f64) -> Option<f64> {
    if mean == 0.0 {
        None
    } else {
        Some(std / mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[]), None);
        assert_eq!(summarize(&[f64::NAN, f64::INFINITY]), None);
    }

    #[test]
    fn test_summarize_population_std() {
        // 50 x 180 + 50 x 220: mean 200, population std exactly 20.
        let mut values = vec![180.0; 50];
        values.extend(vec![220.0; 50]);
        let s = summarize(&values).unwrap();
        assert!((s.mean - 200.0).abs() < 1e-12);
        assert!((s.std - 20.0).abs() < 1e-12);
        assert!((s.median - 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_percentiles() {
        let values: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let s = summarize(&values).unwrap();
        assert!((s.p95 - 95.05).abs() < 1e-9);
        assert!((s.p99 - 99.01).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_unsorted_input() {
        let s = summarize(&[5.0, 1.0, 3.0]).unwrap();
        assert!((s.median - 3.0).abs() < 1e-12);
        assert!((s.mean - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_ignores_non_finite() {
        let s = summarize(&[1.0, f64::NAN, 3.0]).unwrap();
        assert!((s.mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_coefficient_of_variation_zero_mean() {
        assert_eq!(coefficient_of_variation(5.0, 0.0), None);
        assert_eq!(coefficient_of_variation(10.0, 200.0), Some(0.05));
    }

    proptest! {
        #[test]
        fn prop_summary_ordering(
            values in proptest::collection::vec(0.0f64..1e6, 1..300),
        ) {
            let s = summarize(&values).unwrap();
            // Order statistics are monotone: median <= p95 <= p99 <= max.
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            prop_assert!(s.median <= s.p95 + 1e-9);
            prop_assert!(s.p95 <= s.p99 + 1e-9);
            prop_assert!(s.p99 <= max + 1e-9);
            prop_assert!(s.mean >= min - 1e-9 && s.mean <= max + 1e-9);
            prop_assert!(s.std >= 0.0);
        }
    }
}
