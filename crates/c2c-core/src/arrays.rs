// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Index of the smallest value, first occurrence on ties.
///
/// NaN entries never win against a number. A slice made only of NaN yields
/// index 0, and an empty slice yields `None`.
pub fn argmin(values: &[f64]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }

    let mut best = 0usize;
    for (idx, &value) in values.iter().enumerate().skip(1) {
        let current = values[best];
        if value < current || (current.is_nan() && !value.is_nan()) {
            best = idx;
        }
    }
    Some(best)
}

/// Linear interpolation between `y1` and `y2` at fraction `frac`.
#[inline]
pub fn lerp(y1: f64, y2: f64, frac: f64) -> f64 {
    y1 * (1.0 - frac) + y2 * frac
}

/// Number of observations that are not the `0` missing sentinel.
pub fn count_valid(values: &[f64]) -> usize {
    values.iter().filter(|&&v| v != 0.0).count()
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::{argmin, count_valid, lerp, mean};

    #[test]
    fn argmin_prefers_first_occurrence() {
        assert_eq!(argmin(&[3.0, 1.0, 2.0, 1.0]), Some(1));
        assert_eq!(argmin(&[5.0]), Some(0));
        assert_eq!(argmin(&[]), None);
    }

    #[test]
    fn argmin_skips_nan() {
        assert_eq!(argmin(&[f64::NAN, 4.0, 2.0]), Some(2));
        assert_eq!(argmin(&[1.0, f64::NAN, 2.0]), Some(0));
        assert_eq!(argmin(&[f64::NAN, f64::NAN]), Some(0));
    }

    #[test]
    fn lerp_hits_endpoints_and_midpoint() {
        assert_eq!(lerp(10.0, 20.0, 0.0), 10.0);
        assert_eq!(lerp(10.0, 20.0, 1.0), 20.0);
        assert_eq!(lerp(10.0, 20.0, 0.5), 15.0);
    }

    #[test]
    fn count_valid_ignores_zero_sentinel() {
        assert_eq!(count_valid(&[0.0, 1.0, -2.0, 0.0, 3.5]), 3);
        assert_eq!(count_valid(&[]), 0);
    }

    #[test]
    fn mean_of_empty_is_nan() {
        assert!(mean(&[]).is_nan());
        assert_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }
}
