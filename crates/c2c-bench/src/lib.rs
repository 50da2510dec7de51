// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic fixtures shared by the benchmarks.

use c2c_core::{C2cError, SeriesTable};

/// Annual dates starting at 1984.
pub fn years(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1984.0 + i as f64).collect()
}

/// A stable canopy that drops at `n / 3` and recovers linearly over five
/// samples, with a small deterministic ripple and one cloud gap.
pub fn disturbance_series(n: usize, seed: u64) -> Vec<f64> {
    let drop_at = n / 3;
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..n)
        .map(|i| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let ripple = ((state >> 33) % 41) as f64 - 20.0;
            let base = if i < drop_at {
                800.0
            } else {
                (300.0 + 100.0 * (i - drop_at) as f64).min(800.0)
            };
            if i == n / 2 { 0.0 } else { base + ripple }
        })
        .collect()
}

/// `rows` disturbance series of length `n`, keyed by row number.
pub fn disturbance_table(rows: usize, n: usize) -> Result<SeriesTable, C2cError> {
    let data = (0..rows)
        .map(|row| {
            std::iter::once(row as f64)
                .chain(disturbance_series(n, row as u64))
                .collect()
        })
        .collect();
    SeriesTable::new(years(n), data)
}

#[cfg(test)]
mod tests {
    use super::{disturbance_series, disturbance_table};

    #[test]
    fn fixtures_are_deterministic_and_shaped() {
        assert_eq!(disturbance_series(36, 3), disturbance_series(36, 3));
        assert_eq!(disturbance_series(36, 3)[18], 0.0);
        let table = disturbance_table(4, 36).expect("fixture table should be valid");
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.dates().len(), 36);
    }
}
