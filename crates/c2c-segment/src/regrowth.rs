// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use c2c_core::{C2cError, Change, Regrowth};

/// Collects the recovery window after the disturbance vertex at `idx`.
///
/// Scans forward until the loss is fully regained and at least
/// `max(offsets)` samples were taken. The loss counts as regained once a
/// sample reaches the pre-disturbance value, which is exactly the 100%
/// threshold of [`Regrowth::years_to_regrowth`]. Returns `None` when the
/// series ends before that or the vertex is not a disturbance.
pub fn measure(values: &[f64], idx: usize, magnitude: f64, offsets: &[usize]) -> Option<Regrowth> {
    if magnitude.is_nan() || magnitude >= 0.0 {
        return None;
    }
    let vertex_value = *values.get(idx)?;
    let previous_value = vertex_value - magnitude;
    let min_window = offsets.iter().copied().max().unwrap_or(0);

    let mut next_values = vec![];
    let mut recovered = false;
    for &value in values.get(idx + 1..)? {
        next_values.push(value);
        recovered = recovered || value >= previous_value;
        if recovered && next_values.len() >= min_window {
            break;
        }
    }

    recovered.then(|| Regrowth::new(vertex_value, magnitude, next_values, offsets))
}

/// Maps each change date to its sample index with a single forward scan.
///
/// Dates must appear in `dates` in the same order as in `changes`.
pub fn locate_vertices(dates: &[f64], changes: &[Change]) -> Result<Vec<usize>, C2cError> {
    let mut out = Vec::with_capacity(changes.len());
    let mut cursor = 0usize;
    for (k, change) in changes.iter().enumerate() {
        let found = dates[cursor.min(dates.len())..]
            .iter()
            .position(|&date| date == change.date)
            .map(|offset| cursor + offset);
        let Some(idx) = found else {
            return Err(C2cError::internal_invariant(format!(
                "vertex {k} at date {} has no matching sample at or after index {cursor}",
                change.date
            )));
        };
        out.push(idx);
        cursor = idx + 1;
    }
    Ok(out)
}

/// Recomputes regrowth for every change against `values`, keeping the
/// vertex set and all other metrics as they are.
pub fn extend_with_regrowth(
    dates: &[f64],
    values: &[f64],
    changes: &mut [Change],
    offsets: &[usize],
) -> Result<usize, C2cError> {
    let indices = locate_vertices(dates, changes)?;
    let mut measured = 0usize;
    for (change, idx) in changes.iter_mut().zip(indices) {
        change.regrowth = measure(values, idx, change.magnitude, offsets);
        if change.regrowth.is_some() {
            measured += 1;
        }
    }
    Ok(measured)
}

#[cfg(test)]
mod tests {
    use super::{extend_with_regrowth, locate_vertices, measure};
    use c2c_core::{C2cError, Change};

    fn change(date: f64, value: f64, magnitude: f64) -> Change {
        Change {
            date,
            value,
            magnitude,
            duration: 1.0,
            post: None,
            regrowth: None,
        }
    }

    #[test]
    fn overshoot_then_relapse_still_counts_as_recovered() {
        let values = [800.0, 400.0, 850.0, 300.0, 300.0];
        let regrowth = measure(&values, 1, -400.0, &[4, 5, 6]).expect("series recovered once");
        assert_eq!(regrowth.next_values(), &[850.0, 300.0, 300.0]);
        assert_eq!(regrowth.years_to_full_regrowth(), Ok(1));
    }

    #[test]
    fn window_extends_to_largest_offset_after_recovery() {
        // Recovers at the second sample; window still runs to offset 6.
        let values = [800.0, 400.0, 600.0, 800.0, 820.0, 830.0, 840.0, 850.0, 860.0, 870.0];
        let regrowth = measure(&values, 1, -400.0, &[4, 5, 6]).expect("series recovers");
        assert_eq!(regrowth.next_values(), &values[2..8]);
        assert_eq!(regrowth.index_regrowth(), (830.0 + 840.0 + 850.0) / 3.0 - 400.0);
        assert_eq!(regrowth.years_to_full_regrowth(), Ok(2));
        assert_eq!(regrowth.years_to_regrowth(60.0), Ok(1));
    }

    #[test]
    fn window_extends_past_offsets_until_recovery() {
        let values = [800.0, 400.0, 450.0, 500.0, 550.0, 600.0, 650.0, 700.0, 750.0, 800.0];
        let regrowth = measure(&values, 1, -400.0, &[4, 5, 6]).expect("series recovers");
        assert_eq!(regrowth.next_values().len(), 8);
        assert_eq!(regrowth.years_to_full_regrowth(), Ok(8));
    }

    #[test]
    fn exhausted_series_yields_no_regrowth() {
        let values = [800.0, 400.0, 450.0, 500.0];
        assert!(measure(&values, 1, -400.0, &[4, 5, 6]).is_none());
        assert!(measure(&values, 3, -400.0, &[4, 5, 6]).is_none());
    }

    #[test]
    fn recovery_near_series_end_keeps_short_window() {
        let values = [800.0, 400.0, 900.0, 900.0];
        let regrowth = measure(&values, 1, -400.0, &[4, 5, 6]).expect("series recovers");
        assert_eq!(regrowth.next_values().len(), 2);
        assert!(regrowth.index_regrowth().is_nan());
        assert_eq!(regrowth.years_to_full_regrowth(), Ok(1));
    }

    #[test]
    fn non_disturbance_vertices_are_skipped() {
        let values = [400.0, 800.0, 900.0];
        assert!(measure(&values, 1, 400.0, &[1]).is_none());
        assert!(measure(&values, 1, 0.0, &[1]).is_none());
        assert!(measure(&values, 1, f64::NAN, &[1]).is_none());
    }

    #[test]
    fn locate_vertices_scans_forward() {
        let dates = [2000.0, 2001.0, 2002.0, 2003.0, 2004.0];
        let changes = [
            change(2000.0, 1.0, f64::NAN),
            change(2002.0, 1.0, 0.0),
            change(2004.0, 1.0, 0.0),
        ];
        assert_eq!(locate_vertices(&dates, &changes), Ok(vec![0, 2, 4]));
    }

    #[test]
    fn locate_vertices_flags_missing_or_unordered_dates() {
        let dates = [2000.0, 2001.0, 2002.0];
        let missing = [change(2000.0, 1.0, f64::NAN), change(2001.5, 1.0, 0.0)];
        let err = locate_vertices(&dates, &missing).expect_err("unknown date should fail");
        assert!(matches!(err, C2cError::InternalInvariant(_)), "{err}");

        let unordered = [change(2002.0, 1.0, f64::NAN), change(2000.0, 1.0, 0.0)];
        assert!(locate_vertices(&dates, &unordered).is_err());
    }

    #[test]
    fn extend_with_regrowth_updates_only_disturbances() {
        let dates: Vec<f64> = (0..6).map(|i| 2000.0 + i as f64).collect();
        let values = [800.0, 400.0, 600.0, 800.0, 800.0, 800.0];
        let mut changes = vec![
            change(2000.0, 800.0, f64::NAN),
            change(2001.0, 400.0, -400.0),
            change(2005.0, 800.0, 400.0),
        ];
        let measured =
            extend_with_regrowth(&dates, &values, &mut changes, &[1, 2]).expect("dates match");
        assert_eq!(measured, 1);
        assert!(changes[0].regrowth.is_none());
        assert!(changes[2].regrowth.is_none());
        let regrowth = changes[1].regrowth.as_ref().expect("disturbance has regrowth");
        assert_eq!(regrowth.next_values(), &[600.0, 800.0]);
    }
}
