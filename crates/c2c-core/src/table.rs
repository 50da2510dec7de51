// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::MetricsLayout;
use crate::{C2cError, TimeSeries};

/// Key columns prepended to every change row.
pub const KEY_COLUMNS: [&str; 2] = ["id", "index"];

/// A collection of series sharing one date axis.
///
/// Each row is `[id, v1, ..., vn]` where `n == dates.len()`.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesTable {
    dates: Vec<f64>,
    rows: Vec<Vec<f64>>,
}

impl SeriesTable {
    pub fn new(dates: Vec<f64>, rows: Vec<Vec<f64>>) -> Result<Self, C2cError> {
        let placeholder = vec![1.0; dates.len()];
        TimeSeries::validate(&dates, &placeholder)
            .map_err(|err| err.with_context("series table header"))?;

        let expected = dates.len() + 1;
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
        {
            return Err(C2cError::invalid_input(format!(
                "series table row {idx} has {} cells but expected {expected} (id + {} dates)",
                row.len(),
                dates.len()
            )));
        }

        Ok(Self { dates, rows })
    }

    pub fn dates(&self) -> &[f64] {
        &self.dates
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Splits row `idx` into its identifier and its values.
    pub fn row(&self, idx: usize) -> Option<(f64, &[f64])> {
        let row = self.rows.get(idx)?;
        let (id, values) = row.split_first()?;
        Some((*id, values))
    }
}

/// Output table: one numeric row per emitted vertex.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeTable {
    headers: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ChangeTable {
    pub fn empty(headers: Vec<String>) -> Result<Self, C2cError> {
        if headers.is_empty() {
            return Err(C2cError::invalid_input("change table headers cannot be empty"));
        }
        Ok(Self {
            headers,
            rows: vec![],
        })
    }

    /// Empty table with `id, index` followed by the layout's columns.
    pub fn for_layout(layout: MetricsLayout) -> Self {
        let headers = KEY_COLUMNS
            .iter()
            .chain(layout.columns().iter())
            .map(|name| (*name).to_string())
            .collect();
        Self {
            headers,
            rows: vec![],
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), C2cError> {
        if row.len() != self.headers.len() {
            return Err(C2cError::invalid_input(format!(
                "change row has {} cells but table has {} columns",
                row.len(),
                self.headers.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Consecutive runs of rows sharing the same leading (`id`) cell.
    pub fn groups(&self) -> Vec<&[Vec<f64>]> {
        let mut out = vec![];
        let mut start = 0usize;
        for idx in 1..=self.rows.len() {
            let boundary = idx == self.rows.len()
                || self.rows[idx][0].to_bits() != self.rows[start][0].to_bits();
            if boundary {
                out.push(&self.rows[start..idx]);
                start = idx;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeTable, SeriesTable};
    use crate::config::MetricsLayout;

    #[test]
    fn series_table_splits_identifier() {
        let table = SeriesTable::new(
            vec![2000.0, 2001.0, 2002.0],
            vec![vec![11.0, 1.0, 2.0, 3.0], vec![12.0, 0.0, 0.0, 5.0]],
        )
        .expect("table should be valid");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(1), Some((12.0, &[0.0, 0.0, 5.0][..])));
        assert_eq!(table.row(2), None);
    }

    #[test]
    fn series_table_rejects_ragged_rows_and_bad_header() {
        let ragged = SeriesTable::new(vec![2000.0, 2001.0], vec![vec![1.0, 2.0]]);
        assert!(ragged.is_err());

        let unordered = SeriesTable::new(vec![2001.0, 2000.0], vec![]);
        let err = unordered.expect_err("unordered header should fail");
        assert!(err.to_string().contains("series table header"));
    }

    #[test]
    fn change_table_headers_follow_layout() {
        let table = ChangeTable::for_layout(MetricsLayout {
            post: true,
            regrowth: false,
        });
        assert_eq!(
            table.headers(),
            &[
                "id",
                "index",
                "year",
                "index",
                "magnitude",
                "duration",
                "rate",
                "postMagnitude",
                "postDuration",
                "postRate"
            ]
        );
    }

    #[test]
    fn change_table_groups_consecutive_ids() {
        let mut table = ChangeTable::empty(vec!["id".to_string(), "v".to_string()])
            .expect("headers are non-empty");
        for row in [[1.0, 0.0], [1.0, 1.0], [4.0, 2.0], [5.0, 3.0], [5.0, 4.0]] {
            table.push_row(row.to_vec()).expect("row width matches");
        }
        let groups = table.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[2][1], vec![5.0, 4.0]);
        assert_eq!(table.rows()[3], vec![5.0, 3.0]);
        assert!(table.push_row(vec![1.0]).is_err());
    }

    #[test]
    fn empty_change_table_has_no_groups() {
        let table = ChangeTable::for_layout(MetricsLayout::default());
        assert!(table.groups().is_empty());
        assert!(ChangeTable::empty(vec![]).is_err());
    }
}
