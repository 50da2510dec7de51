// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use c2c_core::{C2cError, ChangeTable, ExecutionContext, SeriesTable, SolverConfig};
use c2c_solver::{BatchOutcome, Solver};
use std::fmt::Write as _;

/// Runs every row of `table` with `config`.
pub fn run_table(table: &SeriesTable, config: SolverConfig) -> Result<BatchOutcome, C2cError> {
    let solver = Solver::new(config)?;
    solver.solve_table(table, &ExecutionContext::new())
}

/// Parses a JSON solver config; missing fields take their defaults.
pub fn parse_config_json(raw: &str) -> Result<SolverConfig, C2cError> {
    let config: SolverConfig = serde_json::from_str(raw)
        .map_err(|err| C2cError::invalid_input(format!("invalid config JSON: {err}")))?;
    config.validate()?;
    Ok(config)
}

/// Parses `label,<date>,<date>,...` followed by `id,<value>,<value>,...` rows.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn parse_series_table(raw: &str) -> Result<SeriesTable, C2cError> {
    let mut lines = raw
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let Some((header_line, header)) = lines.next() else {
        return Err(C2cError::invalid_input("CSV input is empty"));
    };
    let header_cells = split_cells(header);
    if header_cells.len() < 2 {
        return Err(C2cError::invalid_input(format!(
            "CSV header on line {header_line} needs an id column and at least one date"
        )));
    }
    let dates = header_cells[1..]
        .iter()
        .enumerate()
        .map(|(col, cell)| parse_cell(cell, header_line, col + 2))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = vec![];
    for (line_no, line) in lines {
        let cells = split_cells(line);
        if cells.len() != header_cells.len() {
            return Err(C2cError::invalid_input(format!(
                "CSV line {line_no} has {} columns but the header has {}",
                cells.len(),
                header_cells.len()
            )));
        }
        let row = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| parse_cell(cell, line_no, col + 1))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    SeriesTable::new(dates, rows)
}

fn split_cells(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn parse_cell(cell: &str, line: usize, col: usize) -> Result<f64, C2cError> {
    if cell.is_empty() {
        return Err(C2cError::invalid_input(format!(
            "CSV line {line} column {col} is empty"
        )));
    }
    cell.parse::<f64>().map_err(|_| {
        C2cError::invalid_input(format!(
            "CSV line {line} column {col} is not a valid float: '{cell}'"
        ))
    })
}

/// Renders the table as CSV with a trailing newline.
///
/// Integral values print without a fractional part, NaN as `NaN` and
/// infinities as `inf`/`-inf`.
pub fn format_change_table(table: &ChangeTable) -> String {
    let mut out = table.headers().join(",");
    out.push('\n');
    for row in table.rows() {
        for (idx, value) in row.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            let _ = write!(out, "{value}");
        }
        out.push('\n');
    }
    out
}

/// CLI namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = (c2c_core::crate_name(), c2c_solver::crate_name());
    "c2c-cli"
}
