// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use c2c_core::{
    C2cError, Change, ChangeTable, Diagnostics, ExecutionContext, MetricsLayout, SeriesTable,
    SolverConfig, TimeSeries, arrays, checked_counter_increment,
};
use c2c_preprocess::{MIN_VALID_OBSERVATIONS, PreprocessConfig, PreprocessPipeline};
use c2c_segment::{BottomUp, BottomUpConfig, derive_changes, extend_with_regrowth};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::borrow::Cow;
use std::time::Instant;

/// Changes found in one series.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesResult {
    pub changes: Vec<Change>,
    pub diagnostics: Diagnostics,
}

/// Result of running every row of a [`SeriesTable`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome {
    pub table: ChangeTable,
    /// Rows that produced changes (possibly none after filtering).
    pub processed: usize,
    /// Rows with too few valid observations.
    pub skipped: usize,
    pub diagnostics: Diagnostics,
}

/// Preprocess, segment and measure annual series.
#[derive(Clone, Debug)]
pub struct Solver {
    config: SolverConfig,
    preprocess: PreprocessPipeline,
    segmentator: BottomUp,
}

struct RowOutcome {
    rows: Vec<Vec<f64>>,
    diagnostics: Option<Diagnostics>,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Result<Self, C2cError> {
        config.validate()?;
        let preprocess = PreprocessPipeline::new(PreprocessConfig::from(&config))?;
        let segmentator = BottomUp::new(BottomUpConfig::from(&config))?;
        Ok(Self {
            config,
            preprocess,
            segmentator,
        })
    }

    pub fn layout(&self) -> MetricsLayout {
        self.config.metrics_layout()
    }

    /// Runs the full pipeline on one series, rewriting `values` in place.
    ///
    /// Returns `Ok(None)` when fewer than three observations are non-zero.
    pub fn solve_series(
        &self,
        dates: &[f64],
        values: &mut [f64],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Option<SeriesResult>, C2cError> {
        TimeSeries::validate(dates, values)?;
        let valid = arrays::count_valid(values);
        if valid < MIN_VALID_OBSERVATIONS {
            return Ok(None);
        }

        let started_at = Instant::now();
        let mut diagnostics = Diagnostics {
            n: values.len(),
            algorithm: Cow::Borrowed("c2c"),
            ..Diagnostics::default()
        };

        for report in self.preprocess.apply(values)? {
            match report.step.as_str() {
                "infill" => diagnostics.filled_values = Some(report.changed),
                "despike" => diagnostics.despiked_values = Some(report.changed),
                _ => {}
            }
            for note in report.notes {
                diagnostics.notes.push(format!("{}: {note}", report.step));
            }
        }

        let offsets = self.config.regrowth_offsets.as_slice();
        let layout = self.layout();
        let mut changes = if self.config.interpolate {
            let simple = self.config.without_regrowth().metrics_layout();
            let segmentation = self.segmentator.segment(dates, values, ctx)?;
            let mut changes =
                derive_changes(dates, values, &segmentation.vertices, simple, offsets)?;
            diagnostics.absorb(segmentation.diagnostics);

            let rewritten = interpolate(dates, values, &changes);
            diagnostics
                .notes
                .push(format!("interpolate: rewritten={rewritten}"));

            if layout.regrowth {
                let measured = extend_with_regrowth(dates, values, &mut changes, offsets)?;
                diagnostics
                    .notes
                    .push(format!("regrowth: recomputed={measured}"));
            }
            changes
        } else {
            let segmentation = self.segmentator.segment(dates, values, ctx)?;
            let changes = derive_changes(dates, values, &segmentation.vertices, layout, offsets)?;
            diagnostics.absorb(segmentation.diagnostics);
            changes
        };

        if self.config.negative_magnitude_only {
            let removed = filter_negative(&mut changes);
            diagnostics
                .notes
                .push(format!("filter: negative_magnitude_only removed={removed}"));
        }

        diagnostics.runtime_ms =
            Some(u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX));
        Ok(Some(SeriesResult {
            changes,
            diagnostics,
        }))
    }

    /// Runs every row of `table`; output rows keep input row order.
    ///
    /// A failing row aborts the batch with the row index in the error.
    pub fn solve_table(
        &self,
        table: &SeriesTable,
        ctx: &ExecutionContext<'_>,
    ) -> Result<BatchOutcome, C2cError> {
        let started_at = Instant::now();
        let layout = self.layout();
        let total = table.row_count();

        let solve_row = |row_index: usize| -> Result<RowOutcome, C2cError> {
            self.solve_row(table, row_index, layout, ctx)
                .map_err(|err| err.with_context(format!("row {row_index}")))
        };

        #[cfg(feature = "rayon")]
        let (outcomes, thread_count) = if can_use_parallel(ctx) {
            let outcomes = (0..total)
                .into_par_iter()
                .map(solve_row)
                .collect::<Result<Vec<_>, C2cError>>()?;
            (outcomes, Some(rayon::current_num_threads()))
        } else {
            (solve_rows_serial(total, solve_row, ctx)?, None)
        };

        #[cfg(not(feature = "rayon"))]
        let (outcomes, thread_count) = (solve_rows_serial(total, solve_row, ctx)?, None);

        let mut out = ChangeTable::for_layout(layout);
        let mut diagnostics = Diagnostics {
            n: total,
            algorithm: Cow::Borrowed("c2c"),
            thread_count,
            ..Diagnostics::default()
        };
        let mut processed = 0usize;
        let mut skipped = 0usize;
        for (row_index, outcome) in outcomes.into_iter().enumerate() {
            let Some(row_diagnostics) = outcome.diagnostics else {
                checked_counter_increment(&mut skipped, "skipped")?;
                diagnostics
                    .notes
                    .push(format!("row {row_index}: skipped, insufficient valid observations"));
                continue;
            };
            checked_counter_increment(&mut processed, "processed")?;
            diagnostics.absorb(prefixed(row_diagnostics, row_index));
            for row in outcome.rows {
                out.push_row(row)?;
            }
        }

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        ctx.record_scalar("solver.table.rows", total as f64);
        ctx.record_scalar("solver.table.skipped", skipped as f64);
        ctx.record_scalar("solver.table.runtime_ms", runtime_ms as f64);
        diagnostics.notes.push(format!(
            "rows={total}, processed={processed}, skipped={skipped}, changes={}",
            out.len()
        ));
        diagnostics.runtime_ms = Some(runtime_ms);

        Ok(BatchOutcome {
            table: out,
            processed,
            skipped,
            diagnostics,
        })
    }

    fn solve_row(
        &self,
        table: &SeriesTable,
        row_index: usize,
        layout: MetricsLayout,
        ctx: &ExecutionContext<'_>,
    ) -> Result<RowOutcome, C2cError> {
        let (id, values) = table
            .row(row_index)
            .ok_or_else(|| C2cError::internal_invariant("row index out of range"))?;
        let mut buffer = values.to_vec();

        let Some(result) = self.solve_series(table.dates(), &mut buffer, ctx)? else {
            return Ok(RowOutcome {
                rows: vec![],
                diagnostics: None,
            });
        };

        let prefix = [id, row_index as f64];
        let rows = result
            .changes
            .iter()
            .map(|change| change.to_row(layout, &prefix))
            .collect::<Result<Vec<_>, C2cError>>()?;
        Ok(RowOutcome {
            rows,
            diagnostics: Some(result.diagnostics),
        })
    }
}

fn solve_rows_serial<F>(
    total: usize,
    solve_row: F,
    ctx: &ExecutionContext<'_>,
) -> Result<Vec<RowOutcome>, C2cError>
where
    F: Fn(usize) -> Result<RowOutcome, C2cError>,
{
    let mut outcomes = Vec::with_capacity(total);
    for row_index in 0..total {
        outcomes.push(solve_row(row_index)?);
        ctx.report_progress((row_index + 1) as f32 / total as f32);
    }
    Ok(outcomes)
}

#[cfg(feature = "rayon")]
fn can_use_parallel(ctx: &ExecutionContext<'_>) -> bool {
    ctx.progress.is_none()
}

fn prefixed(mut diagnostics: Diagnostics, row_index: usize) -> Diagnostics {
    for note in diagnostics.notes.iter_mut() {
        *note = format!("row {row_index}: {note}");
    }
    for warning in diagnostics.warnings.iter_mut() {
        *warning = format!("row {row_index}: {warning}");
    }
    diagnostics
}

/// Replaces every sample strictly between two consecutive vertex dates with
/// the line through those vertices. Returns the number of rewritten samples.
pub fn interpolate(dates: &[f64], values: &mut [f64], changes: &[Change]) -> usize {
    let mut rewritten = 0usize;
    for pair in changes.windows(2) {
        let (x1, y1) = (pair[0].date, pair[0].value);
        let (x2, y2) = (pair[1].date, pair[1].value);
        for (&x, value) in dates.iter().zip(values.iter_mut()) {
            if x <= x1 {
                continue;
            }
            if x >= x2 {
                break;
            }
            *value = y1 + (y2 - y1) * (x - x1) / (x2 - x1);
            rewritten += 1;
        }
    }
    rewritten
}

/// Keeps only changes with a strictly negative magnitude. Returns how many
/// were dropped.
pub fn filter_negative(changes: &mut Vec<Change>) -> usize {
    let before = changes.len();
    changes.retain(Change::has_negative_magnitude);
    before - changes.len()
}

/// Solver namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = (
        c2c_core::crate_name(),
        c2c_preprocess::crate_name(),
        c2c_segment::crate_name(),
    );
    "c2c-solver"
}
