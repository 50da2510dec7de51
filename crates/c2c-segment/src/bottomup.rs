// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use c2c_core::config::{DEFAULT_MAX_ERROR, DEFAULT_MAX_SEGMENTS};
use c2c_core::{
    C2cError, Diagnostics, ExecutionContext, MergeStats, SolverConfig, TimeSeries, arrays,
    checked_counter_increment,
};
use std::borrow::Cow;
use std::time::Instant;

/// Fewest samples the merge loop accepts (two initial segments, one cost).
pub const MIN_SAMPLES: usize = 3;

/// Configuration for [`BottomUp`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BottomUpConfig {
    /// Merges continue while the cheapest merge costs less than this RMSE.
    pub max_error: f64,
    /// Merges are forced while more segments than this remain.
    pub max_segments: usize,
}

impl Default for BottomUpConfig {
    fn default() -> Self {
        Self {
            max_error: DEFAULT_MAX_ERROR,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}

impl From<&SolverConfig> for BottomUpConfig {
    fn from(cfg: &SolverConfig) -> Self {
        Self {
            max_error: cfg.max_error,
            max_segments: cfg.max_segments,
        }
    }
}

impl BottomUpConfig {
    fn validate(&self) -> Result<(), C2cError> {
        if !self.max_error.is_finite() || self.max_error < 0.0 {
            return Err(C2cError::invalid_input(format!(
                "BottomUp max_error must be finite and >= 0.0; got {}",
                self.max_error
            )));
        }
        if self.max_segments == 0 {
            return Err(C2cError::invalid_input(
                "BottomUp max_segments must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Sample indices around one emitted vertex.
///
/// `pre` is the previous vertex and `post` the next one; the first vertex has
/// no `pre` and the last has no `post`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexSpan {
    pub pre: Option<usize>,
    pub curr: usize,
    pub post: Option<usize>,
}

/// Vertices of one segmentation plus the run diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct Segmentation {
    pub vertices: Vec<VertexSpan>,
    pub diagnostics: Diagnostics,
}

impl Segmentation {
    /// Sample indices of the vertices, in order.
    pub fn vertex_indices(&self) -> Vec<usize> {
        self.vertices.iter().map(|span| span.curr).collect()
    }
}

/// Greedy bottom-up merge of linear segments.
#[derive(Clone, Debug)]
pub struct BottomUp {
    config: BottomUpConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    start: usize,
    finish: usize,
}

impl BottomUp {
    pub fn new(config: BottomUpConfig) -> Result<Self, C2cError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Fits the series and returns the surviving vertices.
    ///
    /// Merging stops once the cheapest merge reaches `max_error` and no more
    /// than `max_segments` segments remain.
    pub fn segment(
        &self,
        dates: &[f64],
        values: &[f64],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Segmentation, C2cError> {
        self.config.validate()?;
        let series = TimeSeries::new(dates, values)?;
        let n = series.len();
        if n < MIN_SAMPLES {
            return Err(C2cError::invalid_input(format!(
                "BottomUp requires n >= {MIN_SAMPLES}; got n={n}"
            )));
        }

        let started_at = Instant::now();
        let mut stats = MergeStats::default();

        let mut segments: Vec<Segment> = (0..n - 1)
            .map(|i| Segment {
                start: i,
                finish: i + 1,
            })
            .collect();
        stats.initial_segments = segments.len();

        let mut costs = Vec::with_capacity(segments.len() - 1);
        for pair in segments.windows(2) {
            costs.push(merge_cost(dates, values, pair[0].start, pair[1].finish));
            checked_counter_increment(&mut stats.cost_evals, "cost_evals")?;
        }

        let mut stop_cost = f64::NAN;
        while let Some(idx) = arrays::argmin(&costs) {
            let min = costs[idx];
            let within_error = min < self.config.max_error;
            let over_cap = segments.len() > self.config.max_segments;
            if !within_error && !over_cap {
                stop_cost = min;
                break;
            }

            segments[idx].finish = segments[idx + 1].finish;
            segments.remove(idx + 1);
            costs.remove(idx);
            checked_counter_increment(&mut stats.merges_applied, "merges_applied")?;
            if !within_error {
                checked_counter_increment(&mut stats.forced_merges, "forced_merges")?;
            }

            if idx + 1 < segments.len() {
                costs[idx] = merge_cost(dates, values, segments[idx].start, segments[idx + 1].finish);
                checked_counter_increment(&mut stats.cost_evals, "cost_evals")?;
            }
            if idx > 0 {
                costs[idx - 1] =
                    merge_cost(dates, values, segments[idx - 1].start, segments[idx].finish);
                checked_counter_increment(&mut stats.cost_evals, "cost_evals")?;
            }
        }
        stats.final_segments = segments.len();

        let vertices = emit_vertices(&segments)?;

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        ctx.record_scalar("segment.bottomup.cost_evals", stats.cost_evals as f64);
        ctx.record_scalar("segment.bottomup.merges_applied", stats.merges_applied as f64);
        ctx.record_scalar("segment.bottomup.forced_merges", stats.forced_merges as f64);
        ctx.record_scalar("segment.bottomup.runtime_ms", runtime_ms as f64);

        let mut notes = vec![format!(
            "bottomup: max_error={}, max_segments={}",
            self.config.max_error, self.config.max_segments
        )];
        if stop_cost.is_finite() {
            notes.push(format!("bottomup: stop_cost={stop_cost}"));
        }
        notes.push(format!(
            "bottomup: initial_segments={}, final_segments={}, merges_applied={}, forced_merges={}, cost_evals={}",
            stats.initial_segments,
            stats.final_segments,
            stats.merges_applied,
            stats.forced_merges,
            stats.cost_evals
        ));

        let mut warnings = vec![];
        if costs.iter().any(|cost| cost.is_nan()) {
            warnings.push("non-finite merge cost encountered; NaN costs never win a merge".to_string());
        }

        let diagnostics = Diagnostics {
            n,
            runtime_ms: Some(runtime_ms),
            notes,
            warnings,
            algorithm: Cow::Borrowed("bottomup"),
            merge_stats: Some(stats),
            ..Diagnostics::default()
        };

        Ok(Segmentation {
            vertices,
            diagnostics,
        })
    }
}

/// RMSE of the straight line from `start` to `finish` against the samples in
/// between, both ends included, normalised by the span length.
pub fn merge_cost(dates: &[f64], values: &[f64], start: usize, finish: usize) -> f64 {
    let (x1, x2) = (dates[start], dates[finish]);
    let (y1, y2) = (values[start], values[finish]);
    let window = x2 - x1;

    let mut error = 0.0;
    for i in start..=finish {
        let frac = (dates[i] - x1) / window;
        let diff = values[i] - arrays::lerp(y1, y2, frac);
        error += diff * diff;
    }
    (error / (finish - start) as f64).sqrt()
}

fn emit_vertices(segments: &[Segment]) -> Result<Vec<VertexSpan>, C2cError> {
    let Some(last) = segments.last() else {
        return Err(C2cError::internal_invariant(
            "BottomUp finished with no segments",
        ));
    };

    let mut vertices = Vec::with_capacity(segments.len() + 1);
    for (i, segment) in segments.iter().enumerate() {
        let pre = i.checked_sub(1).map(|prev| segments[prev].start);
        vertices.push(VertexSpan {
            pre,
            curr: segment.start,
            post: Some(segment.finish),
        });
    }
    vertices.push(VertexSpan {
        pre: Some(last.start),
        curr: last.finish,
        post: None,
    });
    Ok(vertices)
}

#[cfg(test)]
mod tests {
    use super::{BottomUp, BottomUpConfig, VertexSpan, merge_cost};
    use c2c_core::{C2cError, ExecutionContext, TelemetrySink};
    use std::sync::Mutex;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "actual={actual}, expected={expected}, tol={tol}"
        );
    }

    fn years(n: usize) -> Vec<f64> {
        (0..n).map(|i| 1984.0 + i as f64).collect()
    }

    fn detector(max_error: f64, max_segments: usize) -> BottomUp {
        BottomUp::new(BottomUpConfig {
            max_error,
            max_segments,
        })
        .expect("config should be valid")
    }

    #[derive(Default)]
    struct RecordingTelemetry {
        values: Mutex<Vec<(&'static str, f64)>>,
    }

    impl TelemetrySink for RecordingTelemetry {
        fn record_scalar(&self, key: &'static str, value: f64) {
            self.values
                .lock()
                .expect("telemetry mutex should lock")
                .push((key, value));
        }
    }

    #[test]
    fn config_defaults_and_validation() {
        let cfg = BottomUpConfig::default();
        assert_eq!(cfg.max_error, 75.0);
        assert_eq!(cfg.max_segments, 6);

        for bad in [
            BottomUpConfig {
                max_error: -1.0,
                max_segments: 6,
            },
            BottomUpConfig {
                max_error: f64::INFINITY,
                max_segments: 6,
            },
            BottomUpConfig {
                max_error: 75.0,
                max_segments: 0,
            },
        ] {
            let err = BottomUp::new(bad).expect_err("config should be rejected");
            assert!(matches!(err, C2cError::InvalidInput(_)), "{err}");
        }
    }

    #[test]
    fn merge_cost_is_zero_on_a_line_and_rmse_otherwise() {
        let dates = years(5);
        let line = vec![100.0, 110.0, 120.0, 130.0, 140.0];
        assert_close(merge_cost(&dates, &line, 0, 4), 0.0, 1e-12);

        // Middle sample 30 above the chord: sqrt(30^2 / 2).
        let bump = vec![0.0, 30.0, 0.0];
        assert_close(merge_cost(&dates, &bump, 0, 2), (900.0f64 / 2.0).sqrt(), 1e-12);
    }

    #[test]
    fn straight_line_collapses_to_endpoints() {
        let dates = years(10);
        let values: Vec<f64> = (0..10).map(|i| 500.0 - 12.5 * i as f64).collect();
        let seg = detector(75.0, 6)
            .segment(&dates, &values, &ExecutionContext::new())
            .expect("segment should succeed");

        assert_eq!(seg.vertex_indices(), vec![0, 9]);
        assert_eq!(
            seg.vertices,
            vec![
                VertexSpan {
                    pre: None,
                    curr: 0,
                    post: Some(9)
                },
                VertexSpan {
                    pre: Some(0),
                    curr: 9,
                    post: None
                },
            ]
        );
        let stats = seg.diagnostics.merge_stats.expect("stats should be recorded");
        assert_eq!(stats.initial_segments, 9);
        assert_eq!(stats.final_segments, 1);
        assert_eq!(stats.merges_applied, 8);
        assert_eq!(stats.forced_merges, 0);
    }

    #[test]
    fn sharp_drop_survives_as_vertex() {
        let dates = years(12);
        let mut values = vec![800.0; 12];
        for v in values.iter_mut().skip(6) {
            *v = 200.0;
        }
        let seg = detector(75.0, 6)
            .segment(&dates, &values, &ExecutionContext::new())
            .expect("segment should succeed");

        let idx = seg.vertex_indices();
        assert_eq!(idx.first(), Some(&0));
        assert_eq!(idx.last(), Some(&11));
        assert!(idx.contains(&5) && idx.contains(&6), "vertices={idx:?}");
    }

    #[test]
    fn segment_cap_forces_merges_above_error_budget() {
        let dates = years(9);
        let values = vec![0.0, 900.0, 0.0, 900.0, 0.0, 900.0, 0.0, 900.0, 0.0];
        let seg = detector(0.0, 2)
            .segment(&dates, &values, &ExecutionContext::new())
            .expect("segment should succeed");

        assert_eq!(seg.vertices.len(), 3);
        let stats = seg.diagnostics.merge_stats.expect("stats should be recorded");
        assert_eq!(stats.final_segments, 2);
        assert_eq!(stats.merges_applied, 6);
        assert_eq!(stats.forced_merges, 6);
    }

    #[test]
    fn zero_error_budget_and_generous_cap_keeps_every_sample() {
        let dates = years(5);
        let values = vec![10.0, 500.0, 20.0, 700.0, 30.0];
        let seg = detector(0.0, 10)
            .segment(&dates, &values, &ExecutionContext::new())
            .expect("segment should succeed");
        assert_eq!(seg.vertex_indices(), vec![0, 1, 2, 3, 4]);
        assert_eq!(seg.vertices[2].pre, Some(1));
        assert_eq!(seg.vertices[2].post, Some(3));
    }

    #[test]
    fn three_samples_is_the_minimum() {
        let ctx = ExecutionContext::new();
        let seg = detector(75.0, 6)
            .segment(&years(3), &[1.0, 2.0, 3.0], &ctx)
            .expect("three samples should segment");
        assert_eq!(seg.vertex_indices(), vec![0, 2]);

        let err = detector(75.0, 6)
            .segment(&years(2), &[1.0, 2.0], &ctx)
            .expect_err("two samples should be rejected");
        assert!(err.to_string().contains("n >= 3"), "{err}");
    }

    #[test]
    fn rejects_invalid_series() {
        let ctx = ExecutionContext::new();
        let err = detector(75.0, 6)
            .segment(&[2000.0, 1999.0, 2001.0], &[1.0, 2.0, 3.0], &ctx)
            .expect_err("unordered dates should be rejected");
        assert!(matches!(err, C2cError::InvalidInput(_)));

        let err = detector(75.0, 6)
            .segment(&years(3), &[1.0, f64::NAN, 3.0], &ctx)
            .expect_err("NaN values should be rejected");
        assert!(matches!(err, C2cError::InvalidInput(_)));
    }

    #[test]
    fn reports_notes_and_telemetry() {
        let sink = RecordingTelemetry::default();
        let ctx = ExecutionContext::new().with_telemetry_sink(&sink);
        let dates = years(6);
        let values = vec![100.0, 100.0, 100.0, 400.0, 400.0, 400.0];
        let seg = detector(75.0, 6)
            .segment(&dates, &values, &ctx)
            .expect("segment should succeed");

        assert_eq!(seg.diagnostics.algorithm, "bottomup");
        assert_eq!(seg.diagnostics.n, 6);
        assert!(
            seg.diagnostics
                .notes
                .iter()
                .any(|note| note.contains("merges_applied="))
        );

        let recorded = sink.values.lock().expect("telemetry mutex should lock");
        let keys: Vec<&str> = recorded.iter().map(|(key, _)| *key).collect();
        assert!(keys.contains(&"segment.bottomup.merges_applied"));
        assert!(keys.contains(&"segment.bottomup.cost_evals"));
    }
}
