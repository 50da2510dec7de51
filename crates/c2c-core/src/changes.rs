// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::MetricsLayout;
use crate::{C2cError, arrays};

/// Percent thresholds reported as `y2r60`, `y2r80`, `y2r100`.
pub const REGROWTH_REPORT_PERCENTS: [f64; 3] = [60.0, 80.0, 100.0];

/// Deltas from a vertex to the next vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostMetrics {
    pub post_magnitude: f64,
    pub post_duration: f64,
}

impl PostMetrics {
    /// NaN when there is no next vertex.
    pub const MISSING: Self = Self {
        post_magnitude: f64::NAN,
        post_duration: f64::NAN,
    };

    pub fn post_rate(&self) -> f64 {
        self.post_magnitude / self.post_duration
    }
}

/// Recovery trajectory after a disturbance (negative-magnitude) vertex.
///
/// `next_values[k]` is the observation `k + 1` samples after the vertex; the
/// window ends at the first sample where the loss is fully recovered and the
/// widest sampling offset is covered.
#[derive(Clone, Debug, PartialEq)]
pub struct Regrowth {
    vertex_value: f64,
    magnitude: f64,
    next_values: Vec<f64>,
    index_regrowth: f64,
}

impl Regrowth {
    pub fn new(vertex_value: f64, magnitude: f64, next_values: Vec<f64>, offsets: &[usize]) -> Self {
        let index_regrowth = sampled_regrowth(vertex_value, &next_values, offsets);
        Self {
            vertex_value,
            magnitude,
            next_values,
            index_regrowth,
        }
    }

    pub fn next_values(&self) -> &[f64] {
        &self.next_values
    }

    /// Value just before the disturbance.
    pub fn previous_value(&self) -> f64 {
        self.vertex_value - self.magnitude
    }

    /// Mean of the values at the sampling offsets minus the vertex value.
    pub fn index_regrowth(&self) -> f64 {
        self.index_regrowth
    }

    pub fn recovery_indicator(&self) -> f64 {
        self.index_regrowth / self.magnitude
    }

    /// Samples after the vertex until the value first reaches `percent`% of
    /// the pre-disturbance value. Year 0 is the vertex itself.
    pub fn years_to_regrowth(&self, percent: f64) -> Result<usize, C2cError> {
        if !percent.is_finite() || percent <= 0.0 || percent > 100.0 {
            return Err(C2cError::invalid_parameter(format!(
                "regrowth percent must be in (0, 100]; got {percent}"
            )));
        }

        let threshold = self.previous_value() * (percent / 100.0);
        std::iter::once(self.vertex_value)
            .chain(self.next_values.iter().copied())
            .position(|value| value >= threshold)
            .ok_or_else(|| {
                C2cError::internal_invariant(format!(
                    "no {percent}% regrowth crossing within a window of {} samples; threshold={threshold}, previous_value={}",
                    self.next_values.len(),
                    self.previous_value()
                ))
            })
    }

    pub fn years_to_full_regrowth(&self) -> Result<usize, C2cError> {
        self.years_to_regrowth(100.0)
    }
}

fn sampled_regrowth(vertex_value: f64, next_values: &[f64], offsets: &[usize]) -> f64 {
    let mut sampled = Vec::with_capacity(offsets.len());
    for &offset in offsets {
        let Some(value) = offset.checked_sub(1).and_then(|idx| next_values.get(idx)) else {
            return f64::NAN;
        };
        sampled.push(*value);
    }
    arrays::mean(&sampled) - vertex_value
}

/// One vertex of the fitted piecewise-linear model.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub date: f64,
    pub value: f64,
    /// Value delta from the previous vertex; NaN on the first vertex.
    pub magnitude: f64,
    /// Date delta from the previous vertex; NaN on the first vertex.
    pub duration: f64,
    pub post: Option<PostMetrics>,
    pub regrowth: Option<Regrowth>,
}

impl Change {
    pub fn rate(&self) -> f64 {
        self.magnitude / self.duration
    }

    pub fn post_magnitude(&self) -> f64 {
        self.post.map_or(f64::NAN, |post| post.post_magnitude)
    }

    pub fn post_duration(&self) -> f64 {
        self.post.map_or(f64::NAN, |post| post.post_duration)
    }

    pub fn post_rate(&self) -> f64 {
        self.post.map_or(f64::NAN, |post| post.post_rate())
    }

    /// True only for strictly negative magnitudes; NaN is not negative.
    pub fn has_negative_magnitude(&self) -> bool {
        self.magnitude < 0.0
    }

    /// Flattens the change into a numeric row laid out as `layout.columns()`,
    /// after the given `prefix` cells.
    pub fn to_row(&self, layout: MetricsLayout, prefix: &[f64]) -> Result<Vec<f64>, C2cError> {
        let mut row = Vec::with_capacity(prefix.len() + layout.width());
        row.extend_from_slice(prefix);
        row.extend([
            self.date,
            self.value,
            self.magnitude,
            self.duration,
            self.rate(),
        ]);

        if layout.post {
            row.extend([self.post_magnitude(), self.post_duration(), self.post_rate()]);
        }

        if layout.regrowth {
            match &self.regrowth {
                Some(regrowth) => {
                    row.push(regrowth.index_regrowth());
                    row.push(regrowth.recovery_indicator());
                    for percent in REGROWTH_REPORT_PERCENTS {
                        row.push(regrowth.years_to_regrowth(percent)? as f64);
                    }
                }
                None => row.extend([f64::NAN; MetricsLayout::REGROWTH_COLUMNS.len()]),
            }
        }

        Ok(row)
    }
}
