// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::bottomup::VertexSpan;
use crate::regrowth;
use c2c_core::{C2cError, Change, MetricsLayout, PostMetrics};

/// Turns vertex spans into change records for the given layout.
///
/// Post metrics are attached only when the layout asks for them; regrowth is
/// measured only for disturbance vertices and only when the layout has the
/// regrowth columns.
pub fn derive_changes(
    dates: &[f64],
    values: &[f64],
    spans: &[VertexSpan],
    layout: MetricsLayout,
    offsets: &[usize],
) -> Result<Vec<Change>, C2cError> {
    if dates.len() != values.len() {
        return Err(C2cError::invalid_input(format!(
            "dates and values length mismatch: dates={}, values={}",
            dates.len(),
            values.len()
        )));
    }

    let sample = |idx: usize| -> Result<(f64, f64), C2cError> {
        match (dates.get(idx), values.get(idx)) {
            (Some(&date), Some(&value)) => Ok((date, value)),
            _ => Err(C2cError::internal_invariant(format!(
                "vertex index {idx} is outside a series of length {}",
                values.len()
            ))),
        }
    };

    let mut changes = Vec::with_capacity(spans.len());
    for span in spans {
        let (date, value) = sample(span.curr)?;

        let (magnitude, duration) = match span.pre {
            Some(pre) => {
                let (pre_date, pre_value) = sample(pre)?;
                (value - pre_value, date - pre_date)
            }
            None => (f64::NAN, f64::NAN),
        };

        let post = if layout.post {
            Some(match span.post {
                Some(post) => {
                    let (post_date, post_value) = sample(post)?;
                    PostMetrics {
                        post_magnitude: post_value - value,
                        post_duration: post_date - date,
                    }
                }
                None => PostMetrics::MISSING,
            })
        } else {
            None
        };

        let regrowth = if layout.regrowth {
            regrowth::measure(values, span.curr, magnitude, offsets)
        } else {
            None
        };

        changes.push(Change {
            date,
            value,
            magnitude,
            duration,
            post,
            regrowth,
        });
    }
    Ok(changes)
}
