// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use c2c_core::{C2cError, SolverConfig, arrays};

/// Spikes smaller than this (in index units) are never replaced.
pub const MIN_SPIKE_VALUE: f64 = 100.0;

/// Fewest valid (non-zero) observations the gap filler can work with.
pub const MIN_VALID_OBSERVATIONS: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct PreprocessConfig {
    pub revert: bool,
    pub infill: bool,
    /// Despike sensitivity in `[0, 1]`; `1.0` disables despiking.
    pub spikes_tolerance: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self::from(&SolverConfig::default())
    }
}

impl From<&SolverConfig> for PreprocessConfig {
    fn from(cfg: &SolverConfig) -> Self {
        Self {
            revert: cfg.revert_band,
            infill: cfg.infill,
            spikes_tolerance: cfg.spikes_tolerance,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    /// Samples rewritten by the step.
    pub changed: usize,
    pub notes: Vec<String>,
}

/// Ordered revert → infill → despike stages over a caller-owned buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct PreprocessPipeline {
    config: PreprocessConfig,
}

impl PreprocessPipeline {
    pub fn new(config: PreprocessConfig) -> Result<Self, C2cError> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    /// Mutates `values` in place and reports what each enabled stage did.
    pub fn apply(&self, values: &mut [f64]) -> Result<Vec<StepReport>, C2cError> {
        let mut reports = vec![];

        if self.config.revert {
            revert(values);
            reports.push(StepReport {
                step: "revert".to_string(),
                changed: values.len(),
                notes: vec![format!("negated {} values", values.len())],
            });
        }

        if self.config.infill {
            let filled = fill_values(values)?;
            reports.push(StepReport {
                step: "infill".to_string(),
                changed: filled,
                notes: vec![format!("filled={filled}")],
            });
        }

        if self.config.spikes_tolerance < 1.0 {
            let replaced = despike(values, self.config.spikes_tolerance);
            reports.push(StepReport {
                step: "despike".to_string(),
                changed: replaced,
                notes: vec![format!(
                    "tolerance={}, replaced={replaced}",
                    self.config.spikes_tolerance
                )],
            });
        }

        Ok(reports)
    }
}

fn validate_config(config: &PreprocessConfig) -> Result<(), C2cError> {
    if !config.spikes_tolerance.is_finite() || !(0.0..=1.0).contains(&config.spikes_tolerance) {
        return Err(C2cError::invalid_input(format!(
            "spikes_tolerance must be in [0.0, 1.0]; got {}",
            config.spikes_tolerance
        )));
    }
    Ok(())
}

/// Negates every value so that gains are treated as losses.
pub fn revert(values: &mut [f64]) {
    for value in values.iter_mut() {
        *value = -*value;
    }
}

/// Replaces each `0` with a neighbouring valid value and damps the trailing
/// edge. Returns the number of filled samples.
///
/// Filled values count as valid for the samples that follow them. Requires at
/// least [`MIN_VALID_OBSERVATIONS`] non-zero values.
pub fn fill_values(values: &mut [f64]) -> Result<usize, C2cError> {
    let valid = arrays::count_valid(values);
    if valid < MIN_VALID_OBSERVATIONS {
        return Err(C2cError::invalid_input(format!(
            "infill requires at least {MIN_VALID_OBSERVATIONS} non-zero observations; got {valid}"
        )));
    }

    let mut filled = 0usize;
    for i in 0..values.len() {
        if values[i] != 0.0 {
            continue;
        }

        let left1 = find_valid(values, Some(i), Direction::Left);
        let left2 = find_valid(values, left1, Direction::Left);
        let right1 = find_valid(values, Some(i), Direction::Right);
        let right2 = find_valid(values, right1, Direction::Right);

        let source = match (left1, left2, right1, right2) {
            (_, None, right1, _) => right1,
            (left1, Some(_), right1, None) => right1.or(left1),
            (Some(l1), Some(l2), Some(r1), Some(r2)) => {
                let left_dif = (values[l1] - values[l2]).abs();
                let right_dif = (values[r1] - values[r2]).abs();
                if left_dif < right_dif { Some(l1) } else { Some(r1) }
            }
            (None, Some(_), _, _) | (_, _, None, Some(_)) => None,
        };

        let source = source.ok_or_else(|| {
            C2cError::internal_invariant(format!(
                "no valid neighbour to fill index {i} despite {valid} valid observations"
            ))
        })?;
        values[i] = values[source];
        filled += 1;
    }

    damp_trailing_edge(values);
    Ok(filled)
}

/// Overwrites the last value with the previous one when the final jump is at
/// least as large as the one before it.
fn damp_trailing_edge(values: &mut [f64]) {
    let size = values.len();
    if size < 3 {
        return;
    }
    let last = values[size - 1];
    let last_l = values[size - 2];
    let last_ll = values[size - 3];
    if (last - last_l).abs() >= (last_l - last_ll).abs() {
        values[size - 1] = last_l;
    }
}

#[derive(Clone, Copy, Debug)]
enum Direction {
    Left,
    Right,
}

/// Nearest non-zero index strictly beyond `start` in `direction`.
fn find_valid(values: &[f64], start: Option<usize>, direction: Direction) -> Option<usize> {
    let start = start?;
    match direction {
        Direction::Left => (0..start).rev().find(|&idx| values[idx] != 0.0),
        Direction::Right => (start + 1..values.len()).find(|&idx| values[idx] != 0.0),
    }
}

/// Replaces single-sample spikes with the mean of their neighbours.
///
/// A sample is a spike when it departs from the neighbour mean by more than
/// [`MIN_SPIKE_VALUE`] and the neighbours differ by less than
/// `1 - tolerance` of that departure. Returns the number of replaced samples.
pub fn despike(values: &mut [f64], tolerance: f64) -> usize {
    let mut replaced = 0usize;
    for i in 1..values.len().saturating_sub(1) {
        let left = values[i - 1];
        let center = values[i];
        let right = values[i + 1];
        let fitted = (left + right) / 2.0;
        let delta = (left - right).abs();
        let spike = (fitted - center).abs();
        let proportion = delta / spike;
        if spike > MIN_SPIKE_VALUE && proportion < 1.0 - tolerance {
            values[i] = fitted;
            replaced += 1;
        }
    }
    replaced
}

/// Preprocess namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = c2c_core::crate_name();
    "c2c-preprocess"
}
