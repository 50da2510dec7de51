// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::C2cError;

/// Borrowed annual time series: strictly increasing dates and their values.
///
/// The solver mutates values in place, so callers usually validate with
/// [`TimeSeries::validate`] and then hand out `&mut [f64]` for the values.
#[derive(Clone, Copy, Debug)]
pub struct TimeSeries<'a> {
    pub dates: &'a [f64],
    pub values: &'a [f64],
}

impl<'a> TimeSeries<'a> {
    /// Constructs a validated `TimeSeries`.
    pub fn new(dates: &'a [f64], values: &'a [f64]) -> Result<Self, C2cError> {
        Self::validate(dates, values)?;
        Ok(Self { dates, values })
    }

    /// Checks the shape and ordering contract without borrowing the buffers.
    pub fn validate(dates: &[f64], values: &[f64]) -> Result<(), C2cError> {
        if dates.is_empty() {
            return Err(C2cError::invalid_input("series must contain at least one date"));
        }
        if dates.len() != values.len() {
            return Err(C2cError::invalid_input(format!(
                "dates/values length mismatch: dates={}, values={}",
                dates.len(),
                values.len()
            )));
        }
        if let Some((idx, date)) = dates.iter().copied().enumerate().find(|(_, d)| !d.is_finite())
        {
            return Err(C2cError::invalid_input(format!(
                "date at index {idx} is not finite: {date}"
            )));
        }
        if let Some(idx) = dates.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(C2cError::invalid_input(format!(
                "dates must be strictly increasing: dates[{}]={} is followed by dates[{}]={}",
                idx,
                dates[idx],
                idx + 1,
                dates[idx + 1]
            )));
        }
        if let Some(idx) = values.iter().position(|v| v.is_nan()) {
            return Err(C2cError::invalid_input(format!(
                "value at index {idx} is NaN; use 0 to mark a missing observation"
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
