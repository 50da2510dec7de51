// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::C2cError;

pub const DEFAULT_MAX_ERROR: f64 = 75.0;
pub const DEFAULT_MAX_SEGMENTS: usize = 6;
pub const DEFAULT_SPIKES_TOLERANCE: f64 = 0.85;
pub const DEFAULT_START_YEAR: i32 = 1984;
pub const DEFAULT_END_YEAR: i32 = 2019;
pub const DEFAULT_REGROWTH_OFFSETS: [usize; 3] = [4, 5, 6];

/// Parameters for one solver run.
///
/// The interpolation pass clones this and flips `regrowth_metrics` off, so the
/// caller's copy is never mutated.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    /// Merge-stop RMSE threshold.
    pub max_error: f64,
    /// Hard cap on the number of fitted segments.
    pub max_segments: usize,
    pub infill: bool,
    /// Despike sensitivity; `1.0` disables despiking.
    pub spikes_tolerance: f64,
    pub revert_band: bool,
    pub negative_magnitude_only: bool,
    pub post_metrics: bool,
    pub regrowth_metrics: bool,
    pub interpolate: bool,
    /// Informational; not enforced against the series dates.
    pub start_year: i32,
    pub end_year: i32,
    /// Sample offsets after a disturbance vertex averaged by `index_regrowth`.
    pub regrowth_offsets: Vec<usize>,
    pub logs: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_error: DEFAULT_MAX_ERROR,
            max_segments: DEFAULT_MAX_SEGMENTS,
            infill: true,
            spikes_tolerance: DEFAULT_SPIKES_TOLERANCE,
            revert_band: false,
            negative_magnitude_only: false,
            post_metrics: true,
            regrowth_metrics: false,
            interpolate: false,
            start_year: DEFAULT_START_YEAR,
            end_year: DEFAULT_END_YEAR,
            regrowth_offsets: DEFAULT_REGROWTH_OFFSETS.to_vec(),
            logs: false,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), C2cError> {
        if !self.max_error.is_finite() || self.max_error < 0.0 {
            return Err(C2cError::invalid_input(format!(
                "max_error must be finite and >= 0.0; got {}",
                self.max_error
            )));
        }
        if self.max_segments == 0 {
            return Err(C2cError::invalid_input("max_segments must be >= 1; got 0"));
        }
        if !self.spikes_tolerance.is_finite() || !(0.0..=1.0).contains(&self.spikes_tolerance) {
            return Err(C2cError::invalid_input(format!(
                "spikes_tolerance must be in [0.0, 1.0]; got {}",
                self.spikes_tolerance
            )));
        }
        if self.start_year > self.end_year {
            return Err(C2cError::invalid_input(format!(
                "start_year must not exceed end_year; got start_year={}, end_year={}",
                self.start_year, self.end_year
            )));
        }
        if self.regrowth_offsets.is_empty() {
            return Err(C2cError::invalid_input(
                "regrowth_offsets must contain at least one offset",
            ));
        }
        if self.regrowth_offsets.contains(&0) {
            return Err(C2cError::invalid_input(format!(
                "regrowth_offsets must all be >= 1; got {:?}",
                self.regrowth_offsets
            )));
        }
        Ok(())
    }

    /// Despiking runs only for tolerances strictly below one.
    pub fn despike_enabled(&self) -> bool {
        self.spikes_tolerance < 1.0
    }

    pub fn metrics_layout(&self) -> MetricsLayout {
        MetricsLayout {
            post: self.post_metrics,
            regrowth: self.regrowth_metrics,
        }
    }

    /// Copy used for the first interpolation pass: same thresholds, no regrowth.
    pub fn without_regrowth(&self) -> Self {
        Self {
            regrowth_metrics: false,
            ..self.clone()
        }
    }
}

/// Which optional metric groups a run emits, fixed once per configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsLayout {
    pub post: bool,
    pub regrowth: bool,
}

impl MetricsLayout {
    pub const BASE_COLUMNS: [&'static str; 5] = ["year", "index", "magnitude", "duration", "rate"];
    pub const POST_COLUMNS: [&'static str; 3] = ["postMagnitude", "postDuration", "postRate"];
    pub const REGROWTH_COLUMNS: [&'static str; 5] =
        ["indexRegrowth", "recoveryIndicator", "y2r60", "y2r80", "y2r100"];

    /// Column names of one change row, without any leading key columns.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut out = Self::BASE_COLUMNS.to_vec();
        if self.post {
            out.extend(Self::POST_COLUMNS);
        }
        if self.regrowth {
            out.extend(Self::REGROWTH_COLUMNS);
        }
        out
    }

    pub fn width(&self) -> usize {
        Self::BASE_COLUMNS.len()
            + if self.post { Self::POST_COLUMNS.len() } else { 0 }
            + if self.regrowth {
                Self::REGROWTH_COLUMNS.len()
            } else {
                0
            }
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricsLayout, SolverConfig};
    use crate::C2cError;

    #[test]
    fn defaults_match_published_parameters() {
        let cfg = SolverConfig::default();
        assert_eq!(cfg.max_error, 75.0);
        assert_eq!(cfg.max_segments, 6);
        assert!(cfg.infill);
        assert_eq!(cfg.spikes_tolerance, 0.85);
        assert!(!cfg.revert_band);
        assert!(!cfg.negative_magnitude_only);
        assert!(cfg.post_metrics);
        assert!(!cfg.regrowth_metrics);
        assert!(!cfg.interpolate);
        assert_eq!((cfg.start_year, cfg.end_year), (1984, 2019));
        assert_eq!(cfg.regrowth_offsets, vec![4, 5, 6]);
        cfg.validate().expect("defaults should validate");
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        let cases = [
            SolverConfig {
                max_error: f64::NAN,
                ..SolverConfig::default()
            },
            SolverConfig {
                max_segments: 0,
                ..SolverConfig::default()
            },
            SolverConfig {
                spikes_tolerance: 1.5,
                ..SolverConfig::default()
            },
            SolverConfig {
                start_year: 2020,
                end_year: 2019,
                ..SolverConfig::default()
            },
            SolverConfig {
                regrowth_offsets: vec![],
                ..SolverConfig::default()
            },
            SolverConfig {
                regrowth_offsets: vec![0, 5],
                ..SolverConfig::default()
            },
        ];
        for cfg in cases {
            let err = cfg.validate().expect_err("config should be rejected");
            assert!(matches!(err, C2cError::InvalidInput(_)), "{err}");
        }
    }

    #[test]
    fn without_regrowth_leaves_caller_config_untouched() {
        let cfg = SolverConfig {
            regrowth_metrics: true,
            interpolate: true,
            ..SolverConfig::default()
        };
        let simple = cfg.without_regrowth();
        assert!(!simple.regrowth_metrics);
        assert!(simple.interpolate);
        assert!(cfg.regrowth_metrics);
    }

    #[test]
    fn despike_disabled_at_tolerance_one() {
        let cfg = SolverConfig {
            spikes_tolerance: 1.0,
            ..SolverConfig::default()
        };
        assert!(!cfg.despike_enabled());
        assert!(SolverConfig::default().despike_enabled());
    }

    #[test]
    fn layout_columns_follow_enabled_groups() {
        let base = MetricsLayout::default();
        assert_eq!(base.columns(), vec!["year", "index", "magnitude", "duration", "rate"]);
        assert_eq!(base.width(), 5);

        let full = MetricsLayout {
            post: true,
            regrowth: true,
        };
        assert_eq!(full.width(), 13);
        assert_eq!(full.columns().len(), full.width());
        assert_eq!(full.columns()[5], "postMagnitude");
        assert_eq!(full.columns()[12], "y2r100");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_serde_fills_missing_fields_with_defaults() {
        let cfg: SolverConfig = serde_json::from_str(r#"{"max_segments": 4, "revert_band": true}"#)
            .expect("partial config should deserialize");
        assert_eq!(cfg.max_segments, 4);
        assert!(cfg.revert_band);
        assert_eq!(cfg.max_error, 75.0);

        let err = serde_json::from_str::<SolverConfig>(r#"{"max_segmnts": 4}"#);
        assert!(err.is_err(), "unknown fields should be rejected");
    }
}
