// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod arrays;
pub mod changes;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod execution_context;
pub mod observability;
pub mod table;
pub mod time_series;

pub use changes::{Change, PostMetrics, REGROWTH_REPORT_PERCENTS, Regrowth};
pub use config::{DEFAULT_REGROWTH_OFFSETS, MetricsLayout, SolverConfig};
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics, MergeStats};
pub use error::{C2cError, checked_counter_increment};
pub use execution_context::ExecutionContext;
pub use observability::{NoopTelemetry, ProgressSink, TelemetrySink};
pub use table::{ChangeTable, KEY_COLUMNS, SeriesTable};
pub use time_series::TimeSeries;

/// Core shared types and traits for c2c-rs.
pub fn crate_name() -> &'static str {
    "c2c-core"
}
