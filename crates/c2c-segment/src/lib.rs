// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod bottomup;
pub mod metrics;
pub mod regrowth;

pub use bottomup::{BottomUp, BottomUpConfig, MIN_SAMPLES, Segmentation, VertexSpan, merge_cost};
pub use metrics::derive_changes;
pub use regrowth::{extend_with_regrowth, locate_vertices, measure};

/// Segmentation namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = c2c_core::crate_name();
    "c2c-segment"
}
