// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;

/// Diagnostics schema version for segmentation run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Merge-loop counters for one segmentation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub initial_segments: usize,
    pub final_segments: usize,
    pub merges_applied: usize,
    /// Merges taken only because the segment count exceeded the cap.
    pub forced_merges: usize,
    pub cost_evals: usize,
}

impl MergeStats {
    /// Adds another segmentation's counters, saturating on overflow.
    pub fn accumulate(&mut self, other: MergeStats) {
        self.initial_segments = self.initial_segments.saturating_add(other.initial_segments);
        self.final_segments = self.final_segments.saturating_add(other.final_segments);
        self.merges_applied = self.merges_applied.saturating_add(other.merges_applied);
        self.forced_merges = self.forced_merges.saturating_add(other.forced_merges);
        self.cost_evals = self.cost_evals.saturating_add(other.cost_evals);
    }
}

/// Structured diagnostics captured from a solver or segmentation run.
///
/// Notes are the run log; the CLI prints them when `logs` is enabled.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostics {
    pub n: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_ms: Option<u64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
    pub algorithm: Cow<'static, str>,
    pub merge_stats: Option<MergeStats>,
    pub filled_values: Option<usize>,
    pub despiked_values: Option<usize>,
    pub thread_count: Option<usize>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            n: 0,
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_ms: None,
            notes: vec![],
            warnings: vec![],
            algorithm: Cow::Borrowed(""),
            merge_stats: None,
            filled_values: None,
            despiked_values: None,
            thread_count: None,
        }
    }
}

impl Diagnostics {
    /// Appends the notes and warnings of a nested run, keeping order, and
    /// sums its merge counters into ours.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.notes.extend(other.notes);
        self.warnings.extend(other.warnings);
        if let Some(stats) = other.merge_stats {
            self.merge_stats
                .get_or_insert_with(MergeStats::default)
                .accumulate(stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics, MergeStats};
    use std::borrow::Cow;

    #[test]
    fn diagnostics_default_sets_schema_and_engine_version() {
        let diagnostics = Diagnostics::default();
        assert_eq!(diagnostics.schema_version, DIAGNOSTICS_SCHEMA_VERSION);
        assert_eq!(
            diagnostics.engine_version,
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        assert_eq!(diagnostics.algorithm, Cow::Borrowed(""));
        assert!(diagnostics.notes.is_empty());
        assert!(diagnostics.merge_stats.is_none());
    }

    #[test]
    fn absorb_appends_notes_and_sums_merge_stats() {
        let mut outer = Diagnostics {
            notes: vec!["preprocess".to_string()],
            ..Diagnostics::default()
        };
        let inner = Diagnostics {
            notes: vec!["bottomup".to_string()],
            warnings: vec!["interpolated".to_string()],
            merge_stats: Some(MergeStats {
                initial_segments: 10,
                final_segments: 3,
                merges_applied: 7,
                forced_merges: 1,
                cost_evals: 21,
            }),
            ..Diagnostics::default()
        };
        outer.absorb(inner.clone());
        assert_eq!(outer.notes, vec!["preprocess", "bottomup"]);
        assert_eq!(outer.warnings, vec!["interpolated"]);
        assert_eq!(outer.merge_stats.map(|s| s.merges_applied), Some(7));

        outer.absorb(inner);
        let stats = outer.merge_stats.expect("stats were absorbed");
        assert_eq!(stats.initial_segments, 20);
        assert_eq!(stats.merges_applied, 14);
        assert_eq!(stats.forced_merges, 2);
        assert_eq!(stats.cost_evals, 42);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn diagnostics_serde_roundtrip() {
        let diagnostics = Diagnostics {
            n: 36,
            runtime_ms: Some(3),
            notes: vec!["merges_applied=30".to_string()],
            algorithm: Cow::Owned("bottomup".to_string()),
            merge_stats: Some(MergeStats::default()),
            filled_values: Some(2),
            ..Diagnostics::default()
        };
        let encoded = serde_json::to_string(&diagnostics).expect("diagnostics should serialize");
        let decoded: Diagnostics =
            serde_json::from_str(&encoded).expect("diagnostics should deserialize");
        assert_eq!(decoded, diagnostics);
    }
}
