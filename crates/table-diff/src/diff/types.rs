//! Type definitions for segmented table diffing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One fetched row: diff column name to its string form (`None` for SQL NULL).
pub type Row = BTreeMap<String, Option<String>>;

/// Half-open primary key range `[head, tail)`, the unit of parallel work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// First primary key value (inclusive).
    pub head: i64,
    /// End of the range (exclusive).
    pub tail: i64,
}

impl Segment {
    /// Create a new segment.
    pub fn new(head: i64, tail: i64) -> Self {
        Self { head, tail }
    }

    /// Number of keys covered by this segment.
    pub fn len(&self) -> i64 {
        self.tail.saturating_sub(self.head).max(0)
    }

    /// Check if the segment covers no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a key falls inside this segment.
    pub fn contains(&self, key: i64) -> bool {
        key >= self.head && key < self.tail
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.head, self.tail)
    }
}

/// A single primary key's discrepancy between the two tables.
///
/// Serialized as one JSON object per line in the diff output. A missing side
/// is written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDiff {
    /// Primary key value shared by both sides.
    pub primary_key: i64,
    /// Differing columns, or every diff column when one side is missing.
    pub columns: Vec<String>,
    /// Left row, `None` if the key only exists on the right.
    pub left: Option<Row>,
    /// Right row, `None` if the key only exists on the left.
    pub right: Option<Row>,
}

impl RowDiff {
    /// Classify this record.
    pub fn kind(&self) -> DiffKind {
        match (&self.left, &self.right) {
            (Some(_), None) => DiffKind::LeftOnly,
            (None, Some(_)) => DiffKind::RightOnly,
            _ => DiffKind::Mismatch,
        }
    }
}

/// Kind of a row discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Key exists only in the left table.
    LeftOnly,
    /// Key exists only in the right table.
    RightOnly,
    /// Key exists on both sides with different values.
    Mismatch,
}

/// Result of comparing one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Checksums agreed; row fetch skipped.
    Identical { checksum: i64 },
    /// Checksums disagreed; row-level comparison produced `diffs`.
    ///
    /// `diffs` may be empty when the checksum difference is not visible in
    /// the string projections.
    Differs {
        left_checksum: i64,
        right_checksum: i64,
        diffs: Vec<RowDiff>,
    },
}

impl SegmentOutcome {
    /// Number of row diffs produced by this segment.
    pub fn diff_count(&self) -> usize {
        match self {
            SegmentOutcome::Identical { .. } => 0,
            SegmentOutcome::Differs { diffs, .. } => diffs.len(),
        }
    }

    /// Check if the segment matched on the checksum fast path.
    pub fn is_identical(&self) -> bool {
        matches!(self, SegmentOutcome::Identical { .. })
    }
}

/// Counters aggregated over a diff run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Segments produced by the segmenter.
    pub segments_total: usize,
    /// Segments fully compared.
    pub segments_completed: usize,
    /// Segments whose checksums matched.
    pub segments_identical: usize,
    /// Segments that needed row-level comparison.
    pub segments_differing: usize,
    /// Total diff records persisted.
    pub rows_differing: u64,
    /// Keys present only on the left.
    pub rows_left_only: u64,
    /// Keys present only on the right.
    pub rows_right_only: u64,
    /// Keys present on both sides with different values.
    pub rows_mismatched: u64,
}

impl DiffSummary {
    /// Record one persisted diff.
    pub fn add_diff(&mut self, diff: &RowDiff) {
        self.rows_differing += 1;
        match diff.kind() {
            DiffKind::LeftOnly => self.rows_left_only += 1,
            DiffKind::RightOnly => self.rows_right_only += 1,
            DiffKind::Mismatch => self.rows_mismatched += 1,
        }
    }

    /// Record a completed segment.
    pub fn add_segment(&mut self, identical: bool) {
        self.segments_completed += 1;
        if identical {
            self.segments_identical += 1;
        } else {
            self.segments_differing += 1;
        }
    }

    /// Merge another summary (e.g. one worker's counters) into this one.
    pub fn merge(&mut self, other: &DiffSummary) {
        self.segments_completed += other.segments_completed;
        self.segments_identical += other.segments_identical;
        self.segments_differing += other.segments_differing;
        self.rows_differing += other.rows_differing;
        self.rows_left_only += other.rows_left_only;
        self.rows_right_only += other.rows_right_only;
        self.rows_mismatched += other.rows_mismatched;
    }

    /// Check if the run found no differences.
    pub fn is_in_sync(&self) -> bool {
        self.rows_differing == 0 && self.segments_differing == 0
    }
}
