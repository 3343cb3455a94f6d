//! Aggregate checksum comparison for one segment.

use super::types::Segment;
use crate::error::Result;
use crate::source::{DiffScope, TableSource};

/// Both sides' aggregate checksums for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumPair {
    pub left: i64,
    pub right: i64,
}

impl ChecksumPair {
    /// Equal checksums are taken as proof the segment is identical.
    pub fn matches(&self) -> bool {
        self.left == self.right
    }
}

/// Compute both checksums concurrently and wait for both.
pub async fn compare_checksums(
    left: &dyn TableSource,
    right: &dyn TableSource,
    scope: &DiffScope,
    segment: Segment,
) -> Result<ChecksumPair> {
    let (left_result, right_result) = tokio::join!(
        left.checksum(scope, segment),
        right.checksum(scope, segment)
    );

    Ok(ChecksumPair {
        left: left_result?,
        right: right_result?,
    })
}
