//! Row-level comparison for segments whose checksums disagree.

use std::collections::BTreeMap;

use super::types::{Row, RowDiff, Segment};
use crate::error::{DiffError, Result};
use crate::source::{DiffScope, Side, TableSource};

/// Fetch both sides' rows concurrently and compare them.
pub async fn diff_rows(
    left: &dyn TableSource,
    right: &dyn TableSource,
    scope: &DiffScope,
    segment: Segment,
) -> Result<Vec<RowDiff>> {
    let (left_rows, right_rows) = tokio::join!(
        left.fetch_rows(scope, segment),
        right.fetch_rows(scope, segment)
    );

    compare_rows(scope, segment, left_rows?, right_rows?)
}

/// Match rows on the primary key and report every discrepancy.
///
/// Matched pairs yield a diff only if some column's string value differs, and
/// list exactly those columns in diff-column order. Unmatched rows list every
/// diff column. Left-driven diffs come first in key order, then right-only
/// rows in key order.
pub fn compare_rows(
    scope: &DiffScope,
    segment: Segment,
    left_rows: Vec<Row>,
    right_rows: Vec<Row>,
) -> Result<Vec<RowDiff>> {
    let left = index_rows(Side::Left, scope, segment, left_rows)?;
    let mut right = index_rows(Side::Right, scope, segment, right_rows)?;

    let mut diffs = Vec::new();

    for (key, left_row) in left {
        match right.remove(&key) {
            None => diffs.push(RowDiff {
                primary_key: key,
                columns: scope.columns().to_vec(),
                left: Some(left_row),
                right: None,
            }),
            Some(right_row) => {
                let columns: Vec<String> = scope
                    .columns()
                    .iter()
                    .filter(|col| left_row.get(*col) != right_row.get(*col))
                    .cloned()
                    .collect();
                if !columns.is_empty() {
                    diffs.push(RowDiff {
                        primary_key: key,
                        columns,
                        left: Some(left_row),
                        right: Some(right_row),
                    });
                }
            }
        }
    }

    for (key, right_row) in right {
        diffs.push(RowDiff {
            primary_key: key,
            columns: scope.columns().to_vec(),
            left: None,
            right: Some(right_row),
        });
    }

    Ok(diffs)
}

fn index_rows(
    side: Side,
    scope: &DiffScope,
    segment: Segment,
    rows: Vec<Row>,
) -> Result<BTreeMap<i64, Row>> {
    let mut indexed = BTreeMap::new();
    for row in rows {
        let key = parse_key(side, scope.primary_key(), segment, &row)?;
        if indexed.insert(key, row).is_some() {
            return Err(DiffError::query(
                side,
                segment,
                format!(
                    "duplicate value {} in column '{}'; it is not a key",
                    key,
                    scope.primary_key()
                ),
            ));
        }
    }
    Ok(indexed)
}

fn parse_key(side: Side, primary_key: &str, segment: Segment, row: &Row) -> Result<i64> {
    let raw = match row.get(primary_key) {
        Some(Some(value)) => value,
        _ => {
            return Err(DiffError::KeyParse {
                side,
                segment,
                value: "NULL".to_string(),
            })
        }
    };

    raw.parse::<i64>().map_err(|_| DiffError::KeyParse {
        side,
        segment,
        value: raw.clone(),
    })
}
