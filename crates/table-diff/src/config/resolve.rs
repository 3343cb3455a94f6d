//! Resolution of a validated configuration against the live tables.
//!
//! Fills in every default that needs introspection (diff columns, upper key
//! bound) and produces the immutable [`DiffPlan`] the engine runs.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use super::Config;
use crate::diff::segment_count;
use crate::error::{DiffError, Result};
use crate::source::{ColumnInfo, DiffScope, MysqlSource, Side};

/// Fully resolved run parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffPlan {
    /// Primary key column.
    pub primary_key: String,
    /// Diff columns in comparison order, primary key included.
    pub diff_columns: Vec<String>,
    /// Row filter predicate.
    pub filter: String,
    /// First key compared.
    pub from: i64,
    /// End of the compared key range (exclusive).
    pub to: i64,
    /// Keys per segment.
    pub step: i64,
    /// Number of segments the range splits into.
    pub segments: usize,
    /// Number of parallel workers.
    pub workers: usize,
    /// Diff output file.
    pub output_file: PathBuf,
    /// Left table name.
    pub left_table: String,
    /// Right table name.
    pub right_table: String,
}

impl DiffPlan {
    /// Comparison scope shared by both sides.
    pub fn scope(&self) -> DiffScope {
        DiffScope::new(
            self.primary_key.clone(),
            self.diff_columns.clone(),
            self.filter.clone(),
        )
    }
}

impl Config {
    /// Resolve defaults against both connected tables.
    pub async fn resolve(&self, left: &MysqlSource, right: &MysqlSource) -> Result<DiffPlan> {
        let primary_key = self.get_primary_key().to_string();

        let left_columns = left.list_columns().await?;
        if left_columns.is_empty() {
            return Err(DiffError::Config(format!(
                "left table '{}' does not exist or has no columns",
                self.left.table
            )));
        }
        let right_columns = right.list_columns().await?;
        if right_columns.is_empty() {
            return Err(DiffError::Config(format!(
                "right table '{}' does not exist or has no columns",
                self.right.table
            )));
        }

        let diff_columns = resolve_columns(
            &primary_key,
            &self.diff_columns,
            &left_columns,
            &right_columns,
        )?;

        let to = match self.segment.to {
            Some(to) => to,
            None => {
                let left_max = left.max_primary_key(&primary_key).await?;
                let right_max = right.max_primary_key(&primary_key).await?;
                let to = resolve_upper_bound(left_max, right_max);
                info!(
                    "Upper key bound {} (left max {:?}, right max {:?})",
                    to, left_max, right_max
                );
                to
            }
        };

        let from = self.segment.from;
        // Configured bound is inclusive; the engine works on [from, end).
        let end = exclusive_end(to)?;
        let step = self.segment.get_step();
        let segments = segment_count(from, end, step);
        if segments == 0 {
            warn!("Key range [{}, {}] is empty, nothing to compare", from, to);
        }

        Ok(DiffPlan {
            primary_key,
            diff_columns,
            filter: self.filter.get_where().to_string(),
            from,
            to: end,
            step,
            segments,
            workers: self.concurrency.get_workers(),
            output_file: self.output.get_file(),
            left_table: self.left.table.clone(),
            right_table: self.right.table.clone(),
        })
    }
}

/// Resolve the diff column list.
///
/// Defaults to every left column. Each column must exist on both sides, and
/// the primary key column must exist on both sides as a `PRI` key. The
/// primary key is appended when missing.
pub fn resolve_columns(
    primary_key: &str,
    configured: &[String],
    left: &[ColumnInfo],
    right: &[ColumnInfo],
) -> Result<Vec<String>> {
    for (side, available) in [(Side::Left, left), (Side::Right, right)] {
        match available.iter().find(|c| c.name == primary_key) {
            None => {
                return Err(DiffError::Config(format!(
                    "primary key column '{}' does not exist in the {} table",
                    primary_key, side
                )))
            }
            Some(pk) if !pk.is_primary_key => {
                return Err(DiffError::Config(format!(
                    "column '{}' is not a primary key column of the {} table",
                    primary_key, side
                )))
            }
            Some(_) => {}
        }
    }

    let mut columns: Vec<String> = if configured.is_empty() {
        left.iter().map(|c| c.name.clone()).collect()
    } else {
        configured.to_vec()
    };

    for (side, available) in [(Side::Left, left), (Side::Right, right)] {
        if let Some(missing) = columns
            .iter()
            .find(|col| !available.iter().any(|c| &c.name == *col))
        {
            return Err(DiffError::Config(format!(
                "diff column '{}' does not exist in the {} table",
                missing, side
            )));
        }
    }

    if !columns.iter().any(|c| c == primary_key) {
        columns.push(primary_key.to_string());
    }

    Ok(columns)
}

/// Inclusive upper key bound from both sides' maxima; an empty table counts
/// as 0.
pub fn resolve_upper_bound(left_max: Option<i64>, right_max: Option<i64>) -> i64 {
    left_max.unwrap_or(0).max(right_max.unwrap_or(0))
}

/// Exclusive end of the range for an inclusive upper key.
///
/// `i64::MAX` has no exclusive successor, so that key cannot be compared.
pub fn exclusive_end(to: i64) -> Result<i64> {
    to.checked_add(1).ok_or_else(|| {
        DiffError::Config(format!(
            "upper key bound {} is out of range, it must be less than {}",
            to,
            i64::MAX
        ))
    })
}
