//! Table sources: the query interface the diff engine needs from each side.
//!
//! - [`TableSource`]: aggregate checksum and row projection over a key segment
//! - [`MysqlSource`]: MySQL/MariaDB implementation over a SQLx pool
//! - [`query`]: SQL generation shared by the MySQL backend

pub mod mysql;
pub mod query;

pub use mysql::{ColumnInfo, MysqlSource};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diff::{Row, Segment};
use crate::error::Result;

/// Which of the two compared tables a value or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// What to compare: the key column, the projected columns, and the row filter.
///
/// Shared by both sides so the checksum and row queries are built from the
/// same column list and predicate text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffScope {
    primary_key: String,
    columns: Vec<String>,
    filter: String,
}

impl DiffScope {
    /// Create a scope. The primary key column is appended to `columns` if
    /// missing, since rows are matched on it.
    pub fn new(primary_key: impl Into<String>, columns: Vec<String>, filter: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        let mut columns = columns;
        if !columns.iter().any(|c| *c == primary_key) {
            columns.push(primary_key.clone());
        }
        let filter = filter.into();
        let filter = if filter.trim().is_empty() {
            "true".to_string()
        } else {
            filter
        };

        Self {
            primary_key,
            columns,
            filter,
        }
    }

    /// Primary key column name.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Diff columns in comparison order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row filter predicate, applied verbatim to both query kinds.
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

/// One side of the comparison.
///
/// Implementations must be safe for concurrent use: every worker shares the
/// same source.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Which side this source serves.
    fn side(&self) -> Side;

    /// Table name (for logging).
    fn table(&self) -> &str;

    /// Sum of per-row checksums over the scope's columns for rows in
    /// `segment` matching the filter. An empty segment yields 0.
    async fn checksum(&self, scope: &DiffScope, segment: Segment) -> Result<i64>;

    /// Every row in `segment` matching the filter, projected onto the scope's
    /// columns as strings.
    async fn fetch_rows(&self, scope: &DiffScope, segment: Segment) -> Result<Vec<Row>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_appends_primary_key() {
        let scope = DiffScope::new("id", vec!["name".into(), "email".into()], "true");
        assert_eq!(scope.columns(), &["name", "email", "id"]);
    }

    #[test]
    fn test_scope_keeps_existing_primary_key_position() {
        let scope = DiffScope::new("id", vec!["id".into(), "name".into()], "deleted = 0");
        assert_eq!(scope.columns(), &["id", "name"]);
        assert_eq!(scope.filter(), "deleted = 0");
    }

    #[test]
    fn test_scope_blank_filter_defaults_to_true() {
        let scope = DiffScope::new("id", vec![], "  ");
        assert_eq!(scope.filter(), "true");
        assert_eq!(scope.columns(), &["id"]);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Left.to_string(), "left");
        assert_eq!(Side::Right.to_string(), "right");
    }
}
