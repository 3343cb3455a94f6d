//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default primary key column.
pub const DEFAULT_PRIMARY_KEY: &str = "id";
/// Default number of keys per segment.
pub const DEFAULT_SEGMENT_STEP: i64 = 1000;
/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 1;
/// Upper limit on the number of workers.
pub const MAX_WORKERS: usize = 1024;
/// Default row filter.
pub const DEFAULT_FILTER: &str = "true";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Primary key column shared by both tables (default: "id").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Columns to compare. Defaults to every column of the left table.
    #[serde(default)]
    pub diff_columns: Vec<String>,

    /// Left table.
    pub left: TableConfig,

    /// Right table.
    pub right: TableConfig,

    /// Key range and segment size.
    #[serde(default)]
    pub segment: SegmentConfig,

    /// Row filter applied to both sides.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Worker pool settings.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Diff output destination.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Effective primary key column.
    pub fn get_primary_key(&self) -> &str {
        self.primary_key.as_deref().unwrap_or(DEFAULT_PRIMARY_KEY)
    }
}

/// One side's database and table.
#[derive(Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Table name, optionally qualified as `schema.table`.
    pub table: String,

    /// SSL mode: disabled, preferred, required, verify_ca, verify_identity
    /// (default: "preferred").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl TableConfig {
    /// Human-readable location for logs (no credentials).
    pub fn location(&self) -> String {
        format!("{}:{}/{}.{}", self.host, self.port, self.database, self.table)
    }
}

impl fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("table", &self.table)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Key range and segment size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// First primary key to compare (default: 0).
    #[serde(default)]
    pub from: i64,

    /// Last primary key to compare, inclusive. Defaults to the larger of the
    /// two tables' maximum key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,

    /// Keys per segment (default: 1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
}

impl SegmentConfig {
    pub fn get_step(&self) -> i64 {
        self.step.unwrap_or(DEFAULT_SEGMENT_STEP)
    }
}

/// Row filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// SQL boolean predicate applied to both the checksum and row queries
    /// (default: "true").
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
}

impl FilterConfig {
    pub fn get_where(&self) -> &str {
        self.where_clause.as_deref().unwrap_or(DEFAULT_FILTER)
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Number of parallel workers (default: 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Connections per side. Defaults to twice the worker count (at least 2),
    /// since each worker issues at most one query per side at a time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

impl ConcurrencyConfig {
    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_WORKERS)
    }

    pub fn get_max_connections(&self) -> usize {
        self.max_connections
            .unwrap_or_else(|| self.get_workers().saturating_mul(2).max(2))
    }
}

/// Diff output destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output file. Defaults to `<tmp>/table-diff-<uuid>.diff`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl OutputConfig {
    /// Configured path, or a fresh temporary path.
    pub fn get_file(&self) -> PathBuf {
        self.file.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("table-diff-{}.diff", uuid::Uuid::new_v4()))
        })
    }
}

// Default value functions for serde
fn default_mysql_port() -> u16 {
    3306
}

fn default_ssl_mode() -> String {
    "preferred".to_string()
}
