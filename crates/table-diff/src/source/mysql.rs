//! MySQL/MariaDB table source.
//!
//! Uses SQLx for connection pooling and async query execution. One
//! [`MysqlSource`] is bound to one table; the pool is shared by every worker.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row as _;
use tracing::{debug, info};

use super::query::{checksum_query, max_pk_query, rows_query, COLUMNS_QUERY};
use super::{DiffScope, Side, TableSource};
use crate::config::TableConfig;
use crate::diff::{Row, Segment};
use crate::error::{DiffError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Column metadata from `INFORMATION_SCHEMA.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// MySQL data type (e.g. `int`, `varchar`).
    pub data_type: String,
    /// Whether the column is part of the primary key (`COLUMN_KEY = 'PRI'`).
    pub is_primary_key: bool,
}

/// MySQL/MariaDB source for one side of the diff.
pub struct MysqlSource {
    side: Side,
    pool: MySqlPool,
    table: String,
}

impl MysqlSource {
    /// Connect to the database described by `config` and bind to its table.
    pub async fn connect(side: Side, config: &TableConfig, max_conns: usize) -> Result<Self> {
        let ssl_mode = parse_ssl_mode(&config.ssl_mode)
            .ok_or_else(|| DiffError::Config(format!("{}.ssl_mode '{}' is not supported", side, config.ssl_mode)))?;

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode);

        let pool = MySqlPoolOptions::new()
            .max_connections(u32::try_from(max_conns.max(1)).unwrap_or(u32::MAX))
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| DiffError::connection(side, e))?;

        let source = Self {
            side,
            pool,
            table: config.table.clone(),
        };
        source
            .test_connection()
            .await
            .map_err(|e| DiffError::connection(side, e))?;

        info!(
            "Connected to MySQL ({} side): {}:{}/{} table {}",
            side, config.host, config.port, config.database, config.table
        );

        Ok(source)
    }

    /// Run `SELECT 1` and return the round-trip latency.
    pub async fn test_connection(&self) -> std::result::Result<Duration, sqlx::Error> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(start.elapsed())
    }

    /// List the table's columns in ordinal order.
    ///
    /// An empty result means the table does not exist.
    pub async fn list_columns(&self) -> Result<Vec<ColumnInfo>> {
        let (schema, table) = match self.table.split_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, self.table.as_str()),
        };

        let rows: Vec<MySqlRow> = sqlx::query(COLUMNS_QUERY)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DiffError::introspection(self.side, e))?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get("column_name")
                    .map_err(|e| DiffError::introspection(self.side, e))?;
                let data_type: String = row
                    .try_get("data_type")
                    .map_err(|e| DiffError::introspection(self.side, e))?;
                let column_key: String = row
                    .try_get("column_key")
                    .map_err(|e| DiffError::introspection(self.side, e))?;
                Ok(ColumnInfo {
                    name,
                    data_type,
                    is_primary_key: column_key.eq_ignore_ascii_case("PRI"),
                })
            })
            .collect()
    }

    /// Largest primary key value, or `None` for an empty table.
    pub async fn max_primary_key(&self, primary_key: &str) -> Result<Option<i64>> {
        let sql = max_pk_query(&self.table, primary_key);
        sqlx::query_scalar::<_, Option<i64>>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DiffError::introspection(self.side, e))
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Decode column `idx` as text, accepting binary-flagged results.
    fn text_value(&self, row: &MySqlRow, idx: usize, segment: Segment) -> Result<Option<String>> {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(value) => Ok(value),
            Err(_) => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .map(|v| v.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
                .map_err(|e| DiffError::query(self.side, segment, e)),
        }
    }
}

#[async_trait]
impl TableSource for MysqlSource {
    fn side(&self) -> Side {
        self.side
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn checksum(&self, scope: &DiffScope, segment: Segment) -> Result<i64> {
        let sql = checksum_query(&self.table, scope);
        let crc = sqlx::query_scalar::<_, i64>(&sql)
            .bind(segment.head)
            .bind(segment.tail)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DiffError::query(self.side, segment, e))?;

        debug!("{} {} checksum {}: {}", self.side, self.table, segment, crc);
        Ok(crc)
    }

    async fn fetch_rows(&self, scope: &DiffScope, segment: Segment) -> Result<Vec<Row>> {
        let sql = rows_query(&self.table, scope);
        let rows: Vec<MySqlRow> = sqlx::query(&sql)
            .bind(segment.head)
            .bind(segment.tail)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DiffError::query(self.side, segment, e))?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut projected = Row::new();
            for (idx, col) in scope.columns().iter().enumerate() {
                projected.insert(col.clone(), self.text_value(row, idx, segment)?);
            }
            result.push(projected);
        }

        debug!(
            "{} {} fetched {} rows for {}",
            self.side,
            self.table,
            result.len(),
            segment
        );
        Ok(result)
    }
}

/// Map a configured SSL mode to SQLx's enum.
pub fn parse_ssl_mode(mode: &str) -> Option<MySqlSslMode> {
    match mode.to_lowercase().as_str() {
        "disabled" | "disable" => Some(MySqlSslMode::Disabled),
        "preferred" | "prefer" => Some(MySqlSslMode::Preferred),
        "required" | "require" => Some(MySqlSslMode::Required),
        "verify_ca" => Some(MySqlSslMode::VerifyCa),
        "verify_identity" => Some(MySqlSslMode::VerifyIdentity),
        _ => None,
    }
}
