//! Diff record persistence.
//!
//! Every [`RowDiff`] is written as one JSON object per line (JSON Lines), so
//! downstream tools can stream the output without loading it whole.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::diff::RowDiff;
use crate::error::{DiffError, Result};

/// Append-only destination for diff records.
///
/// Shared by every worker; implementations serialize writes so records never
/// interleave.
#[async_trait]
pub trait DiffSink: Send + Sync {
    /// Persist one record.
    async fn write(&self, diff: &RowDiff) -> Result<()>;

    /// Flush and release the destination. A second call is a no-op.
    async fn close(&self) -> Result<()>;
}

/// JSON Lines file sink.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLinesSink {
    /// Create (or truncate) the output file.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await.map_err(|e| {
            DiffError::sink(format!("cannot create {}: {}", path.display(), e))
        })?;

        info!("Writing diff records to {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DiffSink for JsonLinesSink {
    async fn write(&self, diff: &RowDiff) -> Result<()> {
        let mut line = serde_json::to_vec(diff)?;
        line.push(b'\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| DiffError::sink(format!("{} is already closed", self.path.display())))?;

        writer.write_all(&line).await.map_err(|e| {
            DiffError::sink(format!("write to {} failed: {}", self.path.display(), e))
        })
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let Some(mut writer) = guard.take() else {
            return Ok(());
        };

        writer.flush().await.map_err(|e| {
            DiffError::sink(format!("flush of {} failed: {}", self.path.display(), e))
        })?;
        writer.get_ref().sync_all().await.map_err(|e| {
            DiffError::sink(format!("sync of {} failed: {}", self.path.display(), e))
        })?;

        debug!("Closed diff output {}", self.path.display());
        Ok(())
    }
}

/// Read a diff file back into records.
pub async fn read_diffs(path: impl AsRef<Path>) -> Result<Vec<RowDiff>> {
    let file = File::open(path.as_ref()).await?;
    let mut lines = BufReader::new(file).lines();

    let mut diffs = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        diffs.push(serde_json::from_str(&line)?);
    }
    Ok(diffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Row;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn diff(key: i64) -> RowDiff {
        let mut row = Row::new();
        row.insert("id".to_string(), Some(key.to_string()));
        row.insert("name".to_string(), None);
        RowDiff {
            primary_key: key,
            columns: vec!["id".to_string(), "name".to_string()],
            left: Some(row),
            right: None,
        }
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.diff");

        let sink = JsonLinesSink::create(&path).await.unwrap();
        sink.write(&diff(1)).await.unwrap();
        sink.write(&diff(2)).await.unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(
            content.lines().next().unwrap(),
            r#"{"primary_key":1,"columns":["id","name"],"left":{"id":"1","name":null},"right":null}"#
        );

        let diffs = read_diffs(&path).await.unwrap();
        assert_eq!(diffs, vec![diff(1), diff(2)]);
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let dir = TempDir::new().unwrap();
        let sink = JsonLinesSink::create(dir.path().join("out.diff")).await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let sink = JsonLinesSink::create(dir.path().join("out.diff")).await.unwrap();
        sink.close().await.unwrap();

        let err = sink.write(&diff(1)).await.unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_SINK_ERROR);
    }

    #[tokio::test]
    async fn test_create_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.diff");
        std::fs::write(&path, "stale\n").unwrap();

        let sink = JsonLinesSink::create(&path).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_create_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let err = match JsonLinesSink::create(dir.path().join("missing/out.diff")).await {
            Ok(_) => panic!("expected create to fail"),
            Err(e) => e,
        };
        assert_eq!(err.exit_code(), crate::error::EXIT_SINK_ERROR);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.diff");
        let sink = Arc::new(JsonLinesSink::create(&path).await.unwrap());

        let mut handles = Vec::new();
        for task in 0..8i64 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50i64 {
                    sink.write(&diff(task * 1000 + i)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        sink.close().await.unwrap();

        let mut keys: Vec<i64> = read_diffs(&path)
            .await
            .unwrap()
            .iter()
            .map(|d| d.primary_key)
            .collect();
        keys.sort();
        assert_eq!(keys.len(), 400);
        keys.dedup();
        assert_eq!(keys.len(), 400);
    }
}
