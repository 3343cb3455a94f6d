//! In-memory table sources and sinks for engine tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use table_diff::diff::{DiffSummary, Row, RowDiff, Segment, SegmentOutcome};
use table_diff::progress::ProgressReporter;
use table_diff::source::{DiffScope, Side, TableSource};
use table_diff::{DiffError, DiffSink, Result};

/// A table held in memory, keyed by primary key.
pub struct MemorySource {
    side: Side,
    table: String,
    rows: BTreeMap<i64, Row>,
    fail_at: Option<i64>,
    panic_at: Option<i64>,
    checksum_calls: Mutex<Vec<Segment>>,
    fetch_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(side: Side, rows: Vec<Row>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                let key = row
                    .get("id")
                    .and_then(|v| v.as_deref())
                    .and_then(|v| v.parse::<i64>().ok())
                    .expect("test rows carry an integer id");
                (key, row)
            })
            .collect();

        Self {
            side,
            table: format!("{}_table", side),
            rows,
            fail_at: None,
            panic_at: None,
            checksum_calls: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the checksum query of the segment starting at `head`.
    pub fn failing_at(mut self, head: i64) -> Self {
        self.fail_at = Some(head);
        self
    }

    /// Panic inside the checksum query of the segment starting at `head`.
    pub fn panicking_at(mut self, head: i64) -> Self {
        self.panic_at = Some(head);
        self
    }

    /// Segments whose checksum was requested, in call order.
    pub fn checksum_calls(&self) -> Vec<Segment> {
        self.checksum_calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn rows_in(&self, segment: Segment) -> impl Iterator<Item = &Row> {
        self.rows.range(segment.head..segment.tail).map(|(_, row)| row)
    }
}

#[async_trait]
impl TableSource for MemorySource {
    fn side(&self) -> Side {
        self.side
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn checksum(&self, scope: &DiffScope, segment: Segment) -> Result<i64> {
        self.checksum_calls.lock().unwrap().push(segment);
        tokio::task::yield_now().await;

        if self.fail_at == Some(segment.head) {
            return Err(DiffError::query(self.side, segment, "simulated failure"));
        }
        if self.panic_at == Some(segment.head) {
            panic!("checksum of segment {} blew up", segment);
        }

        Ok(self
            .rows_in(segment)
            .map(|row| row_checksum(scope, row))
            .sum())
    }

    async fn fetch_rows(&self, scope: &DiffScope, segment: Segment) -> Result<Vec<Row>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        Ok(self
            .rows_in(segment)
            .map(|row| {
                scope
                    .columns()
                    .iter()
                    .map(|col| (col.clone(), row.get(col).cloned().flatten()))
                    .collect()
            })
            .collect())
    }
}

/// 32-bit checksum of the concatenated column values, NULL as empty.
fn row_checksum(scope: &DiffScope, row: &Row) -> i64 {
    let mut hasher = Sha256::new();
    for col in scope.columns() {
        if let Some(Some(value)) = row.get(col) {
            hasher.update(value.as_bytes());
        }
    }
    let digest = hasher.finalize();
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as i64
}

/// Sink that keeps every record in memory.
#[derive(Default)]
pub struct CollectingSink {
    diffs: Mutex<Vec<RowDiff>>,
    closes: AtomicUsize,
}

impl CollectingSink {
    pub fn diffs(&self) -> Vec<RowDiff> {
        self.diffs.lock().unwrap().clone()
    }

    /// (primary key, differing columns), sorted.
    pub fn keyed(&self) -> Vec<(i64, Vec<String>)> {
        let mut keyed: Vec<(i64, Vec<String>)> = self
            .diffs()
            .into_iter()
            .map(|d| (d.primary_key, d.columns))
            .collect();
        keyed.sort();
        keyed
    }
}

#[async_trait]
impl DiffSink for CollectingSink {
    async fn write(&self, diff: &RowDiff) -> Result<()> {
        self.diffs.lock().unwrap().push(diff.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink whose every write fails.
#[derive(Default)]
pub struct FailingSink {
    pub writes: AtomicUsize,
}

#[async_trait]
impl DiffSink for FailingSink {
    async fn write(&self, _diff: &RowDiff) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(DiffError::sink("disk full"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Progress reporter counting events.
#[derive(Default)]
pub struct CountingProgress {
    pub started_with: AtomicUsize,
    pub done: AtomicUsize,
    pub finished: AtomicUsize,
}

impl ProgressReporter for CountingProgress {
    fn start(&self, total_segments: usize) {
        self.started_with.store(total_segments, Ordering::SeqCst);
    }

    fn segment_done(&self, _segment: Segment, _outcome: &SegmentOutcome) {
        self.done.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self, _summary: &DiffSummary) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a row from `(column, value)` pairs.
pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}

/// `count` rows `{id, name, email}` with keys `0..count`.
pub fn users(count: i64) -> Vec<Row> {
    (0..count)
        .map(|id| {
            let key = id.to_string();
            let name = format!("user{}", id);
            let email = format!("user{}@example.com", id);
            row(&[("id", key.as_str()), ("name", name.as_str()), ("email", email.as_str())])
        })
        .collect()
}

pub fn scope(columns: &[&str]) -> DiffScope {
    DiffScope::new("id", columns.iter().map(|c| c.to_string()).collect(), "true")
}

pub fn arc(source: MemorySource) -> Arc<MemorySource> {
    Arc::new(source)
}
