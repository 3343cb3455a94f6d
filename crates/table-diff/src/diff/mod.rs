//! Segmented, concurrent table comparison.
//!
//! The key range is split into segments. A fixed pool of workers pulls
//! segments from a bounded queue; each worker compares aggregate checksums and
//! falls back to row-level comparison only when they disagree. Every
//! resulting [`RowDiff`] goes to the shared [`DiffSink`].
//!
//! The first worker error is latched and cancels the run; workers finish the
//! segment in hand but take no new one.

mod checksum;
mod rows;
mod segment;
mod types;

pub use checksum::{compare_checksums, ChecksumPair};
pub use rows::{compare_rows, diff_rows};
pub use segment::{segment_count, segments};
pub use types::{DiffKind, DiffSummary, Row, RowDiff, Segment, SegmentOutcome};

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DiffError, Result};
use crate::progress::{NoProgress, ProgressReporter};
use crate::sink::DiffSink;
use crate::source::{DiffScope, TableSource};

/// Key range and parallelism for one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// First key (inclusive).
    pub from: i64,
    /// End of the range (exclusive).
    pub to: i64,
    /// Keys per segment, must be positive.
    pub step: i64,
    /// Number of workers.
    pub workers: usize,
}

/// Drives a diff run over two table sources.
#[derive(Clone)]
pub struct DiffEngine {
    left: Arc<dyn TableSource>,
    right: Arc<dyn TableSource>,
    scope: Arc<DiffScope>,
    config: EngineConfig,
    sink: Arc<dyn DiffSink>,
    progress: Arc<dyn ProgressReporter>,
}

impl DiffEngine {
    pub fn new(
        left: Arc<dyn TableSource>,
        right: Arc<dyn TableSource>,
        scope: DiffScope,
        config: EngineConfig,
        sink: Arc<dyn DiffSink>,
    ) -> Self {
        Self {
            left,
            right,
            scope: Arc::new(scope),
            config,
            sink,
            progress: Arc::new(NoProgress),
        }
    }

    /// Set the progress reporter.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Compare one segment without persisting anything.
    pub async fn compare_segment(&self, segment: Segment) -> Result<SegmentOutcome> {
        let checksums =
            compare_checksums(&*self.left, &*self.right, &self.scope, segment)
                .await?;

        if checksums.matches() {
            debug!("Segment {} identical (checksum {})", segment, checksums.left);
            return Ok(SegmentOutcome::Identical {
                checksum: checksums.left,
            });
        }

        let diffs = diff_rows(&*self.left, &*self.right, &self.scope, segment).await?;
        warn!(
            "Segment {} differs (checksum {} vs {}): {} row diffs",
            segment,
            checksums.left,
            checksums.right,
            diffs.len()
        );

        Ok(SegmentOutcome::Differs {
            left_checksum: checksums.left,
            right_checksum: checksums.right,
            diffs,
        })
    }

    /// Run the comparison to completion.
    ///
    /// Returns the first worker error if any worker failed, or
    /// [`DiffError::Cancelled`] if `cancel` fired before every segment was
    /// compared.
    pub async fn run(&self, cancel: CancellationToken) -> Result<DiffSummary> {
        let EngineConfig {
            from,
            to,
            step,
            workers,
        } = self.config;
        if step <= 0 {
            return Err(DiffError::Config(format!(
                "segment step must be at least 1, got {}",
                step
            )));
        }
        let workers = workers.max(1);

        let segments = segments(from, to, step);
        let mut summary = DiffSummary {
            segments_total: segments.len(),
            ..Default::default()
        };

        info!(
            "Diffing {} vs {}: {} segments over [{}, {}) with {} workers",
            self.left.table(),
            self.right.table(),
            segments.len(),
            from,
            to,
            workers
        );
        self.progress.start(segments.len());

        if segments.is_empty() {
            self.progress.finish(&summary);
            return Ok(summary);
        }

        let run_cancel = cancel.child_token();
        let (task_tx, task_rx) =
            async_channel::bounded::<Segment>(workers.saturating_mul(2));

        // The producer owns the only sender; the queue closes when it returns.
        let producer_cancel = run_cancel.clone();
        let producer = tokio::spawn(async move {
            for segment in segments {
                tokio::select! {
                    biased;
                    _ = producer_cancel.cancelled() => break,
                    sent = task_tx.send(segment) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let engine = self.clone();
            let task_rx = task_rx.clone();
            let cancel = run_cancel.clone();
            pool.spawn(async move { engine.worker_loop(worker_id, task_rx, cancel).await });
        }
        drop(task_rx);

        let mut first_error: Option<DiffError> = None;
        while let Some(joined) = pool.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(DiffError::Worker(e.to_string())),
            };

            match result {
                Ok(worker_summary) => summary.merge(&worker_summary),
                Err(e) => {
                    if first_error.is_none() {
                        error!("Worker failed, cancelling run: {}", e);
                        first_error = Some(e);
                    } else {
                        debug!("Additional worker error after cancellation: {}", e);
                    }
                    run_cancel.cancel();
                }
            }
        }

        if let Err(e) = producer.await {
            if first_error.is_none() {
                first_error = Some(DiffError::Worker(format!("segment producer failed: {}", e)));
            }
        }

        self.progress.finish(&summary);

        if let Some(e) = first_error {
            return Err(e);
        }
        if summary.segments_completed < summary.segments_total {
            warn!(
                "Run cancelled after {}/{} segments",
                summary.segments_completed, summary.segments_total
            );
            return Err(DiffError::Cancelled);
        }

        info!(
            "Diff complete: {} segments ({} identical, {} differing), {} row diffs",
            summary.segments_completed,
            summary.segments_identical,
            summary.segments_differing,
            summary.rows_differing
        );
        Ok(summary)
    }

    async fn worker_loop(
        self,
        worker_id: usize,
        tasks: async_channel::Receiver<Segment>,
        cancel: CancellationToken,
    ) -> Result<DiffSummary> {
        let mut summary = DiffSummary::default();

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let segment = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = tasks.recv() => match next {
                    Ok(segment) => segment,
                    Err(_) => break,
                },
            };

            let outcome = self.compare_segment(segment).await?;
            if let SegmentOutcome::Differs { diffs, .. } = &outcome {
                for diff in diffs {
                    self.sink.write(diff).await?;
                    summary.add_diff(diff);
                }
            }
            summary.add_segment(outcome.is_identical());
            self.progress.segment_done(segment, &outcome);
        }

        debug!(
            "Worker {} exiting after {} segments",
            worker_id, summary.segments_completed
        );
        Ok(summary)
    }
}
