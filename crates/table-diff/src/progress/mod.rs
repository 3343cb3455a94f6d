//! Progress reporting for diff runs.
//!
//! Workers call [`ProgressReporter::segment_done`] after each segment is fully
//! compared and its diffs persisted. Reporters are informational only.

use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::diff::{DiffSummary, Segment, SegmentOutcome};

/// Receives run progress events. Called concurrently from every worker.
pub trait ProgressReporter: Send + Sync {
    /// The run is about to process `total_segments` segments.
    fn start(&self, total_segments: usize);

    /// A segment finished.
    fn segment_done(&self, segment: Segment, outcome: &SegmentOutcome);

    /// The run ended (successfully or not).
    fn finish(&self, summary: &DiffSummary);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&self, _total_segments: usize) {}

    fn segment_done(&self, _segment: Segment, _outcome: &SegmentOutcome) {}

    fn finish(&self, _summary: &DiffSummary) {}
}

/// Snapshot of run progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub segments_total: usize,
    pub segments_completed: usize,
    pub segments_differing: usize,
    pub rows_differing: u64,
    pub percent: f64,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_segment: Option<Segment>,
}

/// Lock-free progress counters shared by all workers.
#[derive(Debug)]
pub struct ProgressTracker {
    segments_total: AtomicUsize,
    segments_completed: AtomicUsize,
    segments_differing: AtomicUsize,
    rows_differing: AtomicU64,
    start_time: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            segments_total: AtomicUsize::new(0),
            segments_completed: AtomicUsize::new(0),
            segments_differing: AtomicUsize::new(0),
            rows_differing: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn set_total(&self, total: usize) {
        self.segments_total.store(total, Ordering::Relaxed);
    }

    /// Count a finished segment and return the resulting snapshot.
    pub fn record(&self, segment: Segment, outcome: &SegmentOutcome) -> ProgressUpdate {
        if !outcome.is_identical() {
            self.segments_differing.fetch_add(1, Ordering::Relaxed);
        }
        self.rows_differing
            .fetch_add(outcome.diff_count() as u64, Ordering::Relaxed);
        let completed = self.segments_completed.fetch_add(1, Ordering::Relaxed) + 1;

        let mut update = self.snapshot();
        update.segments_completed = completed;
        update.percent = percent(completed, update.segments_total);
        update.last_segment = Some(segment);
        update
    }

    /// Current counters.
    pub fn snapshot(&self) -> ProgressUpdate {
        let total = self.segments_total.load(Ordering::Relaxed);
        let completed = self.segments_completed.load(Ordering::Relaxed);
        ProgressUpdate {
            segments_total: total,
            segments_completed: completed,
            segments_differing: self.segments_differing.load(Ordering::Relaxed),
            rows_differing: self.rows_differing.load(Ordering::Relaxed),
            percent: percent(completed, total),
            elapsed_seconds: self.elapsed().as_secs_f64(),
            last_segment: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        completed as f64 * 100.0 / total as f64
    }
}

/// Logs progress through `tracing` every `step_percent` percent.
#[derive(Debug)]
pub struct LogProgress {
    tracker: ProgressTracker,
    step_percent: usize,
    last_logged: AtomicUsize,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(10)
    }
}

impl LogProgress {
    pub fn new(step_percent: usize) -> Self {
        Self {
            tracker: ProgressTracker::new(),
            step_percent: step_percent.clamp(1, 100),
            last_logged: AtomicUsize::new(0),
        }
    }

    /// Whether this update crosses a new logging threshold.
    fn should_log(&self, update: &ProgressUpdate) -> bool {
        let bucket = update.percent as usize / self.step_percent;
        bucket > 0 && self.last_logged.fetch_max(bucket, Ordering::Relaxed) < bucket
    }
}

impl ProgressReporter for LogProgress {
    fn start(&self, total_segments: usize) {
        self.tracker.set_total(total_segments);
        info!("Comparing {} segments", total_segments);
    }

    fn segment_done(&self, segment: Segment, outcome: &SegmentOutcome) {
        let update = self.tracker.record(segment, outcome);
        if self.should_log(&update) {
            info!(
                "Progress: {}/{} segments ({:.0}%), {} differing, {} row diffs",
                update.segments_completed,
                update.segments_total,
                update.percent,
                update.segments_differing,
                update.rows_differing
            );
        }
    }

    fn finish(&self, summary: &DiffSummary) {
        info!(
            "Compared {}/{} segments in {:.1}s",
            summary.segments_completed,
            summary.segments_total,
            self.tracker.elapsed().as_secs_f64()
        );
    }
}

/// Writes one JSON [`ProgressUpdate`] per finished segment to stderr.
#[derive(Debug, Default)]
pub struct JsonProgress {
    tracker: ProgressTracker,
}

impl JsonProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, update: &ProgressUpdate) {
        if let Ok(line) = serde_json::to_string(update) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
        }
    }
}

impl ProgressReporter for JsonProgress {
    fn start(&self, total_segments: usize) {
        self.tracker.set_total(total_segments);
        self.emit(&self.tracker.snapshot());
    }

    fn segment_done(&self, segment: Segment, outcome: &SegmentOutcome) {
        let update = self.tracker.record(segment, outcome);
        self.emit(&update);
    }

    fn finish(&self, _summary: &DiffSummary) {}
}
