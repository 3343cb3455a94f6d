//! Diff run coordinator.
//!
//! Connects both sides, resolves the plan, runs the engine against a
//! [`JsonLinesSink`], and reports the outcome.

use crate::config::{Config, DiffPlan};
use crate::diff::{DiffEngine, DiffSummary, EngineConfig};
use crate::error::Result;
use crate::progress::{NoProgress, ProgressReporter};
use crate::sink::{DiffSink, JsonLinesSink};
use crate::source::{MysqlSource, Side, TableSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Diff run coordinator.
pub struct Differ {
    config: Config,
    plan: DiffPlan,
    left: Arc<MysqlSource>,
    right: Arc<MysqlSource>,
    progress: Arc<dyn ProgressReporter>,
}

/// Result of a diff run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: "in_sync" or "differences_found".
    pub status: String,

    /// Fingerprint of the configuration used.
    pub config_hash: String,

    /// Left table.
    pub left_table: String,

    /// Right table.
    pub right_table: String,

    /// File the diff records were written to.
    pub output_file: PathBuf,

    /// Segment and row counters.
    pub summary: DiffSummary,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl DiffReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity of both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub left_connected: bool,
    pub left_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_error: Option<String>,
    pub right_connected: bool,
    pub right_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_error: Option<String>,
    pub healthy: bool,
}

struct SideHealth {
    connected: bool,
    latency_ms: u64,
    error: Option<String>,
}

impl Differ {
    /// Connect both sides and resolve the run plan.
    pub async fn new(config: Config) -> Result<Self> {
        let max_conns = config.concurrency.get_max_connections();
        let (left, right) = tokio::join!(
            MysqlSource::connect(Side::Left, &config.left, max_conns),
            MysqlSource::connect(Side::Right, &config.right, max_conns)
        );
        let (left, right) =
            connected_pair(left, right, |source: MysqlSource| async move {
                source.close().await
            })
            .await?;

        let plan = match config.resolve(&left, &right).await {
            Ok(plan) => plan,
            Err(e) => {
                left.close().await;
                right.close().await;
                return Err(e);
            }
        };

        info!(
            "Plan: key {} columns [{}] range [{}, {}) step {} ({} segments), {} workers",
            plan.primary_key,
            plan.diff_columns.join(", "),
            plan.from,
            plan.to,
            plan.step,
            plan.segments,
            plan.workers
        );

        Ok(Self {
            config,
            plan,
            left: Arc::new(left),
            right: Arc::new(right),
            progress: Arc::new(NoProgress),
        })
    }

    /// Set the progress reporter.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Resolved run plan.
    pub fn plan(&self) -> &DiffPlan {
        &self.plan
    }

    /// Release both connection pools.
    pub async fn close(&self) {
        self.left.close().await;
        self.right.close().await;
    }

    /// Try to connect to both sides and measure round-trip latency.
    ///
    /// Connection failures are reported in the result, not as errors.
    pub async fn health_check(config: &Config) -> HealthCheckResult {
        let (left, right) = tokio::join!(
            check_side(Side::Left, config),
            check_side(Side::Right, config)
        );

        HealthCheckResult {
            healthy: left.connected && right.connected,
            left_connected: left.connected,
            left_latency_ms: left.latency_ms,
            left_error: left.error,
            right_connected: right.connected,
            right_latency_ms: right.latency_ms,
            right_error: right.error,
        }
    }

    /// Run the diff.
    ///
    /// The output file is flushed and closed on every path, including
    /// failures; records written before a failure stay on disk.
    pub async fn run(self, cancel: CancellationToken) -> Result<DiffReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        info!("Starting diff run {}", run_id);

        let sink = match JsonLinesSink::create(&self.plan.output_file).await {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                self.close().await;
                return Err(e);
            }
        };

        let left: Arc<dyn TableSource> = self.left.clone();
        let right: Arc<dyn TableSource> = self.right.clone();
        let engine = DiffEngine::new(
            left,
            right,
            self.plan.scope(),
            EngineConfig {
                from: self.plan.from,
                to: self.plan.to,
                step: self.plan.step,
                workers: self.plan.workers,
            },
            sink.clone(),
        )
        .with_progress(self.progress.clone());

        let outcome = engine.run(cancel).await;
        let closed = sink.close().await;
        self.close().await;

        let summary = outcome?;
        closed?;

        let completed_at = Utc::now();
        let status = if summary.is_in_sync() {
            "in_sync"
        } else {
            warn!(
                "{} row diffs written to {}",
                summary.rows_differing,
                self.plan.output_file.display()
            );
            "differences_found"
        };

        Ok(DiffReport {
            run_id,
            status: status.to_string(),
            config_hash: self.config.hash(),
            left_table: self.plan.left_table.clone(),
            right_table: self.plan.right_table.clone(),
            output_file: self.plan.output_file.clone(),
            summary,
            started_at,
            completed_at,
            duration_seconds: start.elapsed().as_secs_f64(),
        })
    }
}

async fn check_side(side: Side, config: &Config) -> SideHealth {
    let table = match side {
        Side::Left => &config.left,
        Side::Right => &config.right,
    };

    let source = match MysqlSource::connect(side, table, 1).await {
        Ok(source) => source,
        Err(e) => {
            return SideHealth {
                connected: false,
                latency_ms: 0,
                error: Some(e.to_string()),
            }
        }
    };

    let health = match source.test_connection().await {
        Ok(latency) => SideHealth {
            connected: true,
            latency_ms: latency.as_millis() as u64,
            error: None,
        },
        Err(e) => SideHealth {
            connected: false,
            latency_ms: 0,
            error: Some(e.to_string()),
        },
    };
    source.close().await;
    health
}

/// Both connected sides, or the first error. A side that connected while
/// the other failed is closed before the error is returned.
async fn connected_pair<T, F, Fut>(left: Result<T>, right: Result<T>, close: F) -> Result<(T, T)>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
{
    match (left, right) {
        (Ok(left), Ok(right)) => Ok((left, right)),
        (Ok(left), Err(e)) => {
            close(left).await;
            Err(e)
        }
        (Err(e), Ok(right)) => {
            close(right).await;
            Err(e)
        }
        (Err(e), Err(_)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_to_json() {
        let now = Utc::now();
        let report = DiffReport {
            run_id: "run-1".to_string(),
            status: "differences_found".to_string(),
            config_hash: "abc".to_string(),
            left_table: "users".to_string(),
            right_table: "users_copy".to_string(),
            output_file: PathBuf::from("/tmp/out.diff"),
            summary: DiffSummary {
                segments_total: 3,
                segments_completed: 3,
                segments_identical: 2,
                segments_differing: 1,
                rows_differing: 2,
                rows_left_only: 1,
                rows_right_only: 0,
                rows_mismatched: 1,
            },
            started_at: now,
            completed_at: now,
            duration_seconds: 1.5,
        };

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "differences_found");
        assert_eq!(value["summary"]["rows_differing"], 2);
        assert_eq!(value["output_file"], "/tmp/out.diff");
    }

    #[test]
    fn test_health_result_skips_empty_errors() {
        let result = HealthCheckResult {
            left_connected: true,
            left_latency_ms: 3,
            left_error: None,
            right_connected: false,
            right_latency_ms: 0,
            right_error: Some("refused".to_string()),
            healthy: false,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("left_error").is_none());
        assert_eq!(json["right_error"], "refused");
    }

    #[tokio::test]
    async fn test_connected_side_closed_when_other_fails() {
        use crate::error::DiffError;
        use std::sync::Mutex;

        let closed = Mutex::new(Vec::new());
        let close = |name: &'static str| {
            closed.lock().unwrap().push(name);
            async {}
        };

        let err = connected_pair(Ok("left"), Err(DiffError::Config("right down".into())), close)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("right down"), "got: {}", err);
        assert_eq!(*closed.lock().unwrap(), vec!["left"]);

        closed.lock().unwrap().clear();
        let err = connected_pair(Err(DiffError::Config("left down".into())), Ok("right"), close)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("left down"), "got: {}", err);
        assert_eq!(*closed.lock().unwrap(), vec!["right"]);

        closed.lock().unwrap().clear();
        let pair = connected_pair(Ok("left"), Ok("right"), close).await.unwrap();
        assert_eq!(pair, ("left", "right"));
        assert!(closed.lock().unwrap().is_empty(), "nothing closed on success");
    }
}
