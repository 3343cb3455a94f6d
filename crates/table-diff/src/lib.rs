//! # table-diff
//!
//! Compares two MySQL tables sharing an integer primary key and writes every
//! differing row to a JSON Lines file.
//!
//! The key range is split into fixed-size segments processed by a pool of
//! workers:
//!
//! - **Checksum fast path**: per segment, both sides compute
//!   `SUM(CRC32(...))` over the diff columns; equal sums skip the segment
//! - **Row-level comparison**: on mismatch, rows are fetched from both sides
//!   and matched on the primary key
//! - **First-error cancellation**: any query or write failure stops the run
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_diff::{Config, Differ};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> table_diff::Result<()> {
//!     let config = Config::load("diff.yaml")?;
//!     let differ = Differ::new(config).await?;
//!     let report = differ.run(CancellationToken::new()).await?;
//!     println!("{} row diffs in {}", report.summary.rows_differing, report.output_file.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod sink;
pub mod source;

// Re-exports for convenient access
pub use config::{Config, DiffPlan, TableConfig};
pub use diff::{DiffEngine, DiffSummary, EngineConfig, Row, RowDiff, Segment, SegmentOutcome};
pub use error::{DiffError, Result};
pub use orchestrator::{DiffReport, Differ, HealthCheckResult};
pub use progress::{JsonProgress, LogProgress, NoProgress, ProgressReporter};
pub use sink::{DiffSink, JsonLinesSink};
pub use source::{DiffScope, MysqlSource, Side, TableSource};
