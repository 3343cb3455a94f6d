//! table-diff CLI - segmented checksum diff of two MySQL tables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use table_diff::{Config, DiffError, Differ, JsonProgress, LogProgress, ProgressReporter, Side};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "table-diff")]
#[command(about = "Find differing rows between two MySQL tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "diff.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the two tables and write differing rows to the output file
    Run {
        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,

        /// Override output file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Dry run: resolve and show the plan without comparing data
        #[arg(long)]
        dry_run: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), DiffError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            workers,
            output,
            dry_run,
        } => {
            // Apply overrides
            if let Some(w) = workers {
                config.concurrency.workers = Some(w);
            }
            if let Some(path) = output {
                config.output.file = Some(path);
            }
            config.validate()?;

            let progress: Arc<dyn ProgressReporter> = if cli.progress {
                Arc::new(JsonProgress::new())
            } else {
                Arc::new(LogProgress::default())
            };
            let differ = Differ::new(config).await?.with_progress(progress);

            if dry_run {
                let plan = differ.plan().clone();
                differ.close().await;

                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    println!("\nDry run plan:");
                    println!("  Left table: {}", plan.left_table);
                    println!("  Right table: {}", plan.right_table);
                    println!("  Primary key: {}", plan.primary_key);
                    println!("  Columns: {}", plan.diff_columns.join(", "));
                    println!("  Filter: {}", plan.filter);
                    println!("  Key range: [{}, {})", plan.from, plan.to);
                    println!("  Segments: {} of {} keys", plan.segments, plan.step);
                    println!("  Workers: {}", plan.workers);
                    println!("  Output: {}", plan.output_file.display());
                }
                return Ok(());
            }

            let cancel_token = setup_signal_handler();
            let report = differ.run(cancel_token).await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                let summary = &report.summary;
                println!("\nDiff completed!");
                println!("  Run ID: {}", report.run_id);
                println!("  Status: {}", report.status);
                println!("  Duration: {:.2}s", report.duration_seconds);
                println!(
                    "  Segments: {} ({} identical, {} differing)",
                    summary.segments_completed, summary.segments_identical, summary.segments_differing
                );
                println!(
                    "  Row diffs: {} ({} left only, {} right only, {} mismatched)",
                    summary.rows_differing,
                    summary.rows_left_only,
                    summary.rows_right_only,
                    summary.rows_mismatched
                );
                println!("  Output: {}", report.output_file.display());
            }
        }

        Commands::HealthCheck => {
            let result = Differ::health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Left ({}): {} ({}ms)",
                    config.left.location(),
                    if result.left_connected { "OK" } else { "FAILED" },
                    result.left_latency_ms
                );
                if let Some(ref err) = result.left_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Right ({}): {} ({}ms)",
                    config.right.location(),
                    if result.right_connected { "OK" } else { "FAILED" },
                    result.right_latency_ms
                );
                if let Some(ref err) = result.right_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.left_connected {
                return Err(DiffError::connection(Side::Left, "health check failed"));
            }
            if !result.right_connected {
                return Err(DiffError::connection(Side::Right, "health check failed"));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let debug_env = std::env::var("DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);

    let level = if debug_env {
        Level::DEBUG
    } else {
        match verbosity.to_lowercase().as_str() {
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the run on SIGINT (Ctrl-C) or SIGTERM. Workers finish the segment
/// in hand and stop.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to install {} handler: {}", name, e);
                    return;
                }
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Finishing in-flight segments...", name);
            token.cancel();
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
            return;
        }
        eprintln!("\nReceived Ctrl-C. Finishing in-flight segments...");
        token.cancel();
    });

    cancel_token
}
