//! Error types for the diff library.

use crate::diff::Segment;
use crate::source::Side;
use thiserror::Error;

/// Exit code for configuration errors (invalid YAML, missing fields, bad columns).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when a database handle cannot be established.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for checksum, row-fetch, or introspection query failures.
pub const EXIT_QUERY_ERROR: u8 = 3;
/// Exit code for unparsable primary key values.
pub const EXIT_KEY_PARSE_ERROR: u8 = 4;
/// Exit code when a diff record cannot be persisted.
pub const EXIT_SINK_ERROR: u8 = 5;
/// Exit code when a worker task panicked.
pub const EXIT_WORKER_ERROR: u8 = 6;
/// Exit code for file I/O errors (e.g. config file not found).
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for runs interrupted by SIGINT/SIGTERM.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for diff operations.
#[derive(Error, Debug)]
pub enum DiffError {
    /// Configuration error (invalid YAML, missing fields, unknown columns, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A side's database handle could not be established.
    #[error("Connection error ({side} table): {message}")]
    Connection { side: Side, message: String },

    /// A query against one side failed.
    #[error("Query failed on {side} table{}: {message}", segment_suffix(.segment))]
    Query {
        side: Side,
        segment: Option<Segment>,
        message: String,
    },

    /// A fetched primary key value is not an integer.
    #[error("Cannot parse primary key {value:?} of {side} table as an integer in segment {segment}")]
    KeyParse {
        side: Side,
        segment: Segment,
        value: String,
    },

    /// A diff record could not be persisted.
    #[error("Failed to persist diff record: {0}")]
    Sink(String),

    /// A worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Diff run was cancelled (SIGINT, etc.)
    #[error("Diff run cancelled")]
    Cancelled,
}

impl DiffError {
    /// Create a Connection error for one side.
    pub fn connection(side: Side, message: impl std::fmt::Display) -> Self {
        DiffError::Connection {
            side,
            message: message.to_string(),
        }
    }

    /// Create a Query error for a segment query.
    pub fn query(side: Side, segment: Segment, message: impl std::fmt::Display) -> Self {
        DiffError::Query {
            side,
            segment: Some(segment),
            message: message.to_string(),
        }
    }

    /// Create a Query error for a query that is not bound to a segment
    /// (introspection, key bounds).
    pub fn introspection(side: Side, message: impl std::fmt::Display) -> Self {
        DiffError::Query {
            side,
            segment: None,
            message: message.to_string(),
        }
    }

    /// Create a Sink error.
    pub fn sink(message: impl std::fmt::Display) -> Self {
        DiffError::Sink(message.to_string())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DiffError::Config(_) | DiffError::Yaml(_) => EXIT_CONFIG_ERROR,
            DiffError::Connection { .. } => EXIT_CONNECTION_ERROR,
            DiffError::Query { .. } => EXIT_QUERY_ERROR,
            DiffError::KeyParse { .. } => EXIT_KEY_PARSE_ERROR,
            DiffError::Sink(_) | DiffError::Json(_) => EXIT_SINK_ERROR,
            DiffError::Worker(_) => EXIT_WORKER_ERROR,
            DiffError::Io(_) => EXIT_IO_ERROR,
            DiffError::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

fn segment_suffix(segment: &Option<Segment>) -> String {
    match segment {
        Some(segment) => format!(" for segment {}", segment),
        None => String::new(),
    }
}

/// Result type alias for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;
