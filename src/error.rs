//! Error taxonomy for timeline computation
//!
//! Incomplete traces and cyclic containment are not errors: the span builder
//! skips the former and the root scorer gives the latter a zero contribution.
//! Everything that does reach this type means the caller gets no Timeline.

use thiserror::Error;

/// Errors surfaced by the timeline library
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Timeline computation failed: {0}")]
    Computation(String),

    #[error("Malformed trace event at line {line}: {message}")]
    Ingest { line: usize, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Timeline worker disconnected")]
    WorkerDisconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
