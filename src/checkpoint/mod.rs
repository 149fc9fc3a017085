//! Checkpoint write-duration analysis
//!
//! Per-process training logs carry an asynchronous checkpoint write-start
//! marker and a later finalization marker for every saved iteration. This
//! module pairs those markers per process, then folds all processes
//! together so that a step's write duration spans from the earliest start
//! to the latest end on any rank.
//!
//! Pipeline:
//! - [`LogStore`] lists and reads the log files
//! - [`CheckpointLogParser`] turns one file into [`CheckpointWriteRecord`]s
//! - [`analyze_store`] fans files out over a worker pool and joins them
//! - [`compute_write_duration_per_step`] aggregates across ranks

mod aggregate;
mod parser;
mod patterns;
mod source;

pub use aggregate::{
    compute_write_duration_per_step, entries_from_json, StepDuration, StepDurations,
    WriteTimeEntry,
};
pub use parser::{CheckpointLogParser, CheckpointWriteRecord};
pub use patterns::{parse_line_timestamp, LogPatterns, RankId, WriteEnd, WriteStart};
pub use source::{analyze_store, CheckpointReport, FileFailure, LocalLogStore, LogStore};

use thiserror::Error;

/// Errors for checkpoint log analysis
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Invalid file path: {file}. Valid pattern: *globalrank-[idx]_localrank-[idx]*")]
    InvalidFileName { file: String },

    #[error("Checkpoint write at step {step} has its end reported before its start in file {file}")]
    OutOfOrder { step: String, file: String },

    #[error("Failed to find a timestamp in line: {line}")]
    MissingTimestamp { line: String },

    #[error("Invalid timestamp {value}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Invalid log pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to build parser worker pool: {0}")]
    WorkerPool(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

#[cfg(test)]
mod tests;
