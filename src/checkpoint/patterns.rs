//! Log line and file name patterns for checkpoint write markers

use super::{CheckpointError, Result};
use chrono::NaiveDateTime;
use regex::Regex;

/// Write-start marker: iteration and an optional embedded start time (seconds)
const WRITE_START: &str =
    r"Global Checkpoint Save : Rank: \d+ : Iteration: (\d+)(?: : Start time: (\d+(?:\.\d+)?)s)?";

/// Write-end marker: reported step and optional checkpoint path
const WRITE_END: &str = r"Async checkpoint save for step (\d+)(?: \(([^)]*)\))? finalized";

/// Iteration encoded in a checkpoint path (`.../step=24.ckpt`)
const PATH_STEP: &str = r"step=(\d+)";

/// Per-line log prefix clock
const LINE_TIMESTAMP: &str = r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})";

/// Process log file name carrying global and local rank
const RANK_FILE_NAME: &str = r"globalrank-(\d+)_localrank-(\d+)";

const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Global / local rank of the process that wrote a log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RankId {
    pub global_rank: u32,
    pub local_rank: u32,
}

/// A recognized write-start line
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStart {
    pub step: String,
    /// Embedded start time, when present and parseable
    pub start_time: Option<f64>,
}

/// A recognized write-end line
#[derive(Debug, Clone, PartialEq)]
pub struct WriteEnd {
    /// Iteration this end marker finalizes
    pub step: String,
    /// Step number as printed in the marker
    pub reported_step: String,
}

/// Compiled marker patterns, shared read-only across parser workers
#[derive(Debug, Clone)]
pub struct LogPatterns {
    write_start: Regex,
    write_end: Regex,
    path_step: Regex,
    line_timestamp: Regex,
    rank_file_name: Regex,
}

impl LogPatterns {
    /// Compile every marker pattern
    pub fn new() -> Result<Self> {
        Ok(Self {
            write_start: Regex::new(WRITE_START)?,
            write_end: Regex::new(WRITE_END)?,
            path_step: Regex::new(PATH_STEP)?,
            line_timestamp: Regex::new(LINE_TIMESTAMP)?,
            rank_file_name: Regex::new(RANK_FILE_NAME)?,
        })
    }

    /// Extract `(global_rank, local_rank)` from a log file name or path
    pub fn rank_from_file_name(&self, file_name: &str) -> Result<RankId> {
        let invalid = || CheckpointError::InvalidFileName {
            file: file_name.to_string(),
        };

        let caps = self.rank_file_name.captures(file_name).ok_or_else(invalid)?;
        let global_rank = caps[1].parse().map_err(|_| invalid())?;
        let local_rank = caps[2].parse().map_err(|_| invalid())?;

        Ok(RankId {
            global_rank,
            local_rank,
        })
    }

    /// Whether a file name follows the rank naming convention
    pub fn is_rank_file(&self, file_name: &str) -> bool {
        self.rank_file_name.is_match(file_name)
    }

    /// Match a write-start line
    ///
    /// `start_time` is `None` when the marker carries no embedded time; the
    /// parser then falls back to the line prefix clock.
    pub fn match_write_start(&self, line: &str) -> Option<WriteStart> {
        let caps = self.write_start.captures(line)?;
        Some(WriteStart {
            step: caps[1].to_string(),
            start_time: caps.get(2).and_then(|m| m.as_str().parse().ok()),
        })
    }

    /// Match a write-end line
    ///
    /// The marker's `step N` counts completed steps, so it finalizes
    /// iteration `N - 1`. A `step=<k>` in the checkpoint path wins when
    /// present.
    pub fn match_write_end(&self, line: &str) -> Option<WriteEnd> {
        let caps = self.write_end.captures(line)?;
        let reported_step = caps[1].to_string();

        let from_path = caps
            .get(2)
            .and_then(|path| self.path_step.captures(path.as_str()))
            .map(|c| c[1].to_string());

        let step = match from_path {
            Some(step) => step,
            None => match reported_step.parse::<u64>() {
                Ok(n) if n > 0 => (n - 1).to_string(),
                _ => reported_step.clone(),
            },
        };

        Some(WriteEnd {
            step,
            reported_step,
        })
    }

    /// Parse the `YYYY-MM-DD HH:MM:SS` line prefix as UTC unix seconds
    pub fn line_timestamp(&self, line: &str) -> Result<f64> {
        let caps =
            self.line_timestamp
                .captures(line)
                .ok_or_else(|| CheckpointError::MissingTimestamp {
                    line: line.trim_end().to_string(),
                })?;

        parse_line_timestamp(&caps[1])
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` value as UTC unix seconds
pub fn parse_line_timestamp(value: &str) -> Result<f64> {
    let parsed = NaiveDateTime::parse_from_str(value, LINE_TIMESTAMP_FORMAT).map_err(|e| {
        CheckpointError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(parsed.and_utc().timestamp() as f64)
}
