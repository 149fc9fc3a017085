//! Per-file checkpoint write marker pairing

use super::patterns::{LogPatterns, RankId};
use super::source::FileFailure;
use super::{CheckpointError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;

/// One matched write-start / write-end pair for a single process and step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointWriteRecord {
    pub global_rank: u32,
    pub local_rank: u32,
    pub checkpoint_step: String,
    /// Unix seconds
    pub start_time: f64,
    /// Unix seconds
    pub end_time: f64,
    pub checkpoint_write_duration: f64,
}

/// Marker state for one step key. A missing entry means no start seen yet.
#[derive(Debug, Clone, Copy)]
enum StepState {
    StartSeen { start_time: f64 },
    Complete,
}

/// Pairs write markers within one process log
#[derive(Debug, Clone, Copy)]
pub struct CheckpointLogParser<'a> {
    patterns: &'a LogPatterns,
    warn_on_duplicates: bool,
}

impl<'a> CheckpointLogParser<'a> {
    /// Create a parser over shared compiled patterns
    pub fn new(patterns: &'a LogPatterns, warn_on_duplicates: bool) -> Self {
        Self {
            patterns,
            warn_on_duplicates,
        }
    }

    /// Parse a log file's content
    ///
    /// `file_name` must follow the `*globalrank-<n>_localrank-<n>*`
    /// convention; the ranks label every record. An end marker for a step
    /// that never started aborts the whole file with
    /// [`CheckpointError::OutOfOrder`].
    pub fn parse<R: BufRead>(
        &self,
        file_name: &str,
        reader: R,
    ) -> Result<Vec<CheckpointWriteRecord>> {
        let rank = self.patterns.rank_from_file_name(file_name)?;
        tracing::info!(
            file = file_name,
            global_rank = rank.global_rank,
            local_rank = rank.local_rank,
            "Analyzing checkpoint log"
        );

        let mut states: HashMap<String, StepState> = HashMap::new();
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|source| CheckpointError::Io {
                path: file_name.to_string(),
                source,
            })?;

            if let Some(start) = self.patterns.match_write_start(&line) {
                if states.contains_key(&start.step) {
                    if self.warn_on_duplicates {
                        tracing::warn!(
                            step = %start.step,
                            file = file_name,
                            "Duplicate checkpoint write start; keeping the first occurrence"
                        );
                    }
                    continue;
                }

                let start_time = match start.start_time {
                    Some(t) => t,
                    None => match self.patterns.line_timestamp(&line) {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::warn!(file = file_name, error = %e, "Skipping write start line");
                            continue;
                        }
                    },
                };

                states.insert(start.step, StepState::StartSeen { start_time });
                continue;
            }

            if let Some(end) = self.patterns.match_write_end(&line) {
                let start_time = match states.get(&end.step) {
                    None => {
                        return Err(CheckpointError::OutOfOrder {
                            step: end.step,
                            file: file_name.to_string(),
                        })
                    }
                    Some(StepState::Complete) => {
                        if self.warn_on_duplicates {
                            tracing::warn!(
                                step = %end.step,
                                file = file_name,
                                "Duplicate checkpoint write end; keeping the first occurrence"
                            );
                        }
                        continue;
                    }
                    Some(StepState::StartSeen { start_time }) => *start_time,
                };

                let end_time = match self.patterns.line_timestamp(&line) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(file = file_name, error = %e, "Skipping write end line");
                        continue;
                    }
                };

                records.push(make_record(rank, end.step.clone(), start_time, end_time));
                states.insert(end.step, StepState::Complete);
            }
        }

        Ok(records)
    }

    /// Parse in-memory log content
    pub fn parse_str(&self, file_name: &str, content: &str) -> Result<Vec<CheckpointWriteRecord>> {
        self.parse(file_name, content.as_bytes())
    }

    /// Parse a file, isolating failures
    ///
    /// `reader` is the outcome of opening the file, so open errors are
    /// isolated the same way. Any error is logged and comes back as a
    /// [`FileFailure`]; the file then contributes no records.
    pub fn parse_isolated<R: BufRead>(
        &self,
        file_name: &str,
        reader: Result<R>,
    ) -> std::result::Result<Vec<CheckpointWriteRecord>, FileFailure> {
        reader
            .and_then(|reader| self.parse(file_name, reader))
            .map_err(|e| {
                tracing::error!(file = file_name, error = %e, "Failed to process checkpoint log");
                FileFailure::new(file_name, &e)
            })
    }
}

fn make_record(rank: RankId, step: String, start_time: f64, end_time: f64) -> CheckpointWriteRecord {
    CheckpointWriteRecord {
        global_rank: rank.global_rank,
        local_rank: rank.local_rank,
        checkpoint_step: step,
        start_time,
        end_time,
        checkpoint_write_duration: end_time - start_time,
    }
}
