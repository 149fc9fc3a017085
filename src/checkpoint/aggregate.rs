//! Cross-process step aggregation
//!
//! A step's write duration is the span from the earliest start on any rank
//! to the latest end on any rank, not the per-rank duration.

use super::parser::CheckpointWriteRecord;
use crate::stats::{StatsError, SummaryStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A write-time entry as fed to aggregation
///
/// Entries parsed from logs are always complete. Entries loaded from an
/// exported record file may be missing fields and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteTimeEntry {
    pub global_rank: Option<u32>,
    pub local_rank: Option<u32>,
    pub checkpoint_step: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl From<&CheckpointWriteRecord> for WriteTimeEntry {
    fn from(record: &CheckpointWriteRecord) -> Self {
        Self {
            global_rank: Some(record.global_rank),
            local_rank: Some(record.local_rank),
            checkpoint_step: Some(record.checkpoint_step.clone()),
            start_time: Some(record.start_time),
            end_time: Some(record.end_time),
        }
    }
}

/// Decode an exported JSON list of write-time entries
///
/// The top level must be a JSON array. An element that does not decode as
/// an entry (wrong field types, not an object) is logged and kept as an
/// empty entry, so aggregation counts it as skipped instead of failing the
/// whole list.
pub fn entries_from_json(json: &str) -> serde_json::Result<Vec<WriteTimeEntry>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    Ok(values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(index, error = %e, "Skipping malformed write time entry");
                WriteTimeEntry::default()
            })
        })
        .collect())
}

/// Start and end times collected for one step across all ranks
#[derive(Debug, Clone, Default)]
struct StepInterval {
    start_times: Vec<f64>,
    end_times: Vec<f64>,
}

impl StepInterval {
    fn duration(&self) -> Option<(f64, f64)> {
        let start = self.start_times.iter().copied().reduce(f64::min)?;
        let end = self.end_times.iter().copied().reduce(f64::max)?;
        Some((start, end))
    }
}

/// Aggregated write duration for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDuration {
    pub checkpoint_step: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Number of rank records that reported this step
    pub ranks: usize,
}

/// Per-step durations plus their summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDurations {
    /// In order of first appearance
    pub steps: Vec<StepDuration>,
    /// Entries dropped for missing fields
    pub skipped_entries: usize,
    /// `None` when no step produced a duration
    pub summary: Option<SummaryStats>,
}

impl StepDurations {
    /// Per-step durations in step order
    pub fn durations(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.duration).collect()
    }

    /// Whether no step produced a duration
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Group entries by step and compute `max(end) - min(start)` per step
pub fn compute_write_duration_per_step<'a, I>(entries: I) -> StepDurations
where
    I: IntoIterator<Item = &'a WriteTimeEntry>,
{
    let mut order: Vec<String> = Vec::new();
    let mut intervals: HashMap<String, StepInterval> = HashMap::new();
    let mut skipped_entries = 0;

    for entry in entries {
        let (step, start, end) = match (&entry.checkpoint_step, entry.start_time, entry.end_time) {
            (Some(step), Some(start), Some(end)) if start.is_finite() && end.is_finite() => {
                (step, start, end)
            }
            _ => {
                tracing::warn!(
                    ?entry,
                    "Missing checkpoint step, start time, or end time in write times list"
                );
                skipped_entries += 1;
                continue;
            }
        };

        let interval = intervals.entry(step.clone()).or_insert_with(|| {
            order.push(step.clone());
            StepInterval::default()
        });
        interval.start_times.push(start);
        interval.end_times.push(end);
    }

    let steps: Vec<StepDuration> = order
        .into_iter()
        .filter_map(|step| {
            let interval = intervals.remove(&step)?;
            let (start_time, end_time) = interval.duration()?;
            Some(StepDuration {
                checkpoint_step: step,
                start_time,
                end_time,
                duration: end_time - start_time,
                ranks: interval.start_times.len(),
            })
        })
        .collect();

    let durations: Vec<f64> = steps.iter().map(|s| s.duration).collect();
    let summary = if durations.is_empty() {
        tracing::warn!("Write time list is empty, cannot process checkpoint write time results");
        None
    } else {
        match SummaryStats::from_values(&durations) {
            Ok(summary) => {
                if summary.stdev.is_none() {
                    let reason = StatsError::InsufficientData {
                        required: 2,
                        actual: summary.count,
                    };
                    tracing::warn!(%reason, "Write duration standard deviation not computable");
                }
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to summarize checkpoint write durations");
                None
            }
        }
    };

    StepDurations {
        steps,
        skipped_entries,
        summary,
    }
}
