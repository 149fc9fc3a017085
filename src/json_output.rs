//! JSON output format for checkpoint and goodput reports
//!
//! Both documents carry a `version` and a `format` identifier so that
//! downstream tooling can detect schema changes.

use crate::checkpoint::{CheckpointReport, FileFailure, StepDuration, StepDurations};
use crate::goodput::GoodputMetrics;
use crate::stats::SummaryStats;
use serde::{Deserialize, Serialize};

pub const CHECKPOINT_FORMAT: &str = "goodput-checkpoint-json-v1";
pub const GOODPUT_FORMAT: &str = "goodput-metrics-json-v1";

/// Run-level counts for a checkpoint analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonCheckpointSummary {
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub records: usize,
    pub skipped_entries: usize,
    /// Absent when no step produced a duration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_duration: Option<SummaryStats>,
}

/// Root JSON document for `goodput checkpoint`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointJsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub steps: Vec<StepDuration>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<FileFailure>,
    pub summary: JsonCheckpointSummary,
}

impl CheckpointJsonOutput {
    /// Create an empty output
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: CHECKPOINT_FORMAT.to_string(),
            steps: Vec::new(),
            failures: Vec::new(),
            summary: JsonCheckpointSummary::default(),
        }
    }

    /// Build from a full store analysis
    pub fn from_report(report: &CheckpointReport) -> Self {
        let mut output = Self::from_durations(&report.durations);
        output.failures = report.failures.clone();
        output.summary.files_analyzed = report.files_analyzed;
        output.summary.files_failed = report.failures.len();
        output.summary.records = report.records.len();
        output
    }

    /// Build from aggregated durations alone
    pub fn from_durations(durations: &StepDurations) -> Self {
        let mut output = Self::new();
        output.steps = durations.steps.clone();
        output.summary.skipped_entries = durations.skipped_entries;
        output.summary.write_duration = durations.summary.clone();
        output
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for CheckpointJsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Root JSON document for `goodput calculate`, also used for `--export`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodputJsonOutput {
    pub version: String,
    pub format: String,
    pub job_name: String,
    /// Whether the reference step time was supplied
    pub reference_step_time: Option<f64>,
    pub metrics: GoodputMetrics,
}

impl GoodputJsonOutput {
    /// Wrap metrics for `job_name`
    pub fn new(job_name: &str, reference_step_time: Option<f64>, metrics: GoodputMetrics) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: GOODPUT_FORMAT.to_string(),
            job_name: job_name.to_string(),
            reference_step_time,
            metrics,
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
