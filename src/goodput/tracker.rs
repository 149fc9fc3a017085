//! Event recording for training jobs
//!
//! Training code calls [`EventRecorder::record`] at lifecycle transitions.
//! Each call appends one JSON line to `<log_dir>/<job>-goodput.log`, the
//! same file [`FileEventSource`](super::FileEventSource) reads back.

use super::event::{Event, EventType};
use super::{GoodputError, Result};
use chrono::{SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable naming the job when none is given explicitly
pub const JOB_IDENTIFIER_ENV: &str = "JOB_IDENTIFIER";

pub const DEFAULT_JOB_NAME: &str = "training-job";

/// Log name (and file stem) for a job's goodput events
pub fn log_name_for(job_name: &str) -> String {
    format!("{}-goodput", job_name)
}

/// Local event log path for `job_name` under `log_dir`
pub fn log_path_for(log_dir: &Path, job_name: &str) -> PathBuf {
    log_dir.join(format!("{}.log", log_name_for(job_name)))
}

/// Job name from `JOB_IDENTIFIER`, falling back to [`DEFAULT_JOB_NAME`]
pub fn job_name_from_env() -> String {
    std::env::var(JOB_IDENTIFIER_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_JOB_NAME.to_string())
}

/// Appends lifecycle events for one job
#[derive(Debug, Clone)]
pub struct EventRecorder {
    job_name: String,
    path: PathBuf,
}

impl EventRecorder {
    /// Create a recorder appending to `<log_dir>/<job>-goodput.log`
    pub fn new(job_name: impl Into<String>, log_dir: impl AsRef<Path>) -> Self {
        let job_name = job_name.into();
        let path = log_path_for(log_dir.as_ref(), &job_name);
        Self { job_name, path }
    }

    /// Recorder for the job named by the environment
    pub fn from_env(log_dir: impl AsRef<Path>) -> Self {
        Self::new(job_name_from_env(), log_dir)
    }

    /// Job the recorded events are tagged with
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Log file events are appended to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event stamped with the current UTC time
    pub fn record(&self, event_type: EventType, step: Option<i64>) -> Result<Event> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut event = Event::new(timestamp, Some(&self.job_name), event_type);
        event.step = step;
        self.append(&event)?;
        Ok(event)
    }

    /// Append a prepared event verbatim
    pub fn append(&self, event: &Event) -> Result<()> {
        let io_err = |source: std::io::Error| GoodputError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(file, "{}", line).map_err(io_err)?;

        tracing::debug!(
            event_type = %event.event_type,
            step = ?event.step,
            path = %self.path.display(),
            "Recorded goodput event"
        );
        Ok(())
    }
}
