//! Goodput calculation from lifecycle events
//!
//! A training job records lifecycle events (scheduled, started, checkpoint
//! loaded/saved, terminated) through [`EventRecorder`]. Goodput is the
//! share of wall-clock runtime spent on useful training steps:
//!
//! ```text
//! goodput % = (max saved step - min loaded step) * reference step time
//!             / (last event - first event) * 100
//! ```
//!
//! Events are loaded from an [`EventSource`] (a local NDJSON file or Cloud
//! Logging), put into canonical order by [`normalize`], then measured by
//! [`calculate_goodput`].

mod calculator;
mod cloud_logging;
mod event;
mod loader;
mod normalize;
mod tracker;

pub use calculator::{calculate_goodput, GoodputCalculator, GoodputMetrics, NO_EVENTS};
#[cfg(feature = "cloud-logging")]
pub use cloud_logging::{AccessToken, AdcTokenProvider, Credentials};
pub use cloud_logging::{
    CloudLoggingEventSource, EntriesPage, HttpLogEntriesClient, LogEntriesClient, LogEntry,
    LOGGING_READ_SCOPE, PROJECT_ENV_VARS, TOKEN_ENV_VARS,
};
pub use event::{parse_timestamp, seconds_between, timeline_order, Event, EventType};
pub use loader::{parse_event_lines, sort_by_timestamp, EventSource, FileEventSource};
pub use normalize::{is_canonical, normalize};
pub use tracker::{
    job_name_from_env, log_name_for, log_path_for, EventRecorder, DEFAULT_JOB_NAME,
    JOB_IDENTIFIER_ENV,
};

use thiserror::Error;

/// Errors for goodput event loading and recording
#[derive(Error, Debug)]
pub enum GoodputError {
    #[error("Log file not found: {0}")]
    FileNotFound(String),

    #[error("Cloud Logging credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    #[error("Log query failed: {0}")]
    Query(String),

    #[error("Invalid timestamp {value}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Cloud Logging support not compiled in. Enable the 'cloud-logging' feature.")]
    RemoteUnsupported,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GoodputError>;
