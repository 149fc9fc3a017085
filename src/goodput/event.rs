//! Lifecycle events and their canonical ordering

use super::{GoodputError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind of lifecycle transition recorded by the tracker
///
/// Kinds outside the six known ones are preserved verbatim and sort after
/// every known kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    UserScheduled,
    JobStarted,
    CheckpointLoaded,
    CheckpointSaved,
    UserTerminated,
    JobTerminated,
    Other(String),
}

impl EventType {
    /// Wire name (`job_started`, ...)
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserScheduled => "user_scheduled",
            Self::JobStarted => "job_started",
            Self::CheckpointLoaded => "checkpoint_loaded",
            Self::CheckpointSaved => "checkpoint_saved",
            Self::UserTerminated => "user_terminated",
            Self::JobTerminated => "job_terminated",
            Self::Other(s) => s,
        }
    }

    /// Position in the timeline tie-break order
    pub fn rank(&self) -> usize {
        match self {
            Self::UserScheduled => 0,
            Self::JobStarted => 1,
            Self::CheckpointLoaded => 2,
            Self::CheckpointSaved => 3,
            Self::UserTerminated => 4,
            Self::JobTerminated => 5,
            Self::Other(_) => usize::MAX,
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user_scheduled" => Self::UserScheduled,
            "job_started" => Self::JobStarted,
            "checkpoint_loaded" => Self::CheckpointLoaded,
            "checkpoint_saved" => Self::CheckpointSaved,
            "user_terminated" => Self::UserTerminated,
            "job_terminated" => Self::JobTerminated,
            _ => Self::Other(s),
        }
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One goodput event as written by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// ISO-8601 timestamp
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,

    pub event_type: EventType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,

    /// Set only on synthesized USER_SCHEDULED anchors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_proxy: Option<bool>,

    /// Any further fields the tracker attached
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    /// Create an event without a step
    pub fn new(timestamp: impl Into<String>, job_name: Option<&str>, event_type: EventType) -> Self {
        Self {
            timestamp: timestamp.into(),
            job_name: job_name.map(str::to_string),
            event_type,
            step: None,
            is_proxy: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Attach a checkpoint step
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Proxy copy of this event, re-labelled as USER_SCHEDULED
    pub fn to_proxy_scheduled(&self) -> Self {
        let mut proxy = self.clone();
        proxy.event_type = EventType::UserScheduled;
        proxy.is_proxy = Some(true);
        proxy
    }

    /// Whether this event carries the proxy marker at all
    pub fn has_proxy_marker(&self) -> bool {
        self.is_proxy.is_some()
    }

    /// Parse the event timestamp as UTC
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Canonical timeline order: timestamp string, then event kind rank
///
/// ISO-8601 timestamps written in one format sort lexically in
/// chronological order.
pub fn timeline_order(a: &Event, b: &Event) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.event_type.rank().cmp(&b.event_type.rank()))
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp; values without an offset are taken as UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(GoodputError::InvalidTimestamp {
        value: value.to_string(),
        reason: "expected ISO-8601 date and time".to_string(),
    })
}

/// Seconds from `start` to `end`, with sub-second precision
pub fn seconds_between(start: &DateTime<Utc>, end: &DateTime<Utc>) -> f64 {
    let delta = *end - *start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
