//! Event sources
//!
//! The calculator only needs a flat event list; where it comes from is
//! behind [`EventSource`]. The local source reads the tracker's
//! newline-delimited JSON file.

use super::event::Event;
use super::{GoodputError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Anything that can produce a job's raw goodput events
pub trait EventSource {
    /// Load every available event, sorted by raw timestamp
    fn load_events(&self) -> Result<Vec<Event>>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// Events appended by the tracker to a local NDJSON file
#[derive(Debug, Clone)]
pub struct FileEventSource {
    path: PathBuf,
}

impl FileEventSource {
    /// Create a source reading the NDJSON file at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        tracing::info!(path = %path.display(), "Using file-based tracking");
        Self { path }
    }

    /// Path of the event log
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for FileEventSource {
    fn load_events(&self) -> Result<Vec<Event>> {
        let file = File::open(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                GoodputError::FileNotFound(self.path.display().to_string())
            } else {
                GoodputError::Io {
                    path: self.path.display().to_string(),
                    source,
                }
            }
        })?;

        let mut events = parse_event_lines(BufReader::new(file)).map_err(|source| {
            GoodputError::Io {
                path: self.path.display().to_string(),
                source,
            }
        })?;

        sort_by_timestamp(&mut events);
        tracing::info!(count = events.len(), "Loaded events");
        Ok(events)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Parse NDJSON events, skipping blank and malformed lines
pub fn parse_event_lines<R: BufRead>(reader: R) -> std::io::Result<Vec<Event>> {
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Event>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!(line_number = index + 1, line = trimmed, error = %e, "Failed to parse log line");
            }
        }
    }

    Ok(events)
}

/// Stable sort by the raw timestamp string
pub fn sort_by_timestamp(events: &mut [Event]) {
    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}
