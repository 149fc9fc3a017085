//! Goodput metrics over a normalized timeline

use super::event::{seconds_between, Event, EventType};
use super::loader::EventSource;
use super::normalize::normalize;
use super::Result;
use serde::{Deserialize, Serialize};

/// Marker stored in [`GoodputMetrics::error`] when there is nothing to measure
pub const NO_EVENTS: &str = "No events found";

/// Derived goodput metrics for one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoodputMetrics {
    /// Set when no data was available; every numeric field is then zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_events: usize,
    pub job_started_count: usize,
    /// CHECKPOINT_LOADED events with a positive step
    pub checkpoints_loaded: usize,
    pub checkpoints_saved: usize,
    pub total_runtime_seconds: f64,
    pub effective_computation_time: f64,
    pub goodput_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_loaded_step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_saved_step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_diff: Option<i64>,
}

impl GoodputMetrics {
    /// The "no data" terminal result
    pub fn no_data() -> Self {
        Self {
            error: Some(NO_EVENTS.to_string()),
            ..Default::default()
        }
    }

    /// Whether the metrics were computed from at least one event
    pub fn has_data(&self) -> bool {
        self.error.is_none()
    }
}

/// Compute goodput metrics from a timeline
///
/// A timeline in which no event carries a proxy marker is treated as raw
/// and normalized first, using the job name of its first event.
/// Normalization never adds a second anchor, so passing an already
/// normalized timeline without a proxy is harmless.
///
/// # Example
/// ```
/// use goodput::goodput::{calculate_goodput, Event, EventType};
///
/// let events = vec![
///     Event::new("2025-01-01T00:00:00", Some("job"), EventType::UserScheduled),
///     Event::new("2025-01-01T00:00:10", Some("job"), EventType::CheckpointLoaded).with_step(0),
///     Event::new("2025-01-01T00:01:40", Some("job"), EventType::CheckpointSaved).with_step(45),
/// ];
/// let metrics = calculate_goodput(&events, Some(2.0));
/// assert_eq!(metrics.step_diff, Some(45));
/// assert!((metrics.goodput_percentage - 90.0).abs() < 1e-9);
/// ```
pub fn calculate_goodput(events: &[Event], reference_step_time: Option<f64>) -> GoodputMetrics {
    if events.is_empty() {
        return GoodputMetrics::no_data();
    }

    let normalized;
    let timeline: &[Event] = if events.iter().any(Event::has_proxy_marker) {
        events
    } else {
        normalized = normalize(events, events[0].job_name.as_deref());
        &normalized
    };

    if timeline.is_empty() {
        return GoodputMetrics::no_data();
    }

    let mut metrics = GoodputMetrics {
        total_events: timeline.len(),
        ..Default::default()
    };

    if let (Some(first), Some(last)) = (timeline.first(), timeline.last()) {
        match (first.parsed_timestamp(), last.parsed_timestamp()) {
            (Ok(start), Ok(end)) => metrics.total_runtime_seconds = seconds_between(&start, &end),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Cannot compute total runtime");
            }
        }
    }

    let mut min_loaded_step: Option<i64> = None;
    let mut max_saved_step: Option<i64> = None;

    for event in timeline {
        if let Err(e) = event.parsed_timestamp() {
            tracing::warn!(?event, error = %e, "Failed to process event");
            continue;
        }

        match event.event_type {
            EventType::JobStarted => metrics.job_started_count += 1,
            EventType::CheckpointLoaded => {
                let Some(step) = event.step else {
                    tracing::warn!(?event, "Checkpoint event without a step");
                    continue;
                };
                if step > 0 {
                    metrics.checkpoints_loaded += 1;
                }
                min_loaded_step = Some(min_loaded_step.map_or(step, |m| m.min(step)));
            }
            EventType::CheckpointSaved => {
                let Some(step) = event.step else {
                    tracing::warn!(?event, "Checkpoint event without a step");
                    continue;
                };
                metrics.checkpoints_saved += 1;
                max_saved_step = Some(max_saved_step.map_or(step, |m| m.max(step)));
            }
            _ => {}
        }
    }

    if let (Some(min_loaded), Some(max_saved)) = (min_loaded_step, max_saved_step) {
        if max_saved > 0 {
            metrics.min_loaded_step = Some(min_loaded);
            metrics.max_saved_step = Some(max_saved);

            let Some(step_diff) = max_saved.checked_sub(min_loaded) else {
                tracing::warn!(
                    min_loaded_step = min_loaded,
                    max_saved_step = max_saved,
                    "Step range overflows; skipping effective computation time"
                );
                return metrics;
            };
            metrics.step_diff = Some(step_diff);

            if let Some(step_time) = reference_step_time {
                if step_diff > 0 {
                    let effective_time = step_diff as f64 * step_time;
                    metrics.effective_computation_time = effective_time;
                    if metrics.total_runtime_seconds > 0.0 {
                        metrics.goodput_percentage =
                            effective_time / metrics.total_runtime_seconds * 100.0;
                    }
                }
            }
        }
    }

    metrics
}

/// Load, normalize and measure one job's events
pub struct GoodputCalculator {
    job_name: String,
    source: Box<dyn EventSource>,
}

impl GoodputCalculator {
    /// Create a calculator for `job_name` reading from `source`
    pub fn new(job_name: impl Into<String>, source: Box<dyn EventSource>) -> Self {
        Self {
            job_name: job_name.into(),
            source,
        }
    }

    /// Job whose events are measured
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Load the job's canonical timeline from the event source
    pub fn timeline(&self) -> Result<Vec<Event>> {
        let events = self.source.load_events()?;
        tracing::info!(count = events.len(), "Loaded events");
        Ok(normalize(&events, Some(&self.job_name)))
    }

    /// Load the timeline and compute its metrics
    pub fn calculate(&self, reference_step_time: Option<f64>) -> Result<GoodputMetrics> {
        let timeline = self.timeline()?;
        Ok(calculate_goodput(&timeline, reference_step_time))
    }
}
