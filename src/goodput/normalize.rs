//! Timeline normalization: job filter, canonical order, proxy anchor, dedup

use super::event::{timeline_order, Event, EventType};

/// Build the canonical timeline for one job
///
/// Steps:
/// 1. keep only events of `job_name`; without one, the job of the
///    earliest event in timeline order is used (no filtering when that
///    event has no job name)
/// 2. sort by `(timestamp, kind rank)`
/// 3. anchor the timeline with a proxy USER_SCHEDULED copy of the earliest
///    event when it is not already USER_SCHEDULED
/// 4. collapse runs of adjacent JOB_STARTED or JOB_TERMINATED events to
///    their last member
///
/// The result is a fixed point: normalizing it again changes nothing.
pub fn normalize(events: &[Event], job_name: Option<&str>) -> Vec<Event> {
    if events.is_empty() {
        return Vec::new();
    }

    let job_name: Option<String> = match job_name {
        Some(name) => Some(name.to_string()),
        None => events
            .iter()
            .min_by(|a, b| timeline_order(a, b))
            .and_then(|first| first.job_name.clone()),
    };

    let mut timeline: Vec<Event> = match &job_name {
        Some(name) => events
            .iter()
            .filter(|e| e.job_name.as_deref() == Some(name.as_str()))
            .cloned()
            .collect(),
        None => events.to_vec(),
    };

    if timeline.is_empty() {
        tracing::warn!(job_name = ?job_name, "No events found for job");
        return timeline;
    }

    timeline.sort_by(timeline_order);

    if timeline[0].event_type != EventType::UserScheduled {
        let proxy = timeline[0].to_proxy_scheduled();
        tracing::debug!(timestamp = %proxy.timestamp, "Inserting proxy user_scheduled event");
        timeline.push(proxy);
        timeline.sort_by(timeline_order);
    }

    dedup_lifecycle(timeline)
}

/// Keep only the last of each run of adjacent JOB_STARTED / JOB_TERMINATED
fn dedup_lifecycle(timeline: Vec<Event>) -> Vec<Event> {
    let mut deduped: Vec<Event> = Vec::with_capacity(timeline.len());

    for event in timeline {
        let collapses = matches!(
            event.event_type,
            EventType::JobStarted | EventType::JobTerminated
        );
        if collapses
            && deduped
                .last()
                .is_some_and(|prev| prev.event_type == event.event_type)
        {
            deduped.pop();
        }
        deduped.push(event);
    }

    deduped
}

/// Whether `timeline` satisfies the canonical ordering and dedup invariants
pub fn is_canonical(timeline: &[Event]) -> bool {
    timeline.windows(2).all(|pair| {
        let ordered = timeline_order(&pair[0], &pair[1]) != std::cmp::Ordering::Greater;
        let duplicate = pair[0].event_type == pair[1].event_type
            && matches!(
                pair[1].event_type,
                EventType::JobStarted | EventType::JobTerminated
            );
        ordered && !duplicate
    })
}
