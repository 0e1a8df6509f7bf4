//! Delete terminal tasks (and their PVCs) after a retention window (§4.13).

use crate::defaults_cache::RetentionDefaults;
use chrono::{DateTime, Utc};
use hortator_core::{constants, parse_duration, Phase};
use std::time::Duration;

/// The retention window for a terminal phase, honoring a per-task annotation
/// override before falling back to the cluster default for that phase
/// (others inherit Completed's window, §4.13).
pub fn retention_window(
    defaults: &RetentionDefaults,
    phase: Phase,
    annotation_override: Option<&str>,
) -> Duration {
    if let Some(raw) = annotation_override {
        if let Ok(parsed) = parse_duration(raw) {
            return parsed;
        }
    }
    let raw = match phase {
        Phase::Failed => &defaults.failed,
        Phase::Cancelled => &defaults.cancelled,
        _ => &defaults.completed,
    };
    parse_duration(raw).unwrap_or(Duration::from_secs(7 * 24 * 3600))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcAction {
    /// Not yet eligible; requeue after the remaining duration.
    RequeueAfter(std::time::Duration),
    /// Delete the PVC (unless retained) and then the task.
    Delete,
}

/// Decide the GC action for a terminal task (§4.13). `retain` exempts the
/// task entirely by returning the longest practical requeue.
pub fn decide(
    completed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
    retain: bool,
) -> GcAction {
    if retain {
        return GcAction::RequeueAfter(Duration::from_secs(u64::MAX / 2));
    }
    let elapsed = (now - completed_at).to_std().unwrap_or(Duration::ZERO);
    if elapsed < window {
        GcAction::RequeueAfter(window - elapsed)
    } else {
        GcAction::Delete
    }
}

pub fn is_retain_exempt(annotations: &std::collections::BTreeMap<String, String>) -> bool {
    annotations
        .get(constants::ANNOTATION_RETAIN)
        .is_some_and(|v| v == "true")
}

#[cfg(test)]
#[path = "gc_tests.rs"]
mod tests;
