//! Trace-event taxonomy emitted from reconcile handlers (§4.14).
//!
//! Mirrors the Kubernetes `Event` object the substrate writes, but is
//! constructed here so handlers stay decoupled from the substrate's event
//! plumbing and so the taxonomy lives in one place.

use hortator_substrate::EventType;
use serde::{Deserialize, Serialize};

/// One entry in the fixed taxonomy from §4.14. Serializes as
/// `{"type": "task.completed", ...}`; unrecognized tags are not expected to
/// round-trip (the taxonomy is closed) but deserialization is provided for
/// log replay/testing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TraceEvent {
    #[serde(rename = "task.created")]
    TaskCreated { task: String },
    #[serde(rename = "task.started")]
    TaskStarted { task: String },
    #[serde(rename = "task.completed")]
    TaskCompleted { task: String },
    #[serde(rename = "task.completed.cached")]
    TaskCompletedCached { task: String, cache_key_prefix: String },
    #[serde(rename = "task.failed")]
    TaskFailed { task: String, reason: String },
    #[serde(rename = "task.cancelled")]
    TaskCancelled { task: String },
    #[serde(rename = "task.budget_exceeded")]
    TaskBudgetExceeded { task: String, reason: String },
    #[serde(rename = "task.retrying")]
    TaskRetrying { task: String, attempt: u32 },
    #[serde(rename = "task.waiting")]
    TaskWaiting { task: String, pending_children: u32 },
    #[serde(rename = "task.reincarnating")]
    TaskReincarnating { task: String },
    #[serde(rename = "task.deleted")]
    TaskDeleted { task: String },
    #[serde(rename = "task.garbage_collected")]
    TaskGarbageCollected { task: String },
    #[serde(rename = "health.stuck_detected")]
    HealthStuckDetected { task: String, score: f64 },
    #[serde(rename = "health.stuck_killed")]
    HealthStuckKilled { task: String, reason: String },
    #[serde(rename = "health.stuck_escalated")]
    HealthStuckEscalated { task: String, reason: String },
}

impl TraceEvent {
    /// The taxonomy tag, e.g. `"task.completed"`.
    pub fn name(&self) -> &'static str {
        match self {
            TraceEvent::TaskCreated { .. } => "task.created",
            TraceEvent::TaskStarted { .. } => "task.started",
            TraceEvent::TaskCompleted { .. } => "task.completed",
            TraceEvent::TaskCompletedCached { .. } => "task.completed.cached",
            TraceEvent::TaskFailed { .. } => "task.failed",
            TraceEvent::TaskCancelled { .. } => "task.cancelled",
            TraceEvent::TaskBudgetExceeded { .. } => "task.budget_exceeded",
            TraceEvent::TaskRetrying { .. } => "task.retrying",
            TraceEvent::TaskWaiting { .. } => "task.waiting",
            TraceEvent::TaskReincarnating { .. } => "task.reincarnating",
            TraceEvent::TaskDeleted { .. } => "task.deleted",
            TraceEvent::TaskGarbageCollected { .. } => "task.garbage_collected",
            TraceEvent::HealthStuckDetected { .. } => "health.stuck_detected",
            TraceEvent::HealthStuckKilled { .. } => "health.stuck_killed",
            TraceEvent::HealthStuckEscalated { .. } => "health.stuck_escalated",
        }
    }

    /// Whether this is a warning-level human-readable event, vs normal.
    pub fn event_type(&self) -> EventType {
        match self {
            TraceEvent::TaskFailed { .. }
            | TraceEvent::TaskBudgetExceeded { .. }
            | TraceEvent::HealthStuckDetected { .. }
            | TraceEvent::HealthStuckKilled { .. }
            | TraceEvent::HealthStuckEscalated { .. } => EventType::Warning,
            _ => EventType::Normal,
        }
    }

    /// A one-line human-readable summary suitable for the Kubernetes Event
    /// message field.
    pub fn message(&self) -> String {
        match self {
            TraceEvent::TaskCreated { task } => format!("task {task} admitted"),
            TraceEvent::TaskStarted { task } => format!("task {task} worker pod started"),
            TraceEvent::TaskCompleted { task } => format!("task {task} completed"),
            TraceEvent::TaskCompletedCached { task, cache_key_prefix } => {
                format!("task {task} completed from cache ({cache_key_prefix})")
            }
            TraceEvent::TaskFailed { task, reason } => format!("task {task} failed: {reason}"),
            TraceEvent::TaskCancelled { task } => format!("task {task} cancelled"),
            TraceEvent::TaskBudgetExceeded { task, reason } => {
                format!("task {task} budget exceeded: {reason}")
            }
            TraceEvent::TaskRetrying { task, attempt } => {
                format!("task {task} retrying (attempt {attempt})")
            }
            TraceEvent::TaskWaiting { task, pending_children } => {
                format!("task {task} waiting on {pending_children} child task(s)")
            }
            TraceEvent::TaskReincarnating { task } => {
                format!("task {task} reincarnating: all children reported in")
            }
            TraceEvent::TaskDeleted { task } => format!("task {task} deleted"),
            TraceEvent::TaskGarbageCollected { task } => {
                format!("task {task} garbage collected after retention window")
            }
            TraceEvent::HealthStuckDetected { task, score } => {
                format!("task {task} flagged stuck, score={score:.2}")
            }
            TraceEvent::HealthStuckKilled { task, reason } => {
                format!("task {task} killed as stuck: {reason}")
            }
            TraceEvent::HealthStuckEscalated { task, reason } => {
                format!("task {task} escalated as stuck: {reason}")
            }
        }
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
