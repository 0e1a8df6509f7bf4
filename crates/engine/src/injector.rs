//! Child-result delivery and parent reincarnation (§4.12).

use hortator_core::constants;
use serde::{Deserialize, Serialize};

/// Payload written to `/inbox/child-results/<child>.json` in the parent's
/// PVC by the one-shot writer pod (§4.12).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildResultPayload {
    pub task_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Append `child` to `child_tasks` if absent, preserving insertion order.
pub fn record_child_task(child_tasks: &mut Vec<String>, child: &str) {
    if !child_tasks.iter().any(|c| c == child) {
        child_tasks.push(child.to_string());
    }
}

/// Remove `child` from `pending_children`; used both when a child first
/// spawns (admission appends it, §4.12 re-entry safety) and when it
/// terminates (notifyParent drains it).
pub fn remove_pending_child(pending_children: &mut Vec<String>, child: &str) {
    pending_children.retain(|c| c != child);
}

pub fn add_pending_child(pending_children: &mut Vec<String>, child: &str) {
    if !pending_children.iter().any(|c| c == child) {
        pending_children.push(child.to_string());
    }
}

/// A waiting parent whose `pendingChildren` just drained to empty should be
/// reincarnated: transitioned back to Pending so the next dispatcher cycle
/// creates a fresh worker pod (§4.12).
pub fn should_reincarnate(phase: hortator_core::Phase, pending_children: &[String]) -> bool {
    phase == hortator_core::Phase::Waiting && pending_children.is_empty()
}

/// Build the writer-pod name and the payload path it writes to inside the
/// parent's PVC (§4.6, §4.12).
pub fn writer_pod_target(parent_name: &str, child_name: &str) -> (String, String) {
    (
        constants::writer_pod_name(parent_name, child_name),
        constants::child_result_path(child_name),
    )
}

#[cfg(test)]
#[path = "injector_tests.rs"]
mod tests;
