//! Waiting-phase handling: reincarnation once all children have reported
//! in (§4.12).

use super::HandlerOutcome;
use crate::error::ReconcileError;
use crate::trace::TraceEvent;
use hortator_core::{Phase, Task};

pub(crate) fn handle_waiting(task: &Task) -> Result<HandlerOutcome, ReconcileError> {
    let name = task.metadata.name.clone().unwrap_or_default();
    let mut status = task.status.clone().unwrap_or_default();
    if crate::injector::should_reincarnate(status.phase, &status.pending_children) {
        status.phase = Phase::Pending;
        status.pod_name = None;
        return Ok(HandlerOutcome {
            status: Some(status),
            requeue_after: Some(std::time::Duration::ZERO),
            events: vec![TraceEvent::TaskReincarnating { task: name }],
        });
    }
    // Still waiting on at least one child; nothing to write, poll again
    // once the child's own reconcile drains `pendingChildren` (§4.12).
    Ok(HandlerOutcome::requeue(std::time::Duration::from_secs(10)))
}

#[cfg(test)]
#[path = "waiting_tests.rs"]
mod tests;
