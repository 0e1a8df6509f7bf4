//! Well-known annotation, label, and finalizer names used across the engine.

/// Installed on every task the engine has observed at least once; removed
/// only after worker cleanup succeeds (§3, §4.1).
pub const FINALIZER: &str = "hortator.io/finalizer";

/// When present (any value), the PVC's owner reference is stripped so
/// substrate GC will not reap it after the task is deleted (§3, §4.1).
pub const ANNOTATION_RETAIN_PVC: &str = "hortator.io/retain-pvc";

/// Exempts a terminal task from TTL garbage collection entirely (§4.13).
pub const ANNOTATION_RETAIN: &str = "hortator.io/retain";

/// Per-task override of the retention window, extended-duration form (§4.13).
pub const ANNOTATION_RETENTION: &str = "hortator.io/retention";

/// Opts a single task out of the result cache (§4.8).
pub const ANNOTATION_CACHE_DISABLE: &str = "hortator.io/cache-disable";

/// Set on a task that was served from the result cache; records a prefix of
/// the cache key for observability (§4.8).
pub const ANNOTATION_CACHE_HIT: &str = "hortator.io/cache-hit";

/// Guards hierarchy-budget accounting so a descendant's usage is only added
/// to its root once (§3, §4.10, §8).
pub const ANNOTATION_HIERARCHY_ACCOUNTED: &str = "hortator.io/hierarchy-accounted";

/// Requests cancellation of a non-terminal task without deleting the object
/// (§3, §5). Any value is treated as true; checked at every non-terminal
/// phase handler.
pub const ANNOTATION_CANCEL_REQUESTED: &str = "hortator.io/cancel-requested";

/// Guards the one-shot trace event emitted when an externally-cancelled
/// task is first observed (§5).
pub const ANNOTATION_CANCELLATION_OBSERVED: &str = "hortator.io/cancellation-observed";

/// Labels applied to warm-pool pods and PVCs (§4.9).
pub const LABEL_WARM_POOL: &str = "warm-pool";
pub const LABEL_WARM_STATUS: &str = "warm-status";
pub const LABEL_CLAIMED_TASK: &str = "task";

pub const WARM_STATUS_IDLE: &str = "idle";
pub const WARM_STATUS_CLAIMED: &str = "claimed";

/// Service accounts selected by the pod builder based on effective
/// capabilities (§4.5).
pub const SERVICE_ACCOUNT_BASIC: &str = "hortator-worker-basic";
pub const SERVICE_ACCOUNT_SPAWN: &str = "hortator-worker-spawn";

/// Mount paths on the per-task PVC (§3, §6).
pub const MOUNT_OUTBOX: &str = "/outbox";
pub const MOUNT_WORKSPACE: &str = "/workspace";
pub const MOUNT_MEMORY: &str = "/memory";
pub const MOUNT_INBOX: &str = "/inbox";

/// File the pre-run init container writes the marshaled task spec to (§4.5, §6).
pub const TASK_JSON_FILENAME: &str = "task.json";

/// Begin/end markers for the agent's result block (§6).
pub const RESULT_BEGIN_MARKER: &str = "[hortator-result-begin]\n";
pub const RESULT_END_MARKER: &str = "\n[hortator-result-end]";

/// Progress annotation the runtime may set to drive staleness scoring (§6, §4.11).
pub const ANNOTATION_LAST_PROGRESS: &str = "hortator.io/last-progress";

/// Suffix appended to a task's name to derive its PVC name (§3, §4.6).
pub fn storage_name(task_name: &str) -> String {
    format!("{task_name}-storage")
}

/// Name of the one-shot writer pod used for child-result injection (§4.12).
pub fn writer_pod_name(parent_name: &str, child_name: &str) -> String {
    format!("{parent_name}-inject-{child_name}")
}

/// Path of a child's result payload inside the parent's PVC (§4.12, §6).
pub fn child_result_path(child_name: &str) -> String {
    format!("child-results/{child_name}.json")
}
