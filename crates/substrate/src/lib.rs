#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hortator-substrate: the workload-substrate interface and its Kubernetes
//! implementation (§1, §2 — "the engine consumes a workload-substrate
//! interface" rather than calling pod/volume/secret APIs directly).

pub mod error;
pub mod kube_impl;
pub mod log_parse;
pub mod pod_builder;
pub mod pvc;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use hortator_core::{Role, Task};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;

pub use error::SubstrateError;

/// Coarse observed state of a worker pod, as the engine needs it (§4.1, §4.7,
/// §4.11). Deliberately narrower than the full Kubernetes `PodStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodState {
    Pending,
    Running,
    Succeeded,
    Failed { exit_code: Option<i32> },
    Unknown,
}

/// The result of a terminated pod, as read back by the handlers (§6).
#[derive(Debug, Clone, Default)]
pub struct PodOutcome {
    pub exit_code: Option<i32>,
    /// Final log tail, used for token/result/status marker extraction (§6).
    pub log_tail: String,
}

/// Everything the reconciliation engine needs from the container-orchestration
/// substrate. Implementations own pod/volume/secret/namespace lifecycle; the
/// engine never talks to the Kubernetes API (or any other substrate) directly
/// (§1 Non-goals, §2).
#[async_trait]
pub trait Substrate: Send + Sync + 'static {
    /// Create a pod from a fully-built spec, owned by `owner`. Idempotent:
    /// "already exists" is treated as adoption, not an error (§7).
    async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<(), SubstrateError>;

    /// Best-effort delete; not-found is success.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), SubstrateError>;

    async fn get_pod_state(&self, namespace: &str, name: &str) -> Result<Option<PodState>, SubstrateError>;

    /// Read the terminal outcome (exit code, log tail) of a pod that has
    /// stopped running. Returns `None` while the pod is still active.
    async fn get_pod_outcome(&self, namespace: &str, name: &str) -> Result<Option<PodOutcome>, SubstrateError>;

    async fn list_pods_by_label(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Pod>, SubstrateError>;

    /// Create a PVC if absent; no-op if it already exists (§4.6, §7).
    async fn ensure_pvc(&self, namespace: &str, pvc: PersistentVolumeClaim) -> Result<(), SubstrateError>;

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, SubstrateError>;

    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), SubstrateError>;

    /// Strip the PVC's owner references so substrate GC will not reap it
    /// when the owning task is deleted (§3, §4.1). Idempotent.
    async fn detach_pvc_owner(&self, namespace: &str, name: &str) -> Result<(), SubstrateError>;

    /// Re-parent a warm PVC onto its claimant task (§4.9). Counterpart to
    /// [`Substrate::detach_pvc_owner`].
    async fn attach_pvc_owner(&self, namespace: &str, name: &str, owner: OwnerReference) -> Result<(), SubstrateError>;

    /// Overwrite a pod's labels (§4.9 claim, first of the two sequential
    /// writes).
    async fn set_pod_labels(
        &self,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), SubstrateError>;

    /// Attach an owner reference to an already-created pod (§4.9 claim,
    /// second of the two sequential writes — this one establishes
    /// ownership, so a concurrent competing claim sees a conflict here).
    async fn attach_pod_owner(&self, namespace: &str, name: &str, owner: OwnerReference) -> Result<(), SubstrateError>;

    /// Write `payload` into a path inside a pod's filesystem, used by the
    /// warm-pool claim path to deliver `task.json` without a pod restart
    /// (§4.9) and unused by the normal init-container delivery path.
    async fn write_file(
        &self,
        namespace: &str,
        pod_name: &str,
        path: &str,
        payload: &[u8],
    ) -> Result<(), SubstrateError>;

    /// Fetch a namespace-scoped ConfigMap's string data, used for cluster
    /// defaults and admission policy documents (§4.2, §4.3).
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, SubstrateError>;

    async fn get_task(&self, namespace: &str, name: &str) -> Result<Option<Task>, SubstrateError>;

    /// Fetch the `Role` named `spec.role`, if any (§4.2, §4.11).
    async fn get_role(&self, namespace: &str, name: &str) -> Result<Option<Role>, SubstrateError>;

    /// Idempotently add or remove the well-known finalizer on the task's
    /// metadata. Distinct from [`Substrate::update_task_status`], which only
    /// ever touches the status subresource (§3, §4.1).
    async fn set_finalizer(&self, namespace: &str, name: &str, present: bool) -> Result<(), SubstrateError>;

    /// Set (`Some`) or clear (`None`) a single metadata annotation on the
    /// task. Used for the cache-hit marker (§4.8), the retain/retention
    /// overrides (§4.13), and the one-shot cancellation-observed guard (§5).
    async fn set_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), SubstrateError>;

    async fn list_tasks(&self, namespace: &str) -> Result<Vec<Task>, SubstrateError>;

    /// Apply the desired status via an optimistic-concurrency update. Callers
    /// implement the retry-on-conflict loop (§4.1, §4.14); this method
    /// performs exactly one attempt against the resource version carried on
    /// `task`.
    async fn update_task_status(&self, namespace: &str, task: &Task) -> Result<Task, SubstrateError>;

    async fn create_task(&self, namespace: &str, task: Task) -> Result<Task, SubstrateError>;

    async fn delete_task(&self, namespace: &str, name: &str) -> Result<(), SubstrateError>;

    /// Emit a human-readable Kubernetes Event on the task object (§4.14).
    async fn emit_event(
        &self,
        namespace: &str,
        task_name: &str,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), SubstrateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}
