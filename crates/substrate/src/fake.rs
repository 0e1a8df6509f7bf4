//! In-memory `Substrate` implementation for tests (`test-support` feature).

use crate::error::SubstrateError;
use crate::{EventType, PodOutcome, PodState, Substrate};
use async_trait::async_trait;
use hortator_core::{Role, Task, TaskStatus};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub task_name: String,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

/// Fully in-memory fake of the workload substrate. Namespacing is ignored:
/// all state is keyed by name only, mirroring how the real Kubernetes API
/// scopes by (namespace, name) but tests here always use one namespace.
#[derive(Default)]
pub struct FakeSubstrate {
    pods: Mutex<BTreeMap<String, Pod>>,
    pod_states: Mutex<BTreeMap<String, PodState>>,
    pod_outcomes: Mutex<BTreeMap<String, PodOutcome>>,
    pvcs: Mutex<BTreeMap<String, PersistentVolumeClaim>>,
    config_maps: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    tasks: Mutex<BTreeMap<String, Task>>,
    roles: Mutex<BTreeMap<String, Role>>,
    events: Mutex<Vec<RecordedEvent>>,
    written_files: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    /// One-shot concurrent writers queued for a given task name; consumed by
    /// the next `update_task_status` call for that task (see
    /// [`FakeSubstrate::queue_concurrent_write`]).
    queued_writers: Mutex<BTreeMap<String, Box<dyn FnOnce(&mut TaskStatus) + Send>>>,
}

impl FakeSubstrate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_pod_state(&self, pod_name: &str, state: PodState) {
        self.pod_states.lock().insert(pod_name.to_string(), state);
    }

    pub fn set_pod_outcome(&self, pod_name: &str, outcome: PodOutcome) {
        self.pod_outcomes.lock().insert(pod_name.to_string(), outcome);
    }

    pub fn put_config_map(&self, name: &str, data: BTreeMap<String, String>) {
        self.config_maps.lock().insert(name.to_string(), data);
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.lock().len()
    }

    pub fn pvc_exists(&self, name: &str) -> bool {
        self.pvcs.lock().contains_key(name)
    }

    pub fn written_file(&self, pod_name: &str, path: &str) -> Option<Vec<u8>> {
        self.written_files.lock().get(&(pod_name.to_string(), path.to_string())).cloned()
    }

    pub fn seed_task(&self, task: Task) {
        let name = task.metadata.name.clone().unwrap_or_default();
        self.tasks.lock().insert(name, task);
    }

    pub fn seed_role(&self, role: Role) {
        let name = role.metadata.name.clone().unwrap_or_default();
        self.roles.lock().insert(name, role);
    }

    /// Arrange for the *next* `update_task_status` call against `name` to be
    /// preempted by a simulated concurrent writer: `mutate` is applied to
    /// the stored status and its `resourceVersion` is bumped first, and the
    /// caller's own write — holding the now-stale version it read earlier —
    /// is rejected with `Conflict`. Models a sibling reconcile's status
    /// write landing in the gap between a caller's read and write, the one
    /// race `update_status_with_retry`'s recompute-on-retry loop exists for.
    /// Fires once; a second write against the same task proceeds normally.
    pub fn queue_concurrent_write(&self, name: &str, mutate: impl FnOnce(&mut TaskStatus) + Send + 'static) {
        self.queued_writers.lock().insert(name.to_string(), Box::new(mutate));
    }
}

fn bump_resource_version(metadata: &mut k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) {
    let next = metadata
        .resource_version
        .as_ref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    metadata.resource_version = Some(next.to_string());
}

#[async_trait]
impl Substrate for FakeSubstrate {
    async fn create_pod(&self, _namespace: &str, pod: Pod) -> Result<(), SubstrateError> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.pods.lock().insert(name.clone(), pod);
        self.pod_states.lock().entry(name).or_insert(PodState::Pending);
        Ok(())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<(), SubstrateError> {
        self.pods.lock().remove(name);
        self.pod_states.lock().remove(name);
        self.pod_outcomes.lock().remove(name);
        Ok(())
    }

    async fn get_pod_state(&self, _namespace: &str, name: &str) -> Result<Option<PodState>, SubstrateError> {
        Ok(self.pod_states.lock().get(name).cloned())
    }

    async fn get_pod_outcome(&self, _namespace: &str, name: &str) -> Result<Option<PodOutcome>, SubstrateError> {
        Ok(self.pod_outcomes.lock().get(name).cloned())
    }

    async fn list_pods_by_label(&self, _namespace: &str, selector: &str) -> Result<Vec<Pod>, SubstrateError> {
        let (key, value) = selector.split_once('=').unwrap_or((selector, ""));
        Ok(self
            .pods
            .lock()
            .values()
            .filter(|pod| {
                pod.metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(key))
                    .is_some_and(|v| v == value)
            })
            .cloned()
            .collect())
    }

    async fn ensure_pvc(&self, _namespace: &str, pvc: PersistentVolumeClaim) -> Result<(), SubstrateError> {
        let name = pvc.metadata.name.clone().unwrap_or_default();
        self.pvcs.lock().entry(name).or_insert(pvc);
        Ok(())
    }

    async fn get_pvc(&self, _namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, SubstrateError> {
        Ok(self.pvcs.lock().get(name).cloned())
    }

    async fn delete_pvc(&self, _namespace: &str, name: &str) -> Result<(), SubstrateError> {
        self.pvcs.lock().remove(name);
        Ok(())
    }

    async fn detach_pvc_owner(&self, _namespace: &str, name: &str) -> Result<(), SubstrateError> {
        if let Some(pvc) = self.pvcs.lock().get_mut(name) {
            pvc.metadata.owner_references = None;
        }
        Ok(())
    }

    async fn attach_pvc_owner(&self, _namespace: &str, name: &str, owner: OwnerReference) -> Result<(), SubstrateError> {
        let mut pvcs = self.pvcs.lock();
        let Some(pvc) = pvcs.get_mut(name) else {
            return Err(SubstrateError::NotFound(name.to_string()));
        };
        pvc.metadata.owner_references.get_or_insert_with(Vec::new).push(owner);
        Ok(())
    }

    async fn set_pod_labels(
        &self,
        _namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), SubstrateError> {
        let mut pods = self.pods.lock();
        let Some(pod) = pods.get_mut(name) else {
            return Err(SubstrateError::NotFound(name.to_string()));
        };
        pod.metadata.labels = Some(labels);
        Ok(())
    }

    async fn attach_pod_owner(&self, _namespace: &str, name: &str, owner: OwnerReference) -> Result<(), SubstrateError> {
        let mut pods = self.pods.lock();
        let Some(pod) = pods.get_mut(name) else {
            return Err(SubstrateError::NotFound(name.to_string()));
        };
        if pod.metadata.owner_references.as_ref().is_some_and(|refs| !refs.is_empty()) {
            return Err(SubstrateError::Conflict(format!("pod '{name}' already owned")));
        }
        pod.metadata.owner_references.get_or_insert_with(Vec::new).push(owner);
        Ok(())
    }

    async fn write_file(
        &self,
        _namespace: &str,
        pod_name: &str,
        path: &str,
        payload: &[u8],
    ) -> Result<(), SubstrateError> {
        if !self.pods.lock().contains_key(pod_name) {
            return Err(SubstrateError::NotFound(pod_name.to_string()));
        }
        self.written_files
            .lock()
            .insert((pod_name.to_string(), path.to_string()), payload.to_vec());
        Ok(())
    }

    async fn get_config_map(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, SubstrateError> {
        Ok(self.config_maps.lock().get(name).cloned())
    }

    async fn get_task(&self, _namespace: &str, name: &str) -> Result<Option<Task>, SubstrateError> {
        Ok(self.tasks.lock().get(name).cloned())
    }

    async fn list_tasks(&self, _namespace: &str) -> Result<Vec<Task>, SubstrateError> {
        Ok(self.tasks.lock().values().cloned().collect())
    }

    async fn get_role(&self, _namespace: &str, name: &str) -> Result<Option<Role>, SubstrateError> {
        Ok(self.roles.lock().get(name).cloned())
    }

    async fn set_finalizer(&self, _namespace: &str, name: &str, present: bool) -> Result<(), SubstrateError> {
        let mut tasks = self.tasks.lock();
        let Some(task) = tasks.get_mut(name) else {
            return Ok(());
        };
        let finalizers = task.metadata.finalizers.get_or_insert_with(Vec::new);
        let has_it = finalizers.iter().any(|f| f == hortator_core::constants::FINALIZER);
        if present && !has_it {
            finalizers.push(hortator_core::constants::FINALIZER.to_string());
        } else if !present {
            finalizers.retain(|f| f != hortator_core::constants::FINALIZER);
        }
        Ok(())
    }

    async fn set_annotation(
        &self,
        _namespace: &str,
        name: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), SubstrateError> {
        let mut tasks = self.tasks.lock();
        let Some(task) = tasks.get_mut(name) else {
            return Ok(());
        };
        match value {
            Some(v) => {
                task.metadata
                    .annotations
                    .get_or_insert_with(BTreeMap::new)
                    .insert(key.to_string(), v.to_string());
            }
            None => {
                if let Some(annotations) = task.metadata.annotations.as_mut() {
                    annotations.remove(key);
                }
            }
        }
        Ok(())
    }

    async fn update_task_status(&self, _namespace: &str, task: &Task) -> Result<Task, SubstrateError> {
        let name = task.metadata.name.clone().unwrap_or_default();
        let queued_writer = self.queued_writers.lock().remove(&name);
        let mut tasks = self.tasks.lock();
        let Some(existing) = tasks.get_mut(&name) else {
            return Err(SubstrateError::NotFound(name));
        };
        if let Some(mutate) = queued_writer {
            let mut status = existing.status.clone().unwrap_or_default();
            mutate(&mut status);
            existing.status = Some(status);
            bump_resource_version(&mut existing.metadata);
            return Err(SubstrateError::Conflict(format!("task '{name}' was modified concurrently")));
        }
        // Mirrors the real API server's resourceVersion precondition on a
        // status `PUT` (§4.1, §4.14, §5): a write carrying a stale version
        // is rejected rather than silently applied, so the caller's
        // conflict-retry loop actually has something to retry against.
        if existing.metadata.resource_version != task.metadata.resource_version {
            return Err(SubstrateError::Conflict(format!("task '{name}' was modified concurrently")));
        }
        existing.status = task.status.clone();
        bump_resource_version(&mut existing.metadata);
        Ok(existing.clone())
    }

    async fn create_task(&self, _namespace: &str, task: Task) -> Result<Task, SubstrateError> {
        let name = task.metadata.name.clone().unwrap_or_default();
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&name) {
            return Err(SubstrateError::AlreadyExists(name));
        }
        let mut task = task;
        task.metadata.resource_version = Some("1".to_string());
        tasks.insert(name, task.clone());
        Ok(task)
    }

    async fn delete_task(&self, _namespace: &str, name: &str) -> Result<(), SubstrateError> {
        self.tasks.lock().remove(name);
        Ok(())
    }

    async fn emit_event(
        &self,
        _namespace: &str,
        task_name: &str,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), SubstrateError> {
        self.events.lock().push(RecordedEvent {
            task_name: task_name.to_string(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
