//! The real `Substrate` implementation, backed by `kube`/`k8s-openapi`.

use crate::error::SubstrateError;
use crate::{EventType, PodOutcome, PodState, Substrate};
use async_trait::async_trait;
use hortator_core::{Role, Task};
use k8s_openapi::api::core::v1::{ConfigMap, Event as K8sEvent, EventSource, ObjectReference, PersistentVolumeClaim, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta, OwnerReference, Time};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;

#[derive(Clone)]
pub struct KubeSubstrate {
    client: Client,
}

impl KubeSubstrate {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn try_default() -> Result<Self, SubstrateError> {
        let client = Client::try_default()
            .await
            .map_err(|e| SubstrateError::Persistent(format!("failed to create kube client: {e}")))?;
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pvcs(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn tasks(&self, namespace: &str) -> Api<Task> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn events(&self, namespace: &str) -> Api<K8sEvent> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn roles(&self, namespace: &str) -> Api<Role> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn pod_state_from(pod: &Pod) -> PodState {
    let Some(status) = &pod.status else {
        return PodState::Unknown;
    };
    match status.phase.as_deref() {
        Some("Pending") => PodState::Pending,
        Some("Running") => PodState::Running,
        Some("Succeeded") => PodState::Succeeded,
        Some("Failed") => {
            let exit_code = status
                .container_statuses
                .as_ref()
                .and_then(|statuses| statuses.first())
                .and_then(|cs| cs.state.as_ref())
                .and_then(|s| s.terminated.as_ref())
                .map(|t| t.exit_code);
            PodState::Failed { exit_code }
        }
        _ => PodState::Unknown,
    }
}

fn pod_outcome_from(pod: &Pod) -> Option<PodOutcome> {
    let status = pod.status.as_ref()?;
    let terminated = status
        .container_statuses
        .as_ref()
        .and_then(|statuses| statuses.iter().find(|cs| cs.name == "worker"))
        .and_then(|cs| cs.state.as_ref())
        .and_then(|s| s.terminated.as_ref())?;
    Some(PodOutcome {
        exit_code: Some(terminated.exit_code),
        // Populated by a separate log-fetch call by callers that need it;
        // the typed pod status carries no log content.
        log_tail: String::new(),
    })
}

#[async_trait]
impl Substrate for KubeSubstrate {
    async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<(), SubstrateError> {
        match self.pods(namespace).create(&PostParams::default(), &pod).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.reason == "AlreadyExists" => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), SubstrateError> {
        match self.pods(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_pod_state(&self, namespace: &str, name: &str) -> Result<Option<PodState>, SubstrateError> {
        match self.pods(namespace).get_opt(name).await? {
            Some(pod) => Ok(Some(pod_state_from(&pod))),
            None => Ok(None),
        }
    }

    async fn get_pod_outcome(&self, namespace: &str, name: &str) -> Result<Option<PodOutcome>, SubstrateError> {
        match self.pods(namespace).get_opt(name).await? {
            Some(pod) => Ok(pod_outcome_from(&pod)),
            None => Ok(None),
        }
    }

    async fn list_pods_by_label(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, SubstrateError> {
        let lp = ListParams::default().labels(selector);
        let list = self.pods(namespace).list(&lp).await?;
        Ok(list.items)
    }

    async fn ensure_pvc(&self, namespace: &str, pvc: PersistentVolumeClaim) -> Result<(), SubstrateError> {
        match self.pvcs(namespace).create(&PostParams::default(), &pvc).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.reason == "AlreadyExists" => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, SubstrateError> {
        Ok(self.pvcs(namespace).get_opt(name).await?)
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), SubstrateError> {
        match self.pvcs(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn detach_pvc_owner(&self, namespace: &str, name: &str) -> Result<(), SubstrateError> {
        let patch = serde_json::json!({
            "metadata": { "ownerReferences": null }
        });
        self.pvcs(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn attach_pvc_owner(&self, namespace: &str, name: &str, owner: OwnerReference) -> Result<(), SubstrateError> {
        let patch = serde_json::json!({ "metadata": { "ownerReferences": [owner] } });
        self.pvcs(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn set_pod_labels(
        &self,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), SubstrateError> {
        let patch = serde_json::json!({ "metadata": { "labels": labels } });
        self.pods(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn attach_pod_owner(&self, namespace: &str, name: &str, owner: OwnerReference) -> Result<(), SubstrateError> {
        let pod = self.pods(namespace).get(name).await?;
        if pod.metadata.owner_references.as_ref().is_some_and(|refs| !refs.is_empty()) {
            return Err(SubstrateError::Conflict(format!("pod '{name}' already owned")));
        }
        let patch = serde_json::json!({ "metadata": { "ownerReferences": [owner] } });
        self.pods(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn write_file(
        &self,
        namespace: &str,
        pod_name: &str,
        path: &str,
        payload: &[u8],
    ) -> Result<(), SubstrateError> {
        use kube::api::AttachParams;
        use tokio::io::AsyncWriteExt;

        let ap = AttachParams::default().stdin(true).stdout(false).stderr(false);
        let command = vec!["sh".to_string(), "-c".to_string(), format!("cat > {path}")];
        let mut attached = self
            .pods(namespace)
            .exec(pod_name, command, &ap)
            .await
            .map_err(|e| SubstrateError::Persistent(format!("exec into pod '{pod_name}' failed: {e}")))?;

        let mut stdin = attached
            .stdin()
            .ok_or_else(|| SubstrateError::Persistent(format!("exec into pod '{pod_name}' has no stdin stream")))?;
        stdin
            .write_all(payload)
            .await
            .map_err(|e| SubstrateError::Persistent(format!("writing '{path}' into pod '{pod_name}' failed: {e}")))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| SubstrateError::Persistent(format!("closing stdin for pod '{pod_name}' failed: {e}")))?;
        drop(stdin);

        let status_fut = attached.take_status();
        attached
            .join()
            .await
            .map_err(|e| SubstrateError::Persistent(format!("exec into pod '{pod_name}' did not complete cleanly: {e}")))?;

        if let Some(fut) = status_fut {
            if let Some(status) = fut.await {
                if status.status.as_deref() == Some("Failure") {
                    return Err(SubstrateError::Persistent(format!(
                        "writing '{path}' into pod '{pod_name}' failed: {}",
                        status.message.unwrap_or_default()
                    )));
                }
            }
        }
        Ok(())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, SubstrateError> {
        match self.config_maps(namespace).get_opt(name).await? {
            Some(cm) => Ok(Some(cm.data.unwrap_or_default())),
            None => Ok(None),
        }
    }

    async fn get_task(&self, namespace: &str, name: &str) -> Result<Option<Task>, SubstrateError> {
        Ok(self.tasks(namespace).get_opt(name).await?)
    }

    async fn list_tasks(&self, namespace: &str) -> Result<Vec<Task>, SubstrateError> {
        let list = self.tasks(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_role(&self, namespace: &str, name: &str) -> Result<Option<Role>, SubstrateError> {
        Ok(self.roles(namespace).get_opt(name).await?)
    }

    async fn set_finalizer(&self, namespace: &str, name: &str, present: bool) -> Result<(), SubstrateError> {
        let Some(task) = self.tasks(namespace).get_opt(name).await? else {
            return Ok(());
        };
        let mut finalizers = task.metadata.finalizers.unwrap_or_default();
        let has_it = finalizers.iter().any(|f| f == hortator_core::constants::FINALIZER);
        if present == has_it {
            return Ok(());
        }
        if present {
            finalizers.push(hortator_core::constants::FINALIZER.to_string());
        } else {
            finalizers.retain(|f| f != hortator_core::constants::FINALIZER);
        }
        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        self.tasks(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn set_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), SubstrateError> {
        let patch = serde_json::json!({ "metadata": { "annotations": { key: value } } });
        self.tasks(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    /// Replaces the status subresource via a `PUT` carrying `task`'s own
    /// `resourceVersion` (§4.1, §4.14, §5): unlike a merge patch, this makes
    /// the API server reject the write with `Conflict` when the object has
    /// moved on since `task` was read, which is what lets the caller's
    /// conflict-retry loop actually engage.
    async fn update_task_status(&self, namespace: &str, task: &Task) -> Result<Task, SubstrateError> {
        let name = task.metadata.name.clone().unwrap_or_default();
        let data = serde_json::to_vec(task)
            .map_err(|e| SubstrateError::Persistent(format!("failed to serialize status for task '{name}': {e}")))?;
        let updated = self.tasks(namespace).replace_status(&name, &PostParams::default(), data).await?;
        Ok(updated)
    }

    async fn create_task(&self, namespace: &str, task: Task) -> Result<Task, SubstrateError> {
        Ok(self.tasks(namespace).create(&PostParams::default(), &task).await?)
    }

    async fn delete_task(&self, namespace: &str, name: &str) -> Result<(), SubstrateError> {
        match self.tasks(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn emit_event(
        &self,
        namespace: &str,
        task_name: &str,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), SubstrateError> {
        let type_str = match event_type {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        };
        let event = K8sEvent {
            metadata: ObjectMeta {
                generate_name: Some(format!("{task_name}-")),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: Some("Task".to_string()),
                name: Some(task_name.to_string()),
                namespace: Some(namespace.to_string()),
                api_version: Some("hortator.io/v1alpha1".to_string()),
                ..Default::default()
            },
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            type_: Some(type_str.to_string()),
            source: Some(EventSource {
                component: Some("hortator-operator".to_string()),
                ..Default::default()
            }),
            first_timestamp: Some(Time(chrono::Utc::now())),
            last_timestamp: Some(Time(chrono::Utc::now())),
            event_time: Some(MicroTime(chrono::Utc::now())),
            count: Some(1),
            ..Default::default()
        };
        self.events(namespace).create(&PostParams::default(), &event).await?;
        Ok(())
    }
}
