//! Pre-started idle workers awaiting task injection (§4.9).

use crate::defaults_cache::WarmPoolDefaults;
use hortator_core::{constants, Task};
use hortator_substrate::pod_builder::{build_warm_pod, PodDefaults};
use hortator_substrate::pvc::build_warm_pvc;
use hortator_substrate::Substrate;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const COOLDOWN: Duration = Duration::from_secs(30);

/// Exclusive-lock-guarded last-check timestamp, gating replenishment checks
/// to once per cooldown (§4.9, §5).
pub struct WarmPoolGate {
    last_check: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl Default for WarmPoolGate {
    fn default() -> Self {
        Self {
            last_check: Mutex::new(None),
            cooldown: COOLDOWN,
        }
    }
}

impl WarmPoolGate {
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            last_check: Mutex::new(None),
            cooldown,
        }
    }

    /// True (and records `now`) only when the cooldown has elapsed since the
    /// last check, or no check has happened yet.
    pub fn try_enter(&self) -> bool {
        let mut last = self.last_check.lock();
        let ready = last.is_none_or(|t| t.elapsed() >= self.cooldown);
        if ready {
            *last = Some(Instant::now());
        }
        ready
    }
}

/// How many additional warm pods to create, given the current idle count and
/// target (§4.9).
pub fn replenishment_count(idle_count: u32, target: u32) -> u32 {
    target.saturating_sub(idle_count)
}

pub fn warm_pod_labels(status: &str, claimed_task: Option<&str>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(constants::LABEL_WARM_POOL.to_string(), "true".to_string());
    labels.insert(constants::LABEL_WARM_STATUS.to_string(), status.to_string());
    if let Some(task) = claimed_task {
        labels.insert(constants::LABEL_CLAIMED_TASK.to_string(), task.to_string());
    }
    labels
}

pub fn idle_selector() -> String {
    format!(
        "{}=true,{}={}",
        constants::LABEL_WARM_POOL,
        constants::LABEL_WARM_STATUS,
        constants::WARM_STATUS_IDLE
    )
}

/// If a target number of idle warm pods isn't met, create the shortfall
/// (plus their PVCs) in the operator namespace (§4.9). Gated by
/// [`WarmPoolGate::try_enter`] at the call site so this runs at most once
/// per cooldown window across all reconciles.
pub async fn replenish<S: Substrate>(
    substrate: &S,
    operator_namespace: &str,
    config: &WarmPoolDefaults,
    pod_defaults: &PodDefaults,
) -> Result<u32, hortator_substrate::SubstrateError> {
    if config.target_idle == 0 {
        return Ok(0);
    }
    let idle = substrate.list_pods_by_label(operator_namespace, &idle_selector()).await?;
    let missing = replenishment_count(idle.len() as u32, config.target_idle);
    for _ in 0..missing {
        let pod_name = format!("hortator-warm-{}", uuid::Uuid::new_v4());
        substrate.ensure_pvc(operator_namespace, build_warm_pvc(&pod_name, operator_namespace)).await?;
        substrate.create_pod(operator_namespace, build_warm_pod(&pod_name, operator_namespace, pod_defaults)).await?;
    }
    Ok(missing)
}

/// Find an idle warm pod and claim it for `task`, delivering the task spec
/// into its `/inbox/task.json` (§4.9). Two sequential writes establish the
/// claim: labels first, then the owner reference, so a concurrent competing
/// claim against an already-owned pod sees a conflict on the second write
/// and aborts (§5). On injection failure the claim is rolled back (the pod
/// is deleted) and the caller falls back to a cold start.
pub async fn claim<S: Substrate>(
    substrate: &S,
    operator_namespace: &str,
    task: &Task,
) -> Result<Option<String>, hortator_substrate::SubstrateError> {
    let idle = substrate.list_pods_by_label(operator_namespace, &idle_selector()).await?;
    let Some(pod) = idle.into_iter().next() else {
        return Ok(None);
    };
    let pod_name = pod.metadata.name.clone().unwrap_or_default();
    let task_name = task.metadata.name.clone().unwrap_or_default();

    let labels = warm_pod_labels(constants::WARM_STATUS_CLAIMED, Some(&task_name));
    substrate.set_pod_labels(operator_namespace, &pod_name, labels).await?;

    let owner = OwnerReference {
        api_version: "hortator.io/v1alpha1".to_string(),
        kind: "Task".to_string(),
        name: task_name.clone(),
        uid: task.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };
    if let Err(err) = substrate.attach_pod_owner(operator_namespace, &pod_name, owner.clone()).await {
        let _ = substrate.delete_pod(operator_namespace, &pod_name).await;
        return Err(err);
    }

    let pvc_name = constants::storage_name(&pod_name);
    if let Err(err) = substrate.attach_pvc_owner(operator_namespace, &pvc_name, owner).await {
        let _ = substrate.delete_pod(operator_namespace, &pod_name).await;
        return Err(err);
    }

    let task_json = match serde_json::to_vec(&task.spec) {
        Ok(json) => json,
        Err(err) => {
            let _ = substrate.delete_pod(operator_namespace, &pod_name).await;
            return Err(hortator_substrate::SubstrateError::Persistent(err.to_string()));
        }
    };
    let path = format!("{}/{}", constants::MOUNT_INBOX, constants::TASK_JSON_FILENAME);
    if let Err(err) = substrate.write_file(operator_namespace, &pod_name, &path, &task_json).await {
        let _ = substrate.delete_pod(operator_namespace, &pod_name).await;
        return Err(err);
    }

    Ok(Some(pod_name))
}

#[cfg(test)]
#[path = "warm_pool_tests.rs"]
mod tests;
