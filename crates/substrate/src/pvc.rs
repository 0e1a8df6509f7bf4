//! Per-task persistent volume lifecycle (§4.6).

use hortator_core::{constants, Task, Tier};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

const BASIC_TIER_SIZE: &str = "256Mi";
const AGENTIC_TIER_SIZE: &str = "1Gi";

/// Build the PVC description for a task's storage (§4.6).
///
/// Access mode is "exclusive single-writer" (`ReadWriteOnce`); size defaults
/// by tier, overridable by `spec.storage.size`; `spec.storage.retainDays`
/// becomes a `retention=<N>d` annotation consumed later by the TTL GC (§4.13).
pub fn build_pvc(task: &Task, namespace: &str) -> PersistentVolumeClaim {
    let name = task.metadata.name.clone().unwrap_or_default();
    let storage = &task.spec.storage;
    let size = storage.size.clone().unwrap_or_else(|| {
        if task.spec.tier == Tier::Legionary {
            BASIC_TIER_SIZE.to_string()
        } else {
            AGENTIC_TIER_SIZE.to_string()
        }
    });

    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(size));

    let mut annotations = BTreeMap::new();
    if let Some(days) = storage.retain_days {
        annotations.insert(
            constants::ANNOTATION_RETENTION.to_string(),
            hortator_core::format_days(days),
        );
    }

    let owner_ref = OwnerReference {
        api_version: "hortator.io/v1alpha1".to_string(),
        kind: "Task".to_string(),
        name: name.clone(),
        uid: task.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(constants::storage_name(&name)),
            namespace: Some(namespace.to_string()),
            annotations: if annotations.is_empty() { None } else { Some(annotations) },
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: storage.storage_class.clone(),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the PVC for a warm-pool worker, not yet owned by any task (§4.9).
/// Re-parented onto the claimant via [`crate::Substrate::attach_pvc_owner`].
pub fn build_warm_pvc(pod_name: &str, namespace: &str) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(AGENTIC_TIER_SIZE.to_string()));

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(constants::storage_name(pod_name)),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(constants::LABEL_WARM_POOL.to_string(), "true".to_string())])),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "pvc_tests.rs"]
mod tests;
