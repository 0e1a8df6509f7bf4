use super::*;
use hortator_core::test_support::TaskSpecBuilder;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn defaults() -> PodDefaults {
    PodDefaults {
        basic_image: "hortator/legionary:latest".to_string(),
        agentic_image: "hortator/agentic:latest".to_string(),
        default_cpu_request: "250m".to_string(),
        default_cpu_limit: "500m".to_string(),
        default_memory_request: "256Mi".to_string(),
        default_memory_limit: "512Mi".to_string(),
        allowed_shell_commands: None,
        denied_shell_commands: None,
        read_only_workspace: false,
    }
}

fn task_named(name: &str, spec: hortator_core::TaskSpec) -> Task {
    Task {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

#[test]
fn basic_tier_uses_basic_image_and_ephemeral_inbox() {
    let spec = TaskSpecBuilder::new("hello").build();
    let task = task_named("t1", spec);
    let pod = build_worker_pod(&task, "default", &defaults()).unwrap();
    let worker = &pod.spec.unwrap().containers[0];
    assert_eq!(worker.image.as_deref(), Some("hortator/legionary:latest"));
    let volumes = pod_volumes(&task, "default");
    assert!(volumes.iter().any(|v| v.name == "inbox" && v.empty_dir.is_some()));
}

#[test]
fn agentic_tier_mounts_inbox_as_pvc_subpath() {
    let spec = TaskSpecBuilder::new("hello").tier(hortator_core::Tier::Tribune).build();
    let task = task_named("t2", spec);
    let pod = build_worker_pod(&task, "default", &defaults()).unwrap();
    let spec = pod.spec.unwrap();
    assert_eq!(spec.containers[0].image.as_deref(), Some("hortator/agentic:latest"));
    let volumes = spec.volumes.unwrap();
    let inbox = volumes.iter().find(|v| v.name == "inbox").unwrap();
    assert!(inbox.persistent_volume_claim.is_some());
}

#[test]
fn spawn_capability_selects_spawn_service_account() {
    let spec = TaskSpecBuilder::new("hello").tier(hortator_core::Tier::Centurion).build();
    let task = task_named("t3", spec);
    let pod = build_worker_pod(&task, "default", &defaults()).unwrap();
    assert_eq!(
        pod.spec.unwrap().service_account_name.as_deref(),
        Some(hortator_core::constants::SERVICE_ACCOUNT_SPAWN)
    );
}

#[test]
fn no_spawn_capability_selects_basic_service_account() {
    let spec = TaskSpecBuilder::new("hello").build();
    let task = task_named("t4", spec);
    let pod = build_worker_pod(&task, "default", &defaults()).unwrap();
    assert_eq!(
        pod.spec.unwrap().service_account_name.as_deref(),
        Some(hortator_core::constants::SERVICE_ACCOUNT_BASIC)
    );
}

#[test]
fn invalid_resource_quantity_is_a_clean_error() {
    let mut spec = TaskSpecBuilder::new("hello").build();
    spec.resources.cpu_request = Some("not-a-quantity".to_string());
    let task = task_named("t5", spec);
    let result = build_worker_pod(&task, "default", &defaults());
    assert!(result.is_err());
}

#[test]
fn owner_reference_points_at_the_task() {
    let spec = TaskSpecBuilder::new("hello").build();
    let task = task_named("t6", spec);
    let pod = build_worker_pod(&task, "default", &defaults()).unwrap();
    let owner = &pod.metadata.owner_references.unwrap()[0];
    assert_eq!(owner.kind, "Task");
    assert_eq!(owner.name, "t6");
}

fn pod_volumes(task: &Task, namespace: &str) -> Vec<k8s_openapi::api::core::v1::Volume> {
    build_worker_pod(task, namespace, &defaults())
        .unwrap()
        .spec
        .unwrap()
        .volumes
        .unwrap()
}

#[test]
fn writer_pod_mounts_parent_pvc_and_carries_payload_via_env() {
    let parent = task_named("parent", TaskSpecBuilder::new("hi").build());
    let pod = build_writer_pod(
        &parent,
        "default",
        "parent-inject-child1",
        "child-results/child1.json",
        r#"{"taskId":"child1","status":"completed"}"#,
        "hortator/agentic:latest",
    );
    assert_eq!(pod.metadata.name.as_deref(), Some("parent-inject-child1"));
    let spec = pod.spec.unwrap();
    let volume = spec.volumes.unwrap().into_iter().find(|v| v.name == "inbox").unwrap();
    assert_eq!(
        volume.persistent_volume_claim.unwrap().claim_name,
        "parent-storage"
    );
    let env = spec.containers[0].env.as_ref().unwrap();
    assert!(env.iter().any(|e| e.name == "CHILD_RESULT_JSON"));
}
