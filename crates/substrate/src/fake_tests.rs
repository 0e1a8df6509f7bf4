use super::*;
use hortator_core::test_support::TaskSpecBuilder;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn task_named(name: &str) -> Task {
    Task {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: TaskSpecBuilder::new("hi").build(),
        status: None,
    }
}

#[tokio::test]
async fn create_pod_defaults_to_pending_state() {
    let fake = FakeSubstrate::new();
    let pod = Pod {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some("t1".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    fake.create_pod("default", pod).await.unwrap();
    assert_eq!(fake.get_pod_state("default", "t1").await.unwrap(), Some(PodState::Pending));
}

#[tokio::test]
async fn delete_pod_removes_state_and_outcome() {
    let fake = FakeSubstrate::new();
    fake.create_pod(
        "default",
        Pod {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("t1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await
    .unwrap();
    fake.delete_pod("default", "t1").await.unwrap();
    assert_eq!(fake.get_pod_state("default", "t1").await.unwrap(), None);
}

#[tokio::test]
async fn create_task_rejects_duplicate_names() {
    let fake = FakeSubstrate::new();
    fake.create_task("default", task_named("t1")).await.unwrap();
    let result = fake.create_task("default", task_named("t1")).await;
    assert!(matches!(result, Err(SubstrateError::AlreadyExists(_))));
}

#[tokio::test]
async fn update_task_status_requires_existing_task() {
    let fake = FakeSubstrate::new();
    let result = fake.update_task_status("default", &task_named("ghost")).await;
    assert!(matches!(result, Err(SubstrateError::NotFound(_))));
}

#[tokio::test]
async fn update_task_status_conflicts_on_a_stale_resource_version() {
    let fake = FakeSubstrate::new();
    let created = fake.create_task("default", task_named("t1")).await.unwrap();

    // First writer, holding the resourceVersion it read at creation, wins.
    let mut first = created.clone();
    first.status = Some(TaskStatus { phase: hortator_core::Phase::Running, ..Default::default() });
    let after_first = fake.update_task_status("default", &first).await.unwrap();
    assert_ne!(after_first.metadata.resource_version, created.metadata.resource_version);

    // A second writer still holding the original (now stale) version conflicts.
    let mut stale = created;
    stale.status = Some(TaskStatus { phase: hortator_core::Phase::Failed, ..Default::default() });
    let result = fake.update_task_status("default", &stale).await;
    assert!(matches!(result, Err(SubstrateError::Conflict(_))));
}

#[tokio::test]
async fn queued_concurrent_write_forces_a_conflict_exactly_once() {
    let fake = FakeSubstrate::new();
    let created = fake.create_task("default", task_named("t1")).await.unwrap();

    fake.queue_concurrent_write("t1", |status| {
        status.child_tasks.push("sibling".to_string());
    });

    let mut write = created;
    write.status = Some(TaskStatus { phase: hortator_core::Phase::Running, ..Default::default() });
    let result = fake.update_task_status("default", &write).await;
    assert!(matches!(result, Err(SubstrateError::Conflict(_))));

    // The queued writer's mutation landed even though the caller's write was rejected.
    let latest = fake.get_task("default", "t1").await.unwrap().unwrap();
    assert_eq!(latest.status.unwrap().child_tasks, vec!["sibling".to_string()]);

    // The hook only fires once: a retry with the fresh version now succeeds.
    let mut retry = latest;
    retry.status.as_mut().unwrap().phase = hortator_core::Phase::Running;
    assert!(fake.update_task_status("default", &retry).await.is_ok());
}

#[tokio::test]
async fn emit_event_is_recorded_for_inspection() {
    let fake = FakeSubstrate::new();
    fake.emit_event("default", "t1", EventType::Warning, "Failed", "oops")
        .await
        .unwrap();
    let events = fake.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "Failed");
}

#[tokio::test]
async fn write_file_requires_the_pod_to_exist() {
    let fake = FakeSubstrate::new();
    let result = fake.write_file("default", "ghost", "/inbox/task.json", b"{}").await;
    assert!(matches!(result, Err(SubstrateError::NotFound(_))));
}

#[tokio::test]
async fn set_finalizer_adds_and_removes_idempotently() {
    let fake = FakeSubstrate::new();
    fake.create_task("default", task_named("t1")).await.unwrap();
    fake.set_finalizer("default", "t1", true).await.unwrap();
    fake.set_finalizer("default", "t1", true).await.unwrap();
    {
        let tasks = fake.tasks.lock();
        let finalizers = tasks["t1"].metadata.finalizers.as_ref().unwrap();
        assert_eq!(finalizers, &vec![hortator_core::constants::FINALIZER.to_string()]);
    }
    fake.set_finalizer("default", "t1", false).await.unwrap();
    let tasks = fake.tasks.lock();
    assert!(tasks["t1"].metadata.finalizers.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn set_annotation_sets_then_clears() {
    let fake = FakeSubstrate::new();
    fake.create_task("default", task_named("t1")).await.unwrap();
    fake.set_annotation("default", "t1", "hortator.io/cache-hit", Some("abcd1234"))
        .await
        .unwrap();
    {
        let tasks = fake.tasks.lock();
        assert_eq!(
            tasks["t1"].metadata.annotations.as_ref().unwrap().get("hortator.io/cache-hit"),
            Some(&"abcd1234".to_string())
        );
    }
    fake.set_annotation("default", "t1", "hortator.io/cache-hit", None).await.unwrap();
    let tasks = fake.tasks.lock();
    assert!(!tasks["t1"].metadata.annotations.as_ref().unwrap().contains_key("hortator.io/cache-hit"));
}

#[tokio::test]
async fn get_role_returns_a_seeded_role() {
    let fake = FakeSubstrate::new();
    let role = Role {
        metadata: ObjectMeta {
            name: Some("coder".to_string()),
            ..Default::default()
        },
        spec: hortator_core::RoleSpec {
            default_capabilities: vec!["shell".to_string()],
            ..Default::default()
        },
    };
    fake.seed_role(role);
    let fetched = fake.get_role("default", "coder").await.unwrap().unwrap();
    assert_eq!(fetched.spec.default_capabilities, vec!["shell".to_string()]);
    assert!(fake.get_role("default", "ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn list_pods_by_label_filters_on_key_value() {
    let fake = FakeSubstrate::new();
    let mut labels = std::collections::BTreeMap::new();
    labels.insert("warm-pool".to_string(), "true".to_string());
    fake.create_pod(
        "default",
        Pod {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("warm-1".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await
    .unwrap();
    fake.create_pod(
        "default",
        Pod {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("regular-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let warm = fake.list_pods_by_label("default", "warm-pool=true").await.unwrap();
    assert_eq!(warm.len(), 1);
    assert_eq!(warm[0].metadata.name.as_deref(), Some("warm-1"));
}
