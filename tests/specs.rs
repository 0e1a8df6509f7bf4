//! End-to-end scenarios driven entirely through `Reconciler::reconcile`
//! against `FakeSubstrate`, exercising the public entry point rather than
//! internal handlers.

use hortator_core::test_support::{status_with_phase, TaskSpecBuilder};
use hortator_core::{constants, BudgetSpec, FakeClock, Phase, Task, TaskSpec};
use hortator_engine::{ClusterDefaults, DefaultsCache, NamespaceScope, Reconciler, ResultCache, WarmPoolGate};
use hortator_substrate::fake::FakeSubstrate;
use hortator_substrate::{PodOutcome, PodState, Substrate};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;
use std::time::Duration;

fn new_task(name: &str, spec: TaskSpec) -> Task {
    Task {
        metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
        spec,
        status: Some(status_with_phase(Phase::Pending)),
    }
}

fn reconciler(fake: Arc<FakeSubstrate>) -> Reconciler<FakeSubstrate, FakeClock> {
    Reconciler::new(
        fake,
        FakeClock::new(),
        Arc::new(DefaultsCache::new(ClusterDefaults::default())),
        Arc::new(ResultCache::new(100, Duration::from_secs(3600), true)),
        NamespaceScope::All,
        Vec::new(),
        "hortator-system".to_string(),
        Arc::new(WarmPoolGate::default()),
    )
}

fn succeed_pod(fake: &FakeSubstrate, pod_name: &str, log_tail: &str) {
    fake.set_pod_state(pod_name, PodState::Succeeded);
    fake.set_pod_outcome(pod_name, PodOutcome { exit_code: Some(0), log_tail: log_tail.to_string() });
}

fn fail_pod(fake: &FakeSubstrate, pod_name: &str, exit_code: i32) {
    fake.set_pod_state(pod_name, PodState::Failed { exit_code: Some(exit_code) });
    fake.set_pod_outcome(pod_name, PodOutcome { exit_code: Some(exit_code), log_tail: String::new() });
}

fn result_block(body: &str) -> String {
    format!("{}{}{}", constants::RESULT_BEGIN_MARKER, body, constants::RESULT_END_MARKER)
}

async fn read_status(fake: &Arc<FakeSubstrate>, name: &str) -> hortator_core::TaskStatus {
    fake.get_task("default", name).await.unwrap().unwrap().status.unwrap_or_default()
}

/// Scenario 1 (§8 happy path): admission creates the worker pod and PVC,
/// then a completed pod drives the task to `Completed` with its result.
#[tokio::test]
async fn happy_path_runs_a_root_task_to_completion() {
    let fake = FakeSubstrate::new();
    let t = new_task("root", TaskSpecBuilder::new("summarize the quarterly report").build());
    fake.seed_task(t);
    let r = reconciler(fake.clone());

    r.reconcile("default", "root").await.unwrap();
    let status = read_status(&fake, "root").await;
    assert_eq!(status.phase, Phase::Running);
    let pod_name = status.pod_name.clone().unwrap();
    assert_eq!(fake.pod_count(), 1);
    assert!(fake.pvc_exists("root-storage"));

    succeed_pod(&fake, &pod_name, &format!("{}\nTokens: in=120 out=40", result_block("the report says X")));
    r.reconcile("default", "root").await.unwrap();

    let status = read_status(&fake, "root").await;
    assert_eq!(status.phase, Phase::Completed);
    assert_eq!(status.output.as_deref(), Some("the report says X"));
    assert_eq!(status.tokens_used.input, 120);
    assert_eq!(status.tokens_used.output, 40);
}

/// Scenario 2 (§8 cache hit): a second task with the same role/model/tier/
/// prompt as a previously-completed one is admitted straight to `Completed`
/// without ever creating a pod.
#[tokio::test]
async fn identical_prompt_is_served_from_the_result_cache() {
    let fake = FakeSubstrate::new();
    let spec = TaskSpecBuilder::new("translate this paragraph").build();

    let first = new_task("first", spec.clone());
    fake.seed_task(first);
    let r = reconciler(fake.clone());

    r.reconcile("default", "first").await.unwrap();
    let pod_name = read_status(&fake, "first").await.pod_name.unwrap();
    succeed_pod(&fake, &pod_name, &result_block("le paragraphe traduit"));
    r.reconcile("default", "first").await.unwrap();
    assert_eq!(read_status(&fake, "first").await.phase, Phase::Completed);

    let second = new_task("second", spec);
    fake.seed_task(second);
    r.reconcile("default", "second").await.unwrap();

    let status = read_status(&fake, "second").await;
    assert_eq!(status.phase, Phase::Completed);
    assert_eq!(status.output.as_deref(), Some("le paragraphe traduit"));
    // No new pod was created for the cache hit; only the first task's pod exists.
    assert_eq!(fake.pod_count(), 1);
}

/// Scenario 3 (§8 capability escalation refusal): a child declaring a
/// capability its parent doesn't effectively hold is rejected at admission.
#[tokio::test]
async fn child_declaring_an_uncontained_capability_is_rejected() {
    let fake = FakeSubstrate::new();
    let parent = new_task("parent", TaskSpecBuilder::new("coordinate").tier(hortator_core::Tier::Legionary).build());
    fake.seed_task(parent);
    let child =
        new_task("child", TaskSpecBuilder::new("spawn more work").parent("parent").capability("cluster-admin").build());
    fake.seed_task(child);

    let r = reconciler(fake.clone());
    r.reconcile("default", "child").await.unwrap();

    let status = read_status(&fake, "child").await;
    assert_eq!(status.phase, Phase::Failed);
    assert!(status.message.unwrap().contains("cluster-admin"));
    assert_eq!(fake.pod_count(), 0);
}

/// Scenario 4 (§8 retry-then-fail): a worker that exits non-zero every
/// attempt exhausts its retry budget and lands in `Failed`.
#[tokio::test]
async fn exhausting_retries_on_persistent_failure_lands_in_failed() {
    let fake = FakeSubstrate::new();
    let t = new_task("flaky", TaskSpecBuilder::new("do a flaky thing").max_attempts(2).build());
    fake.seed_task(t);
    let r = reconciler(fake.clone());

    r.reconcile("default", "flaky").await.unwrap();
    let mut pod_name = read_status(&fake, "flaky").await.pod_name.unwrap();

    for _ in 0..2 {
        fail_pod(&fake, &pod_name, 1);
        r.reconcile("default", "flaky").await.unwrap();
        let status = read_status(&fake, "flaky").await;
        if status.phase == Phase::Failed {
            break;
        }
        assert_eq!(status.phase, Phase::Retrying);
        // Re-entry from backoff hands back to Pending and clears pod_name,
        // admission then creates a fresh worker pod for the next attempt.
        r.reconcile("default", "flaky").await.unwrap();
        r.reconcile("default", "flaky").await.unwrap();
        pod_name = read_status(&fake, "flaky").await.pod_name.unwrap();
    }

    let status = read_status(&fake, "flaky").await;
    assert_eq!(status.phase, Phase::Failed);
    assert_eq!(status.attempts, 2);
}

/// Scenario 5 (§8 hierarchy budget cuts tree): once a root's accumulated
/// hierarchy token usage exceeds its declared budget, new children are
/// refused admission even though they have nothing to do with the task that
/// pushed the usage over.
#[tokio::test]
async fn hierarchy_budget_exhaustion_blocks_new_children() {
    let fake = FakeSubstrate::new();
    let mut root_spec = TaskSpecBuilder::new("coordinate a big job").tier(hortator_core::Tier::Tribune).build();
    root_spec.hierarchy_budget = Some(BudgetSpec { max_tokens: Some(100), max_cost_usd: None });
    let mut root = new_task("root", root_spec);
    root.status = Some(hortator_core::TaskStatus {
        phase: Phase::Running,
        hierarchy_tokens_used: Some(hortator_core::TokenUsage { input: 90, output: 20 }),
        ..Default::default()
    });
    fake.seed_task(root);

    let child = new_task(
        "child",
        TaskSpecBuilder::new("one more subtask").tier(hortator_core::Tier::Legionary).parent("root").build(),
    );
    fake.seed_task(child);

    let r = reconciler(fake.clone());
    r.reconcile("default", "child").await.unwrap();

    let status = read_status(&fake, "child").await;
    assert_eq!(status.phase, Phase::Failed);
    assert!(status.message.unwrap().contains("hierarchy token budget exhausted"));
}

/// Scenario 6 (§8 reincarnation): a tribune task that reports itself
/// `waiting` on children resumes into a fresh worker pod once every pending
/// child has reported its result back.
#[tokio::test]
async fn parent_reincarnates_once_all_pending_children_resolve() {
    let fake = FakeSubstrate::new();
    let parent = new_task("parent", TaskSpecBuilder::new("fan out and gather").tier(hortator_core::Tier::Tribune).build());
    fake.seed_task(parent);
    let r = reconciler(fake.clone());

    r.reconcile("default", "parent").await.unwrap();
    let first_pod = read_status(&fake, "parent").await.pod_name.unwrap();

    let waiting_payload = serde_json::json!({ "status": "waiting", "children": ["child-1"] }).to_string();
    succeed_pod(&fake, &first_pod, &result_block(&waiting_payload));
    r.reconcile("default", "parent").await.unwrap();
    assert_eq!(read_status(&fake, "parent").await.phase, Phase::Waiting);

    let child = new_task("child-1", TaskSpecBuilder::new("gather one fact").parent("parent").build());
    fake.seed_task(child);
    r.reconcile("default", "child-1").await.unwrap();
    let child_pod = read_status(&fake, "child-1").await.pod_name.unwrap();
    succeed_pod(&fake, &child_pod, &result_block("fact found"));
    r.reconcile("default", "child-1").await.unwrap();

    // The child's terminal reconcile struck it from the parent's
    // pendingChildren; one more parent reconcile now observes an empty list
    // and reincarnates into a new worker pod.
    r.reconcile("default", "parent").await.unwrap();
    let status = read_status(&fake, "parent").await;
    assert_eq!(status.phase, Phase::Running);
    assert_ne!(status.pod_name, Some(first_pod));
}
