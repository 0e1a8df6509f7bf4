use super::*;
use crate::defaults_cache::{ClusterDefaults, DefaultsCache, StuckAction};
use crate::result_cache::ResultCache;
use hortator_core::test_support::TaskSpecBuilder;
use hortator_core::{Clock, FakeClock, HealthSpec, Phase, TaskStatus};
use hortator_substrate::fake::FakeSubstrate;
use hortator_substrate::{PodOutcome, PodState};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;
use std::time::Duration;

fn task(name: &str, spec_builder: TaskSpecBuilder, status: TaskStatus) -> Task {
    Task {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: spec_builder.build(),
        status: Some(status),
    }
}

fn running_status(pod_name: &str, started_at: chrono::DateTime<chrono::Utc>) -> TaskStatus {
    TaskStatus {
        phase: Phase::Running,
        pod_name: Some(pod_name.to_string()),
        started_at: Some(started_at),
        ..Default::default()
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

#[tokio::test]
async fn times_out_a_task_past_its_deadline() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let started_at = r.clock.now_utc();
    r.clock.advance(Duration::from_secs(120));

    let t = task("t", TaskSpecBuilder::new("hi").tier(hortator_core::Tier::Legionary), running_status("t", started_at));
    let mut spec = t.spec.clone();
    spec.timeout_seconds = Some(60);
    let t = Task { spec, ..t };
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Running);

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::TimedOut);
    assert!(status.message.unwrap().contains("timeout"));
}

#[tokio::test]
async fn requeues_while_the_pod_is_still_running_and_healthy() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let t = task("t", TaskSpecBuilder::new("hi"), running_status("t", r.clock.now_utc()));
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Running);

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    assert!(outcome.status.is_none());
    assert!(outcome.requeue_after.is_some());
}

#[tokio::test]
async fn fails_when_the_pod_disappears_unexpectedly() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let t = task("t", TaskSpecBuilder::new("hi"), running_status("t", r.clock.now_utc()));
    fake.seed_task(t.clone());

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Failed);
    assert!(status.message.unwrap().contains("disappeared"));
}

#[tokio::test]
async fn extracts_result_and_tokens_on_a_clean_completion() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let t = task("t", TaskSpecBuilder::new("hi"), running_status("t", r.clock.now_utc()));
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Succeeded);
    fake.set_pod_outcome(
        "t",
        PodOutcome {
            exit_code: Some(0),
            log_tail: "Tokens: in=10 out=20\n[hortator-result-begin]\nall done\n[hortator-result-end]\n".to_string(),
        },
    );

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Completed);
    assert_eq!(status.output.as_deref(), Some("all done"));
    assert_eq!(status.tokens_used.input, 10);
    assert_eq!(status.tokens_used.output, 20);
    assert!(status.estimated_cost_usd.unwrap() > 0.0);
}

#[tokio::test]
async fn transitions_to_budget_exceeded_on_the_status_marker() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let t = task("t", TaskSpecBuilder::new("hi"), running_status("t", r.clock.now_utc()));
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Succeeded);
    fake.set_pod_outcome(
        "t",
        PodOutcome { exit_code: Some(0), log_tail: "\"status\": \"budget_exceeded\"".to_string() },
    );

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::BudgetExceeded);
}

#[tokio::test]
async fn transitions_to_waiting_and_records_pending_children_on_the_status_marker() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let t = task("t", TaskSpecBuilder::new("hi"), running_status("t", r.clock.now_utc()));
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Succeeded);
    let log = format!(
        "\"status\": \"waiting\"\n[hortator-result-begin]\n{{\"children\": [\"c1\", \"c2\"]}}\n[hortator-result-end]\n"
    );
    fake.set_pod_outcome("t", PodOutcome { exit_code: Some(0), log_tail: log });

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Waiting);
    assert_eq!(status.pending_children, vec!["c1".to_string(), "c2".to_string()]);
}

#[tokio::test]
async fn schedules_a_retry_on_a_transient_non_zero_exit() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let spec = TaskSpecBuilder::new("hi").max_attempts(3);
    let t = task("t", spec, running_status("t", r.clock.now_utc()));
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Failed { exit_code: Some(1) });
    fake.set_pod_outcome("t", PodOutcome { exit_code: Some(1), log_tail: String::new() });

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Retrying);
    assert_eq!(status.attempts, 1);
    assert_eq!(status.history.len(), 1);
    assert!(outcome.requeue_after.is_some());
}

#[tokio::test]
async fn fails_once_retries_are_exhausted() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let spec = TaskSpecBuilder::new("hi").max_attempts(1);
    let mut status = running_status("t", r.clock.now_utc());
    status.attempts = 1;
    let t = task("t", spec, status);
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Failed { exit_code: Some(1) });
    fake.set_pod_outcome("t", PodOutcome { exit_code: Some(1), log_tail: String::new() });

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Failed);
    assert_eq!(status.attempts, 2);
}

#[tokio::test]
async fn warns_without_changing_status_when_stuck_action_is_warn() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let spec = TaskSpecBuilder::new("hi");
    let t = task("t", spec, running_status("t", r.clock.now_utc()));
    let mut t = t;
    t.spec.health = HealthSpec { min_tool_diversity: Some(10), max_repeated_run: None, stale_minutes: None };
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Running);
    fake.set_pod_outcome(
        "t",
        PodOutcome {
            exit_code: None,
            log_tail: "[tool] a\n[tool] a\n[tool] a\n".to_string(),
        },
    );

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    assert!(outcome.status.is_none());
    assert!(outcome.events.iter().any(|e| matches!(e, TraceEvent::HealthStuckDetected { .. })));
}

#[tokio::test]
async fn kills_the_pod_when_stuck_action_is_kill() {
    let fake = FakeSubstrate::new();
    let mut defaults = ClusterDefaults::default();
    defaults.stuck.action = StuckAction::Kill;
    let r = Reconciler::new(
        fake.clone(),
        FakeClock::new(),
        Arc::new(DefaultsCache::new(defaults)),
        Arc::new(ResultCache::new(100, Duration::from_secs(3600), true)),
        NamespaceScope::All,
        Vec::new(),
        "hortator-system".to_string(),
        Arc::new(WarmPoolGate::default()),
    );
    let mut t = task("t", TaskSpecBuilder::new("hi"), running_status("t", r.clock.now_utc()));
    t.spec.health = HealthSpec { min_tool_diversity: Some(10), max_repeated_run: None, stale_minutes: None };
    fake.seed_task(t.clone());
    fake.set_pod_state("t", PodState::Running);
    fake.set_pod_outcome(
        "t",
        PodOutcome {
            exit_code: None,
            log_tail: "[tool] a\n[tool] a\n[tool] a\n".to_string(),
        },
    );

    let outcome = handle_running(&r, "default", &t).await.unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Failed);
    assert_eq!(fake.pod_count(), 0);
}

#[tokio::test]
async fn handle_retrying_requeues_until_the_backoff_elapses() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let mut status = TaskStatus { phase: Phase::Retrying, ..Default::default() };
    status.next_retry_time = Some(r.clock.now_utc() + chrono::Duration::seconds(30));
    let t = task("t", TaskSpecBuilder::new("hi"), status);

    let outcome = handle_retrying(&r, &t).unwrap();
    assert!(outcome.status.is_none());
    assert!(outcome.requeue_after.unwrap() > Duration::from_secs(0));
}

#[tokio::test]
async fn handle_retrying_returns_to_pending_once_the_backoff_elapses() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let mut status = TaskStatus { phase: Phase::Retrying, ..Default::default() };
    status.next_retry_time = Some(r.clock.now_utc() - chrono::Duration::seconds(1));
    status.pod_name = Some("stale-pod".to_string());
    let t = task("t", TaskSpecBuilder::new("hi"), status);

    let outcome = handle_retrying(&r, &t).unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Pending);
    assert!(status.pod_name.is_none());
    assert!(status.next_retry_time.is_none());
}

#[tokio::test]
async fn handle_retrying_without_a_next_retry_time_falls_back_to_pending() {
    let fake = FakeSubstrate::new();
    let r = reconciler(fake.clone());
    let status = TaskStatus { phase: Phase::Retrying, ..Default::default() };
    let t = task("t", TaskSpecBuilder::new("hi"), status);

    let outcome = handle_retrying(&r, &t).unwrap();
    let status = outcome.status.unwrap();
    assert_eq!(status.phase, Phase::Pending);
}
