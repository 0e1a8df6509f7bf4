//! Running/Retrying-phase handling: pod polling, stuck detection, retry
//! classification, and reincarnation fan-out (§4.7, §4.11, §4.12).

use super::{HandlerOutcome, Reconciler};
use crate::defaults_cache::StuckAction;
use crate::error::ReconcileError;
use crate::injector;
use crate::retry;
use crate::stuck;
use crate::trace::TraceEvent;
use hortator_core::{constants, AttemptRecord, Clock, Phase, Task, TaskStatus};
use hortator_substrate::log_parse::{self, StatusMarker};
use hortator_substrate::{PodOutcome, PodState, Substrate};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub(crate) async fn handle_running<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    namespace: &str,
    task: &Task,
) -> Result<HandlerOutcome, ReconcileError> {
    let name = task.metadata.name.clone().unwrap_or_default();
    let status = task.status.clone().unwrap_or_default();
    let pod_name = status.pod_name.clone().unwrap_or_else(|| name.clone());

    if let (Some(timeout_seconds), Some(started_at)) = (task.spec.timeout_seconds, status.started_at) {
        let elapsed = (reconciler.clock.now_utc() - started_at).num_seconds().max(0) as u64;
        if elapsed >= timeout_seconds {
            let _ = reconciler.substrate.delete_pod(namespace, &pod_name).await;
            return Ok(terminate(
                status,
                &reconciler.clock,
                Phase::TimedOut,
                format!("task exceeded timeout of {timeout_seconds}s"),
                TraceEvent::TaskFailed { task: name, reason: format!("timed out after {timeout_seconds}s") },
            ));
        }
    }

    let pod_outcome = reconciler.substrate.get_pod_outcome(namespace, &pod_name).await?;
    let pod_state = reconciler.substrate.get_pod_state(namespace, &pod_name).await?;

    if let Some(outcome) = &pod_outcome {
        if let Some(stuck_outcome) = check_stuck(reconciler, namespace, task, &status, &name, &pod_name, outcome).await? {
            return Ok(stuck_outcome);
        }
    }

    match pod_state {
        Some(PodState::Succeeded) | Some(PodState::Failed { .. }) => {
            let outcome = pod_outcome.unwrap_or_default();
            Ok(on_terminated(reconciler, task, &status, &name, &outcome))
        }
        None => Ok(terminate(
            status,
            &reconciler.clock,
            Phase::Failed,
            "worker pod disappeared unexpectedly".to_string(),
            TraceEvent::TaskFailed { task: name, reason: "worker pod disappeared unexpectedly".to_string() },
        )),
        _ => Ok(HandlerOutcome::requeue(POLL_INTERVAL)),
    }
}

/// Evaluate the stuck detector against whatever log tail the substrate
/// currently exposes (available before termination when the runtime streams
/// it, §4.11, §9). Returns `Some` only when the configured action changes
/// the task's status.
async fn check_stuck<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    namespace: &str,
    task: &Task,
    status: &TaskStatus,
    name: &str,
    pod_name: &str,
    outcome: &PodOutcome,
) -> Result<Option<HandlerOutcome>, ReconcileError> {
    let role = match &task.spec.role {
        Some(role_name) => reconciler.substrate.get_role(namespace, role_name).await?,
        None => None,
    };
    let role_health = role.as_ref().map(|r| hortator_core::HealthSpec {
        min_tool_diversity: r.spec.min_tool_diversity,
        max_repeated_run: r.spec.max_repeated_run,
        stale_minutes: r.spec.stale_minutes,
    });
    let cluster = reconciler.defaults.get().stuck;
    let config = stuck::layer_config(&cluster, role_health.as_ref(), &task.spec.health);

    let unique_tools = log_parse::unique_tool_count(&outcome.log_tail);
    let max_run = log_parse::max_repeated_run(&outcome.log_tail);
    let staleness_minutes = staleness_minutes(task, &reconciler.clock);
    let score = stuck::score(&config, unique_tools, max_run, staleness_minutes);

    if !score.is_stuck() {
        return Ok(None);
    }

    let reason = stuck::diagnostic_reason(&score);
    match config.action {
        StuckAction::Warn => Ok(Some(HandlerOutcome {
            status: None,
            requeue_after: Some(POLL_INTERVAL),
            events: vec![TraceEvent::HealthStuckDetected { task: name.to_string(), score: score.aggregate }],
        })),
        StuckAction::Kill => {
            let _ = reconciler.substrate.delete_pod(namespace, pod_name).await;
            Ok(Some(terminate(
                status.clone(),
                &reconciler.clock,
                Phase::Failed,
                reason.clone(),
                TraceEvent::HealthStuckKilled { task: name.to_string(), reason },
            )))
        }
        StuckAction::Escalate => {
            let _ = reconciler.substrate.delete_pod(namespace, pod_name).await;
            Ok(Some(terminate(
                status.clone(),
                &reconciler.clock,
                Phase::Failed,
                reason.clone(),
                TraceEvent::HealthStuckEscalated { task: name.to_string(), reason },
            )))
        }
    }
}

fn staleness_minutes<C: Clock>(task: &Task, clock: &C) -> u32 {
    let Some(raw) = task.metadata.annotations.as_ref().and_then(|a| a.get(constants::ANNOTATION_LAST_PROGRESS)) else {
        return 0;
    };
    let Ok(last_progress) = chrono::DateTime::parse_from_rfc3339(raw) else {
        return 0;
    };
    let elapsed = clock.now_utc() - last_progress.with_timezone(&chrono::Utc);
    elapsed.num_minutes().max(0) as u32
}

fn on_terminated<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    task: &Task,
    status: &TaskStatus,
    name: &str,
    outcome: &PodOutcome,
) -> HandlerOutcome {
    if let Some(marker) = log_parse::extract_status_marker(&outcome.log_tail) {
        return match marker {
            StatusMarker::BudgetExceeded => terminate(
                status.clone(),
                &reconciler.clock,
                Phase::BudgetExceeded,
                "agent reported budget exceeded".to_string(),
                TraceEvent::TaskBudgetExceeded { task: name.to_string(), reason: "agent reported budget exceeded".to_string() },
            ),
            StatusMarker::Waiting => {
                let payload = log_parse::extract_result_block(&outcome.log_tail).unwrap_or_default();
                let children = log_parse::extract_waiting_children(&payload);
                let mut next = status.clone();
                for child in &children {
                    injector::add_pending_child(&mut next.pending_children, child);
                }
                next.phase = Phase::Waiting;
                HandlerOutcome {
                    status: Some(next),
                    requeue_after: Some(POLL_INTERVAL),
                    events: vec![TraceEvent::TaskWaiting { task: name.to_string(), pending_children: children.len() as u32 }],
                }
            }
        };
    }

    if retry::is_transient_failure(outcome.exit_code) {
        return on_transient_failure(reconciler, task, status, name, outcome);
    }

    let mut next = status.clone();
    if let Some(result) = log_parse::extract_result_block(&outcome.log_tail) {
        next.set_output(result);
    }
    if let Some(tokens) = log_parse::extract_token_usage(&outcome.log_tail) {
        next.tokens_used = tokens;
    }
    next.estimated_cost_usd = Some(reconciler.price_map.estimate_cost(
        task.spec.model.as_ref().map(|m| m.name.as_str()),
        next.tokens_used.input,
        next.tokens_used.output,
    ));
    next.phase = Phase::Completed;
    let completed_at = reconciler.clock.now_utc();
    next.completed_at = Some(completed_at);
    if let Some(started) = next.started_at {
        next.duration_seconds = Some((completed_at - started).num_seconds().max(0) as u64);
    }
    HandlerOutcome {
        status: Some(next),
        requeue_after: None,
        events: vec![TraceEvent::TaskCompleted { task: name.to_string() }],
    }
}

fn on_transient_failure<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    task: &Task,
    status: &TaskStatus,
    name: &str,
    outcome: &PodOutcome,
) -> HandlerOutcome {
    let mut next = status.clone();
    next.attempts += 1;
    next.history.push(AttemptRecord {
        attempt: next.attempts,
        started_at: status.started_at,
        ended_at: Some(reconciler.clock.now_utc()),
        exit_code: outcome.exit_code,
        reason: Some("worker exited non-zero".to_string()),
    });

    if retry::can_retry(&task.spec.retry, next.attempts) {
        let backoff = retry::backoff_with_jitter(&task.spec.retry, next.attempts - 1);
        next.phase = Phase::Retrying;
        let backoff_chrono = chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::zero());
        next.next_retry_time = Some(reconciler.clock.now_utc() + backoff_chrono);
        HandlerOutcome {
            status: Some(next.clone()),
            requeue_after: Some(backoff),
            events: vec![TraceEvent::TaskRetrying { task: name.to_string(), attempt: next.attempts }],
        }
    } else {
        let reason = format!("worker exited with code {:?} after {} attempt(s)", outcome.exit_code, next.attempts);
        next.phase = Phase::Failed;
        next.message = Some(reason.clone());
        next.completed_at = Some(reconciler.clock.now_utc());
        HandlerOutcome {
            status: Some(next),
            requeue_after: None,
            events: vec![TraceEvent::TaskFailed { task: name.to_string(), reason }],
        }
    }
}

fn terminate<C: Clock>(
    mut status: TaskStatus,
    clock: &C,
    phase: Phase,
    message: String,
    event: TraceEvent,
) -> HandlerOutcome {
    status.phase = phase;
    status.message = Some(message);
    status.completed_at = Some(clock.now_utc());
    HandlerOutcome { status: Some(status), requeue_after: None, events: vec![event] }
}

/// Re-entry from backoff: once `nextRetryTime` has elapsed, hand back to
/// Pending so the admission handler builds a fresh worker pod (§4.7).
pub(crate) fn handle_retrying<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    task: &Task,
) -> Result<HandlerOutcome, ReconcileError> {
    let mut status = task.status.clone().unwrap_or_default();
    let Some(next_retry) = status.next_retry_time else {
        status.phase = Phase::Pending;
        return Ok(HandlerOutcome { status: Some(status), requeue_after: None, events: Vec::new() });
    };
    if reconciler.clock.now_utc() < next_retry {
        let wait = (next_retry - reconciler.clock.now_utc()).to_std().unwrap_or(Duration::ZERO);
        return Ok(HandlerOutcome::requeue(wait));
    }
    status.phase = Phase::Pending;
    status.next_retry_time = None;
    status.pod_name = None;
    Ok(HandlerOutcome { status: Some(status), requeue_after: Some(Duration::ZERO), events: Vec::new() })
}

#[cfg(test)]
#[path = "running_tests.rs"]
mod tests;
