//! Pending-phase admission and dispatch into a running worker (§4.1 step 6,
//! §4.3, §4.4, §4.6, §4.8, §4.10).

use super::{HandlerOutcome, Reconciler};
use crate::error::ReconcileError;
use crate::hierarchy;
use crate::injector;
use crate::policy;
use crate::result_cache::cache_key;
use crate::trace::TraceEvent;
use crate::warm_pool;
use hortator_core::{check_escalation, constants, Clock, EscalationCheck, Phase, Role, Task, TaskStatus};
use hortator_substrate::pod_builder::build_worker_pod;
use hortator_substrate::pvc::build_pvc;
use hortator_substrate::Substrate;
use std::collections::{BTreeSet, HashMap};

pub(crate) async fn handle_pending<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    namespace: &str,
    task: &Task,
) -> Result<HandlerOutcome, ReconcileError> {
    let name = task.metadata.name.clone().unwrap_or_default();

    if !reconciler.scope.allows(namespace) {
        return Ok(admit_failure(&name, "task's namespace is outside the operator's watch scope".to_string(), reconciler.clock.now_utc()));
    }

    let child_role = match task.spec.role.as_deref() {
        Some(role_name) => reconciler.substrate.get_role(namespace, role_name).await?,
        None => None,
    };
    let child_declared = merged_capabilities(&task.spec.capabilities, child_role.as_ref());

    let mut parent: Option<Task> = None;
    if let Some(parent_id) = task.spec.parent_task_id.as_deref().filter(|id| !id.is_empty()) {
        let Some(found) = reconciler.substrate.get_task(namespace, parent_id).await? else {
            return Ok(admit_failure(&name, format!("parent task '{parent_id}' not found"), reconciler.clock.now_utc()));
        };
        let parent_role = match found.spec.role.as_deref() {
            Some(role_name) => reconciler.substrate.get_role(namespace, role_name).await?,
            None => None,
        };
        let parent_declared = merged_capabilities(&found.spec.capabilities, parent_role.as_ref());
        if let EscalationCheck::Denied { denied_capability, parent_effective } =
            check_escalation(&child_declared, found.spec.tier, &parent_declared)
        {
            return Ok(admit_failure(&name, hortator_core::escalation_message(&denied_capability, &parent_effective), reconciler.clock.now_utc()));
        }
        parent = Some(found);
    }

    // Register with the parent before proceeding (§4.12 re-entry safety):
    // a waiting parent's Waiting→Pending transition only fires once
    // `pendingChildren` drains, so a new generation of children must be
    // recorded before this child can itself be admitted.
    if let Some(parent) = &parent {
        let parent_name = parent.metadata.name.clone().unwrap_or_default();
        let child_name = name.clone();
        reconciler
            .update_status_with_retry(namespace, &parent_name, move |mut parent_status| {
                injector::add_pending_child(&mut parent_status.pending_children, &child_name);
                parent_status
            })
            .await?;
    }

    let all_tasks = reconciler.substrate.list_tasks(namespace).await?;
    let running_in_namespace = all_tasks
        .iter()
        .filter(|t| matches!(t.status.as_ref().map(|s| s.phase), Some(Phase::Running)))
        .count() as u32;
    if let Some(reason) = policy::check_admission(&task.spec, &reconciler.policies, running_in_namespace) {
        return Ok(admit_failure(&name, reason, reconciler.clock.now_utc()));
    }

    if let Some(parent) = &parent {
        let by_name: HashMap<String, &Task> = all_tasks
            .iter()
            .filter_map(|t| t.metadata.name.clone().map(|n| (n, t)))
            .collect();
        if let Some(root) = hierarchy::find_root(parent, &by_name) {
            if let Some(budget) = &root.spec.hierarchy_budget {
                let usage = root.status.as_ref().and_then(|s| s.hierarchy_tokens_used).unwrap_or_default();
                let cost = root.status.as_ref().and_then(|s| s.hierarchy_cost_used).unwrap_or(0.0);
                if let Some(reason) = hierarchy::exceeds_hierarchy_budget(&usage, cost, budget) {
                    return Ok(admit_failure(&name, reason, reconciler.clock.now_utc()));
                }
            }
        }
    }

    let cache_disabled = task
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(constants::ANNOTATION_CACHE_DISABLE));
    if !cache_disabled {
        let key = cache_key(
            task.spec.role.as_deref().unwrap_or(""),
            task.spec.model.as_ref().map(|m| m.name.as_str()).unwrap_or(""),
            &task.spec.tier.to_string(),
            &task.spec.prompt,
        );
        if let Some(cached) = reconciler.result_cache.get(&key) {
            reconciler
                .substrate
                .set_annotation(namespace, &name, constants::ANNOTATION_CACHE_HIT, Some(&key[..16]))
                .await?;
            let mut status = TaskStatus { phase: Phase::Completed, ..Default::default() };
            status.set_output(cached.output);
            status.tokens_used = cached.tokens_used;
            status.estimated_cost_usd = cached.estimated_cost_usd;
            status.completed_at = Some(reconciler.clock.now_utc());
            status.started_at = status.completed_at;
            status.duration_seconds = Some(0);
            return Ok(HandlerOutcome {
                status: Some(status),
                requeue_after: None,
                events: vec![TraceEvent::TaskCompletedCached { task: name.clone(), cache_key_prefix: key[..16].to_string() }],
            });
        }
    }

    let defaults = reconciler.defaults.get();

    let claimed = if defaults.warm_pool.target_idle > 0 {
        match warm_pool::claim(reconciler.substrate.as_ref(), &reconciler.operator_namespace, task).await {
            Ok(claimed) => claimed,
            Err(err) => {
                tracing::warn!(error = %err, "warm pool claim failed, falling back to cold start");
                None
            }
        }
    } else {
        None
    };

    let pod_name = if let Some(pod_name) = claimed {
        pod_name
    } else {
        reconciler.substrate.ensure_pvc(namespace, build_pvc(task, namespace)).await?;
        let pod = build_worker_pod(task, namespace, &defaults.pod)?;
        let pod_name = pod.metadata.name.clone().unwrap_or_default();
        match reconciler.substrate.create_pod(namespace, pod).await {
            Ok(()) => {}
            Err(hortator_substrate::SubstrateError::AlreadyExists(_)) => {}
            Err(err) => return Err(err.into()),
        }
        pod_name
    };

    let status = TaskStatus {
        phase: Phase::Running,
        pod_name: Some(pod_name),
        started_at: Some(reconciler.clock.now_utc()),
        ..Default::default()
    };

    Ok(HandlerOutcome {
        status: Some(status),
        requeue_after: Some(std::time::Duration::from_secs(5)),
        events: vec![TraceEvent::TaskCreated { task: name.clone() }, TraceEvent::TaskStarted { task: name }],
    })
}

/// Union a task's own declared capabilities with the defaults granted by
/// its role, if any (§4.2, §4.4).
fn merged_capabilities(declared: &BTreeSet<String>, role: Option<&Role>) -> BTreeSet<String> {
    let mut merged = declared.clone();
    if let Some(role) = role {
        merged.extend(role.spec.default_capabilities.iter().cloned());
    }
    merged
}

fn admit_failure(task_name: &str, reason: String, now: chrono::DateTime<chrono::Utc>) -> HandlerOutcome {
    let status = TaskStatus {
        phase: Phase::Failed,
        message: Some(reason.clone()),
        completed_at: Some(now),
        ..Default::default()
    };
    HandlerOutcome {
        status: Some(status),
        requeue_after: None,
        events: vec![TraceEvent::TaskFailed { task: task_name.to_string(), reason }],
    }
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
