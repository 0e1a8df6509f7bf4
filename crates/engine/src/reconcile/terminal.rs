//! Terminal-phase handling: hierarchy-budget accounting, parent
//! notification/child-result injection, result caching, and TTL GC
//! (§4.8, §4.10, §4.12, §4.13).

use super::{HandlerOutcome, Reconciler};
use crate::error::ReconcileError;
use crate::gc::{self, GcAction};
use crate::hierarchy;
use crate::injector::{self, ChildResultPayload};
use crate::result_cache::{cache_key, CachedResult};
use crate::trace::TraceEvent;
use hortator_core::{constants, Clock, Phase, Task, TaskStatus};
use hortator_substrate::pod_builder::build_writer_pod;
use hortator_substrate::Substrate;
use std::collections::HashMap;

pub(crate) async fn handle_terminal<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    namespace: &str,
    task: &Task,
) -> Result<HandlerOutcome, ReconcileError> {
    let name = task.metadata.name.clone().unwrap_or_default();
    let status = task.status.clone().unwrap_or_default();

    let already_accounted = task
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(constants::ANNOTATION_HIERARCHY_ACCOUNTED));
    let mut events = Vec::new();
    if !already_accounted {
        events.extend(propagate_to_root(reconciler, namespace, task).await?);
        notify_parent(reconciler, namespace, task, &status).await?;
        reconciler
            .substrate
            .set_annotation(namespace, &name, constants::ANNOTATION_HIERARCHY_ACCOUNTED, Some("true"))
            .await?;
    }

    if status.phase == Phase::Completed {
        maybe_cache_result(reconciler, task, &status);
    }

    let Some(completed_at) = status.completed_at else {
        return Ok(HandlerOutcome { status: None, requeue_after: None, events });
    };

    let annotations = task.metadata.annotations.clone().unwrap_or_default();
    let retain = gc::is_retain_exempt(&annotations);
    let retention_override = annotations.get(constants::ANNOTATION_RETENTION).map(String::as_str);
    let window = gc::retention_window(&reconciler.defaults.get().retention, status.phase, retention_override);

    match gc::decide(completed_at, reconciler.clock.now_utc(), window, retain) {
        GcAction::RequeueAfter(after) => Ok(HandlerOutcome { status: None, requeue_after: Some(after), events }),
        GcAction::Delete => {
            if !annotations.contains_key(constants::ANNOTATION_RETAIN_PVC) {
                reconciler.substrate.delete_pvc(namespace, &constants::storage_name(&name)).await?;
            }
            reconciler.substrate.delete_task(namespace, &name).await?;
            events.push(TraceEvent::TaskGarbageCollected { task: name });
            Ok(HandlerOutcome { status: None, requeue_after: None, events })
        }
    }
}

/// Add a terminated non-root task's usage to its root's hierarchy totals,
/// exactly once (§4.10).
async fn propagate_to_root<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    namespace: &str,
    task: &Task,
) -> Result<Vec<TraceEvent>, ReconcileError> {
    if task.spec.is_root() {
        return Ok(Vec::new());
    }
    let all_tasks = reconciler.substrate.list_tasks(namespace).await?;
    let by_name: HashMap<String, &Task> = all_tasks
        .iter()
        .filter_map(|t| t.metadata.name.clone().map(|n| (n, t)))
        .collect();
    let Some(root) = hierarchy::find_root(task, &by_name) else {
        return Ok(Vec::new());
    };
    let root_name = root.metadata.name.clone().unwrap_or_default();
    let delta = hierarchy::descendant_contribution(task);

    // Recomputed from the freshly read root on every retry (§9): two
    // descendants finishing concurrently must each add their own delta on
    // top of whatever the other already wrote, not clobber it.
    let written = reconciler
        .update_status_with_retry(namespace, &root_name, |mut root_status| {
            let mut tokens = root_status.hierarchy_tokens_used.unwrap_or_default();
            tokens.add(delta.tokens);
            root_status.hierarchy_tokens_used = Some(tokens);
            root_status.hierarchy_cost_used = Some(root_status.hierarchy_cost_used.unwrap_or(0.0) + delta.cost_usd);
            root_status
        })
        .await?;

    let Some(written) = written else {
        return Ok(Vec::new());
    };
    let tokens = written.hierarchy_tokens_used.unwrap_or_default();
    let cost = written.hierarchy_cost_used.unwrap_or(0.0);
    let Some(reason) =
        root.spec.hierarchy_budget.as_ref().and_then(|budget| hierarchy::exceeds_hierarchy_budget(&tokens, cost, budget))
    else {
        return Ok(Vec::new());
    };
    cancel_subtree(reconciler, namespace, &root_name, &all_tasks, &reason).await
}

/// Cancel every non-terminal task in the root's subtree once its hierarchy
/// budget is exhausted (§4.10 step 4).
async fn cancel_subtree<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    namespace: &str,
    root_name: &str,
    all_tasks: &[Task],
    reason: &str,
) -> Result<Vec<TraceEvent>, ReconcileError> {
    let mut events = Vec::new();
    for descendant in hierarchy::subtree_members(root_name, all_tasks) {
        let Some(descendant_name) = descendant.metadata.name.clone() else { continue };
        if descendant_name == root_name {
            continue;
        }
        let phase = descendant.status.as_ref().map(|s| s.phase).unwrap_or_default();
        if phase.is_terminal() {
            continue;
        }
        let now = reconciler.clock.now_utc();
        let reason = reason.to_string();
        reconciler
            .update_status_with_retry(namespace, &descendant_name, move |mut status| {
                // Re-check against the freshly read status: it may have
                // turned terminal on its own between the snapshot above and
                // this write landing.
                if status.phase.is_terminal() {
                    return status;
                }
                status.phase = Phase::Cancelled;
                status.message = Some(reason.clone());
                status.completed_at = Some(now);
                status
            })
            .await?;
        events.push(TraceEvent::TaskCancelled { task: descendant_name });
    }
    Ok(events)
}

/// Deliver the result to a waiting parent: a one-shot writer pod drops the
/// payload into the parent's PVC inbox, and the child is struck from the
/// parent's `pendingChildren` so reincarnation can proceed (§4.12).
async fn notify_parent<S: Substrate, C: Clock>(
    reconciler: &Reconciler<S, C>,
    namespace: &str,
    task: &Task,
    status: &TaskStatus,
) -> Result<(), ReconcileError> {
    let Some(parent_id) = task.spec.parent_task_id.as_deref().filter(|id| !id.is_empty()) else {
        return Ok(());
    };
    let Some(parent) = reconciler.substrate.get_task(namespace, parent_id).await? else {
        return Ok(());
    };
    let child_name = task.metadata.name.clone().unwrap_or_default();

    // Only agentic parents mount `/inbox` as a PVC subpath (§4.5, §4.12); a
    // basic-tier parent has nothing that would ever read a writer pod's
    // output, so one is never scheduled for it.
    if parent.spec.tier.is_agentic() {
        let payload = ChildResultPayload {
            task_id: child_name.clone(),
            status: status.phase.to_string(),
            output: status.output.clone(),
            message: status.message.clone(),
        };
        let payload_json = serde_json::to_string(&payload).map_err(|err| ReconcileError::Internal(err.to_string()))?;
        let (writer_pod_name, child_result_path) = injector::writer_pod_target(parent_id, &child_name);

        let defaults = reconciler.defaults.get();
        let pod = build_writer_pod(&parent, namespace, &writer_pod_name, &child_result_path, &payload_json, &defaults.pod.agentic_image);
        // A previous writer pod with the same name, if any, is deleted
        // first (§4.12) rather than relying on create's adopt-on-exists
        // behavior, since the payload itself may have changed.
        let _ = reconciler.substrate.delete_pod(namespace, &writer_pod_name).await;
        reconciler.substrate.create_pod(namespace, pod).await?;
    }

    reconciler
        .update_status_with_retry(namespace, parent_id, move |mut parent_status| {
            injector::record_child_task(&mut parent_status.child_tasks, &child_name);
            injector::remove_pending_child(&mut parent_status.pending_children, &child_name);
            parent_status
        })
        .await?;
    Ok(())
}

fn maybe_cache_result<S: Substrate, C: Clock>(reconciler: &Reconciler<S, C>, task: &Task, status: &TaskStatus) {
    let cache_disabled = task
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(constants::ANNOTATION_CACHE_DISABLE) || a.contains_key(constants::ANNOTATION_CACHE_HIT));
    if cache_disabled {
        return;
    }
    let Some(output) = &status.output else {
        return;
    };
    let key = cache_key(
        task.spec.role.as_deref().unwrap_or(""),
        task.spec.model.as_ref().map(|m| m.name.as_str()).unwrap_or(""),
        &task.spec.tier.to_string(),
        &task.spec.prompt,
    );
    reconciler.result_cache.put(
        key,
        CachedResult {
            output: output.clone(),
            tokens_used: status.tokens_used,
            estimated_cost_usd: status.estimated_cost_usd,
        },
    );
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
