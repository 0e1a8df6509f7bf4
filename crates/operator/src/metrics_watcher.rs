//! Derives the Prometheus series from observed cluster state rather than
//! hooking into the reconciler's internals, keeping `hortator-engine`
//! substrate-and-clock-agnostic with no knowledge of metrics at all.
//!
//! Two independent `kube::runtime::watcher` streams feed this: one over
//! `Task` objects (phase transitions drive `tasks_total`/`tasks_active`),
//! one over the `Event` objects the substrate already writes for every
//! trace event (their `reason` field drives `stuck_detected_total`).

use futures::StreamExt;
use hortator_core::{Phase, Task};
use k8s_openapi::api::core::v1::Event as K8sEvent;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use tracing::warn;

use crate::health::Readiness;
use crate::metrics::metrics;

/// Runs until the watch stream ends (normally: forever, via the operator's
/// top-level `tokio::select!`). Maintains a local phase table so
/// `tasks_total` only increments on a transition *into* a terminal phase,
/// not on every resync of an already-terminal task.
pub async fn watch_tasks(client: Client, readiness: Readiness) {
    let api: Api<Task> = Api::all(client);
    let mut last_phase: HashMap<String, Phase> = HashMap::new();
    let mut stream = Box::pin(watcher(api, watcher::Config::default()).default_backoff().applied_objects());

    while let Some(event) = stream.next().await {
        match event {
            Ok(task) => {
                observe_task(&mut last_phase, &task);
                readiness.mark_ready();
            }
            Err(err) => warn!(error = %err, "task metrics watch error"),
        }
    }
}

fn observe_task(last_phase: &mut HashMap<String, Phase>, task: &Task) {
    let key = format!("{}/{}", task.namespace().unwrap_or_default(), task.name_any());
    let phase = task.status.as_ref().map(|s| s.phase).unwrap_or_default();

    let previous = last_phase.insert(key, phase);
    if previous != Some(phase) && phase.is_terminal() {
        metrics().tasks_total.with_label_values(&[&phase.to_string()]).inc();
        if phase == Phase::BudgetExceeded {
            metrics().budget_exceeded_total.inc();
        }
        if let Some(status) = &task.status {
            if let Some(duration) = status.duration_seconds {
                metrics().task_duration_seconds.observe(duration as f64);
            }
            if let Some(cost) = status.estimated_cost_usd {
                metrics().task_cost_usd.observe(cost);
            }
        }
    }

    metrics().tasks_active.set(last_phase.values().filter(|p| **p == Phase::Running).count() as f64);
}

pub async fn watch_stuck_events(client: Client) {
    let api: Api<K8sEvent> = Api::all(client);
    let mut stream = Box::pin(watcher(api, watcher::Config::default()).default_backoff().applied_objects());

    while let Some(event) = stream.next().await {
        match event {
            Ok(k8s_event) => observe_event(&k8s_event),
            Err(err) => warn!(error = %err, "event metrics watch error"),
        }
    }
}

fn observe_event(event: &K8sEvent) {
    let action = match event.reason.as_deref() {
        Some("health.stuck_detected") => "warn",
        Some("health.stuck_killed") => "kill",
        Some("health.stuck_escalated") => "escalate",
        _ => return,
    };
    metrics().stuck_detected_total.with_label_values(&[action]).inc();
}
