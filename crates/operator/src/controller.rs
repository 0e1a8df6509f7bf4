//! Wires the reconciler into `kube::runtime::Controller`'s level-triggered
//! watch/applier loop (§4.1, §5). Metrics are derived independently by
//! [`crate::metrics_watcher`] rather than threaded through here, so this
//! stays a thin translation from `Reconciler::reconcile`'s return value to
//! the controller's `Action`.

use futures::StreamExt;
use hortator_core::Task;
use hortator_engine::{ReconcileError, Reconciler};
use hortator_substrate::Substrate;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub async fn run<S: Substrate>(client: Client, reconciler: Arc<Reconciler<S, hortator_core::SystemClock>>, concurrency: u16) {
    let tasks: Api<Task> = Api::all(client);

    Controller::new(tasks, watcher::Config::default())
        .concurrency(concurrency as u32)
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, _action)) => info!(task = %object.name, "reconciled"),
                Err(err) => error!(error = %err, "reconcile failed"),
            }
        })
        .await;
}

async fn reconcile<S: Substrate>(
    task: Arc<Task>,
    reconciler: Arc<Reconciler<S, hortator_core::SystemClock>>,
) -> Result<Action, ReconcileError> {
    let namespace = task.metadata.namespace.as_deref().unwrap_or("default");
    let name = task.metadata.name.as_deref().unwrap_or_default();

    let requeue_after = reconciler.reconcile(namespace, name).await?;

    Ok(match requeue_after {
        Some(after) => Action::requeue(after),
        None => Action::await_change(),
    })
}

fn error_policy<S: Substrate>(
    _task: Arc<Task>,
    err: &ReconcileError,
    _reconciler: Arc<Reconciler<S, hortator_core::SystemClock>>,
) -> Action {
    error!(error = %err, "reconcile error, requeuing with backoff");
    Action::requeue(err.requeue_after().unwrap_or(Duration::from_secs(30)))
}
