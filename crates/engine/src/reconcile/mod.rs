//! Reconciler orchestration: the phase dispatcher, optimistic-concurrency
//! status updates, and finalizer lifecycle (§4.1, §4.14).

mod admission;
mod running;
mod terminal;
mod waiting;

use crate::defaults_cache::{ClusterDefaults, DefaultsCache};
use crate::error::ReconcileError;
use crate::policy::AdmissionPolicy;
use crate::price_map::{self, PriceMap};
use crate::result_cache::ResultCache;
use crate::trace::TraceEvent;
use crate::warm_pool::{self, WarmPoolGate};
use hortator_core::{constants, Clock, Phase, Task, TaskStatus};
use hortator_substrate::{Substrate, SubstrateError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info_span, warn, Instrument};

const MAX_STATUS_WRITE_ATTEMPTS: u32 = 5;

/// Which namespaces this operator instance watches (§4.18).
#[derive(Debug, Clone)]
pub enum NamespaceScope {
    All,
    Allowed(BTreeSet<String>),
}

impl NamespaceScope {
    pub fn allows(&self, namespace: &str) -> bool {
        match self {
            NamespaceScope::All => true,
            NamespaceScope::Allowed(set) => set.contains(namespace),
        }
    }
}

/// What a phase handler wants done after a single reconcile pass. Substrate
/// side effects (pod/PVC creation, deletion) are performed directly by the
/// handler; only the status write goes through the conflict-retry loop
/// (§4.1, §4.14).
#[derive(Debug, Default)]
pub(crate) struct HandlerOutcome {
    pub status: Option<TaskStatus>,
    pub requeue_after: Option<Duration>,
    pub events: Vec<TraceEvent>,
}

impl HandlerOutcome {
    fn requeue(after: Duration) -> Self {
        Self { requeue_after: Some(after), ..Default::default() }
    }
}

/// Shared collaborators a reconcile pass needs, constructed once per
/// operator process and shared (via `Arc`) across concurrently reconciled
/// tasks (§4.1, §4.2, §4.8, §5).
pub struct Reconciler<S: Substrate, C: Clock> {
    pub substrate: Arc<S>,
    pub clock: C,
    pub defaults: Arc<DefaultsCache>,
    pub result_cache: Arc<ResultCache>,
    pub price_map: Arc<PriceMap>,
    pub scope: NamespaceScope,
    pub policies: Vec<AdmissionPolicy>,
    /// Namespace the warm pool's pods/PVCs live in (§4.9), independent of
    /// whichever task namespace is currently being reconciled.
    pub operator_namespace: String,
    pub warm_pool_gate: Arc<WarmPoolGate>,
}

impl<S: Substrate, C: Clock> Reconciler<S, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        substrate: Arc<S>,
        clock: C,
        defaults: Arc<DefaultsCache>,
        result_cache: Arc<ResultCache>,
        scope: NamespaceScope,
        policies: Vec<AdmissionPolicy>,
        operator_namespace: String,
        warm_pool_gate: Arc<WarmPoolGate>,
    ) -> Self {
        Self {
            substrate,
            clock,
            defaults,
            result_cache,
            price_map: Arc::new(PriceMap::default()),
            scope,
            policies,
            operator_namespace,
            warm_pool_gate,
        }
    }

    /// Override the default price map, e.g. with one seeded from a real
    /// `hortator-model-prices` `ConfigMap` at operator startup.
    pub fn with_price_map(mut self, price_map: Arc<PriceMap>) -> Self {
        self.price_map = price_map;
        self
    }

    /// Run one reconcile pass for `name` in `namespace` (§4.1). The returned
    /// duration, if any, is a requeue-after hint for the controller runtime.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Option<Duration>, ReconcileError> {
        let span = info_span!("reconcile", task = %name, namespace = %namespace);
        self.reconcile_inner(namespace, name).instrument(span).await
    }

    async fn reconcile_inner(&self, namespace: &str, name: &str) -> Result<Option<Duration>, ReconcileError> {
        if self.defaults.is_stale() {
            self.refresh_defaults(namespace).await;
        }
        if self.price_map.is_stale() {
            self.refresh_price_map(namespace).await;
        }

        if self.warm_pool_gate.try_enter() {
            self.replenish_warm_pool().await;
        }

        let Some(task) = self.substrate.get_task(namespace, name).await? else {
            return Ok(None);
        };

        if task.metadata.deletion_timestamp.is_some() {
            return self.finalize(namespace, &task).await;
        }

        if !has_finalizer(&task) {
            self.substrate.set_finalizer(namespace, name, true).await?;
            return Ok(Some(Duration::ZERO));
        }

        if task
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(constants::ANNOTATION_RETAIN_PVC))
        {
            let pvc_name = constants::storage_name(name);
            self.substrate.detach_pvc_owner(namespace, &pvc_name).await?;
        }

        let phase = task.status.as_ref().map(|s| s.phase).unwrap_or_default();
        if !phase.is_terminal() && cancel_requested(&task) {
            let outcome = self.cancel(namespace, &task).await?;
            return self.apply(namespace, name, outcome).await;
        }

        let outcome = self.dispatch(namespace, &task).await?;
        self.apply(namespace, name, outcome).await
    }

    /// Tear down a non-terminal task on an external cancellation request
    /// (§3, §5). The one-shot observed-guard annotation keeps the trace
    /// event from repeating every reconcile while the finalizer path runs.
    async fn cancel(&self, namespace: &str, task: &Task) -> Result<HandlerOutcome, ReconcileError> {
        let name = task.metadata.name.clone().unwrap_or_default();
        let pod_name = task.status.as_ref().and_then(|s| s.pod_name.clone()).unwrap_or_else(|| name.clone());
        let _ = self.substrate.delete_pod(namespace, &pod_name).await;

        let already_observed = task
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(constants::ANNOTATION_CANCELLATION_OBSERVED));
        let events = if already_observed {
            Vec::new()
        } else {
            self.substrate
                .set_annotation(namespace, &name, constants::ANNOTATION_CANCELLATION_OBSERVED, Some("true"))
                .await?;
            vec![TraceEvent::TaskCancelled { task: name }]
        };

        let mut status = task.status.clone().unwrap_or_default();
        status.phase = Phase::Cancelled;
        status.completed_at = Some(self.clock.now_utc());
        Ok(HandlerOutcome { status: Some(status), requeue_after: None, events })
    }

    /// Top up the warm pool to its configured target, cooldown-gated at the
    /// call site (§4.9, §5). Failures are logged, not propagated — a warm
    /// pool topped up late just means the next task takes a cold start.
    async fn replenish_warm_pool(&self) {
        let defaults = self.defaults.get();
        if defaults.warm_pool.target_idle == 0 {
            return;
        }
        match warm_pool::replenish(self.substrate.as_ref(), &self.operator_namespace, &defaults.warm_pool, &defaults.pod).await {
            Ok(created) if created > 0 => {
                tracing::info!(created, "replenished warm pool");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "warm pool replenishment failed"),
        }
    }

    async fn refresh_defaults(&self, namespace: &str) {
        match self.substrate.get_config_map(namespace, "hortator-defaults").await {
            Ok(Some(data)) => self.defaults.refresh(ClusterDefaults::from_config_map(&data)),
            Ok(None) => self.defaults.refresh(ClusterDefaults::default()),
            Err(err) => warn!(error = %err, "failed to refresh cluster defaults, keeping stale values"),
        }
    }

    /// One price-map refresh per TTL expiry (§5); a fetch error or absent
    /// `ConfigMap` just bumps the staleness clock so the next stale check
    /// doesn't hammer the substrate every reconcile.
    async fn refresh_price_map(&self, namespace: &str) {
        match self.substrate.get_config_map(namespace, "hortator-model-prices").await {
            Ok(Some(data)) => self.price_map.refresh(price_map::parse_config_map(&data)),
            Ok(None) => self.price_map.refresh(Default::default()),
            Err(err) => warn!(error = %err, "failed to refresh model price map, keeping stale values"),
        }
    }

    async fn dispatch(&self, namespace: &str, task: &Task) -> Result<HandlerOutcome, ReconcileError> {
        let phase = task.status.as_ref().map(|s| s.phase).unwrap_or_default();
        match phase {
            Phase::Pending => admission::handle_pending(self, namespace, task).await,
            Phase::Running => running::handle_running(self, namespace, task).await,
            Phase::Retrying => running::handle_retrying(self, task),
            Phase::Waiting => waiting::handle_waiting(task),
            Phase::Completed
            | Phase::Failed
            | Phase::TimedOut
            | Phase::BudgetExceeded
            | Phase::Cancelled => terminal::handle_terminal(self, namespace, task).await,
        }
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        outcome: HandlerOutcome,
    ) -> Result<Option<Duration>, ReconcileError> {
        if let Some(status) = outcome.status {
            self.update_status_with_retry(namespace, name, move |_current| status.clone()).await?;
        }
        for event in &outcome.events {
            self.substrate
                .emit_event(namespace, name, event.event_type(), event.name(), &event.message())
                .await?;
        }
        Ok(outcome.requeue_after)
    }

    /// Optimistic-concurrency status update (§4.1, §4.14): re-read the
    /// latest object on every attempt and hand its current status to
    /// `recompute`, so a retry after a `Conflict` reapplies the caller's
    /// delta on top of whatever concurrently landed instead of clobbering it
    /// with a stale pre-loop snapshot (§9). Returns the status actually
    /// written, or `None` if the task disappeared mid-retry (silently a
    /// success — nothing left to update).
    async fn update_status_with_retry(
        &self,
        namespace: &str,
        name: &str,
        mut recompute: impl FnMut(TaskStatus) -> TaskStatus,
    ) -> Result<Option<TaskStatus>, ReconcileError> {
        for attempt in 0..MAX_STATUS_WRITE_ATTEMPTS {
            let Some(mut latest) = self.substrate.get_task(namespace, name).await? else {
                return Ok(None);
            };
            let next = recompute(latest.status.clone().unwrap_or_default());
            latest.status = Some(next.clone());
            match self.substrate.update_task_status(namespace, &latest).await {
                Ok(_) => return Ok(Some(next)),
                Err(SubstrateError::Conflict(_)) if attempt + 1 < MAX_STATUS_WRITE_ATTEMPTS => continue,
                Err(SubstrateError::NotFound(_)) => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    /// Deletion path: best-effort pod cleanup, then finalizer removal so the
    /// object can actually disappear (§4.1).
    async fn finalize(&self, namespace: &str, task: &Task) -> Result<Option<Duration>, ReconcileError> {
        let name = task.metadata.name.clone().unwrap_or_default();
        let pod_name = task.status.as_ref().and_then(|s| s.pod_name.clone()).unwrap_or_else(|| name.clone());
        let _ = self.substrate.delete_pod(namespace, &pod_name).await;
        self.substrate
            .emit_event(
                namespace,
                &name,
                hortator_substrate::EventType::Normal,
                TraceEvent::TaskDeleted { task: name.clone() }.name(),
                &TraceEvent::TaskDeleted { task: name.clone() }.message(),
            )
            .await?;
        self.substrate.set_finalizer(namespace, &name, false).await?;
        Ok(None)
    }
}

fn has_finalizer(task: &Task) -> bool {
    task.metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == constants::FINALIZER))
}

fn cancel_requested(task: &Task) -> bool {
    task.metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(constants::ANNOTATION_CANCEL_REQUESTED))
}
