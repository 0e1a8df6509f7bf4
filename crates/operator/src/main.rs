//! Hortator operator binary: loads startup configuration, builds the
//! reconciler and its collaborators, and runs the controller loop alongside
//! the metrics/health HTTP server as sibling tokio tasks (§4.1, §4.17,
//! §4.18).

mod config;
mod controller;
mod health;
mod metrics;
mod metrics_watcher;

use hortator_core::SystemClock;
use hortator_engine::price_map;
use hortator_engine::{AdmissionPolicy, ClusterDefaults, DefaultsCache, NamespaceScope, PriceMap, Reconciler, ResultCache, WarmPoolGate};
use hortator_substrate::kube_impl::KubeSubstrate;
use hortator_substrate::Substrate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cfg = config::Config::load();
    init_tracing(cfg.log_format);

    let client = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build kube client");
            std::process::exit(1);
        }
    };

    let substrate = KubeSubstrate::new(client.clone());

    let initial_defaults = load_initial_defaults(&substrate, &cfg.operator_namespace).await;
    let initial_prices = load_initial_prices(&substrate, &cfg.operator_namespace).await;
    let policies = load_admission_policies(&substrate, &cfg.operator_namespace).await;

    let defaults_cache = Arc::new(DefaultsCache::with_ttl(initial_defaults.clone(), config::defaults_ttl()));
    let price_map = Arc::new(PriceMap::with_ttl(initial_prices, config::defaults_ttl()));
    let result_cache = Arc::new(ResultCache::new(
        initial_defaults.result_cache.capacity,
        Duration::from_secs(initial_defaults.result_cache.ttl_seconds),
        initial_defaults.result_cache.enabled,
    ));
    let warm_pool_gate = Arc::new(WarmPoolGate::with_cooldown(Duration::from_secs(initial_defaults.warm_pool.cooldown_seconds)));

    let reconciler = Reconciler::new(
        Arc::new(substrate),
        SystemClock,
        defaults_cache,
        result_cache,
        cfg.namespace_scope.clone(),
        policies,
        cfg.operator_namespace.clone(),
        warm_pool_gate,
    )
    .with_price_map(price_map);
    let reconciler = Arc::new(reconciler);

    info!(
        namespace = %cfg.operator_namespace,
        concurrency = cfg.concurrency,
        metrics_addr = %cfg.metrics_addr,
        "starting hortator operator"
    );

    let readiness = health::Readiness::default();

    let controller_task = tokio::spawn(controller::run(client.clone(), reconciler, cfg.concurrency));
    let task_metrics_task = tokio::spawn(metrics_watcher::watch_tasks(client.clone(), readiness.clone()));
    let event_metrics_task = tokio::spawn(metrics_watcher::watch_stuck_events(client.clone()));
    let health_task = tokio::spawn(health::serve(cfg.metrics_addr, readiness));

    tokio::select! {
        _ = controller_task => error!("controller task exited unexpectedly"),
        _ = task_metrics_task => error!("task metrics watcher exited unexpectedly"),
        _ = event_metrics_task => error!("event metrics watcher exited unexpectedly"),
        _ = health_task => error!("health server exited unexpectedly"),
        _ = tokio::signal::ctrl_c() => info!("received shutdown signal"),
    }
}

fn init_tracing(format: config::LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        config::LogFormat::Json => subscriber.json().init(),
        config::LogFormat::Text => subscriber.init(),
    }
}

/// One-time seed of the hot-reloaded defaults cache; `DefaultsCache` itself
/// only refreshes when a reconcile pass observes it stale (§4.2).
async fn load_initial_defaults(substrate: &KubeSubstrate, namespace: &str) -> ClusterDefaults {
    match substrate.get_config_map(namespace, "hortator-defaults").await {
        Ok(Some(data)) => ClusterDefaults::from_config_map(&data),
        Ok(None) => ClusterDefaults::default(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load initial cluster defaults, using hard-coded defaults");
            ClusterDefaults::default()
        }
    }
}

/// One-time seed of the hot-reloaded price map; mirrors
/// [`load_initial_defaults`] since `PriceMap` is refreshed the same way the
/// defaults cache is, on the next stale reconcile (§5).
async fn load_initial_prices(
    substrate: &KubeSubstrate,
    namespace: &str,
) -> std::collections::BTreeMap<String, price_map::ModelPrice> {
    let parsed = match substrate.get_config_map(namespace, "hortator-model-prices").await {
        Ok(Some(data)) => price_map::parse_config_map(&data),
        Ok(None) => std::collections::BTreeMap::new(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load initial model prices, using hard-coded defaults");
            std::collections::BTreeMap::new()
        }
    };
    if parsed.is_empty() {
        PriceMap::default_prices()
    } else {
        parsed
    }
}

/// Admission policies are not hot-reloaded like cluster defaults (§4.3):
/// they are read once at startup, matching a restart-to-apply operational
/// model that keeps the admission path free of a second TTL cache.
async fn load_admission_policies(substrate: &KubeSubstrate, namespace: &str) -> Vec<AdmissionPolicy> {
    let data = match substrate.get_config_map(namespace, "hortator-admission-policies").await {
        Ok(Some(data)) => data,
        Ok(None) => return Vec::new(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load admission policies, admitting without policy constraints");
            return Vec::new();
        }
    };
    let Some(raw) = data.get("policies.yaml") else {
        return Vec::new();
    };
    match serde_yaml::from_str::<Vec<AdmissionPolicy>>(raw) {
        Ok(policies) => policies,
        Err(err) => {
            tracing::warn!(error = %err, "failed to parse admission policies, admitting without policy constraints");
            Vec::new()
        }
    }
}
