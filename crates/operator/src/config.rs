//! Startup configuration, read once from `HORTATOR_*` environment variables
//! (§4.18).

use hortator_engine::NamespaceScope;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process-level settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace the operator itself runs in; also where warm-pool pods and
    /// PVCs are created (§4.9).
    pub operator_namespace: String,
    /// Which task namespaces are reconciled (§4.18).
    pub namespace_scope: NamespaceScope,
    /// Bind address for the `/metrics`, `/healthz`, `/readyz` server (§4.17).
    pub metrics_addr: SocketAddr,
    /// Cross-object reconcile concurrency passed to `Controller::run` (§5).
    pub concurrency: u16,
    pub log_format: LogFormat,
}

impl Config {
    pub fn load() -> Self {
        Self {
            operator_namespace: operator_namespace(),
            namespace_scope: namespace_scope(),
            metrics_addr: metrics_addr(),
            concurrency: concurrency(),
            log_format: log_format(),
        }
    }
}

fn operator_namespace() -> String {
    std::env::var("HORTATOR_NAMESPACE").unwrap_or_else(|_| "hortator-system".to_string())
}

/// Comma-separated `HORTATOR_WATCH_NAMESPACES`; unset or empty watches all
/// namespaces the operator's RBAC permits (§4.18).
fn namespace_scope() -> NamespaceScope {
    match std::env::var("HORTATOR_WATCH_NAMESPACES") {
        Ok(raw) if !raw.trim().is_empty() => {
            let set: BTreeSet<String> = raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            NamespaceScope::Allowed(set)
        }
        _ => NamespaceScope::All,
    }
}

fn metrics_addr() -> SocketAddr {
    let ip: IpAddr = std::env::var("HORTATOR_METRICS_IP")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let port: u16 = std::env::var("HORTATOR_METRICS_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);
    SocketAddr::new(ip, port)
}

fn concurrency() -> u16 {
    std::env::var("HORTATOR_CONCURRENCY").ok().and_then(|s| s.parse().ok()).unwrap_or(16)
}

fn log_format() -> LogFormat {
    match std::env::var("HORTATOR_LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

/// How often the reconciler's hot-reloaded defaults cache is allowed to go
/// stale before a refresh is attempted; mirrors `DefaultsCache`'s own
/// default but is surfaced here since it is the one TTL an operator might
/// reasonably want to tune in deployment manifests.
pub fn defaults_ttl() -> Duration {
    std::env::var("HORTATOR_DEFAULTS_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(30))
}
