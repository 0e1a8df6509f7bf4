//! TTL-cached cluster configuration (§4.2).

use hortator_substrate::pod_builder::PodDefaults;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Retention windows per terminal phase (§4.13), as extended-duration
/// strings so they can be overridden by the same `ConfigMap` data.
#[derive(Debug, Clone)]
pub struct RetentionDefaults {
    pub completed: String,
    pub failed: String,
    pub cancelled: String,
}

impl Default for RetentionDefaults {
    fn default() -> Self {
        Self {
            completed: "7d".to_string(),
            failed: "2d".to_string(),
            cancelled: "1d".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WarmPoolDefaults {
    pub target_idle: u32,
    pub cooldown_seconds: u64,
}

impl Default for WarmPoolDefaults {
    fn default() -> Self {
        Self {
            target_idle: 0,
            cooldown_seconds: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultCacheDefaults {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_seconds: u64,
}

impl Default for ResultCacheDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1000,
            ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StuckDefaults {
    pub min_tool_diversity: u32,
    pub max_repeated_run: u32,
    pub stale_minutes: u32,
    pub action: StuckAction,
}

impl Default for StuckDefaults {
    fn default() -> Self {
        Self {
            min_tool_diversity: 3,
            max_repeated_run: 5,
            stale_minutes: 15,
            action: StuckAction::Warn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckAction {
    Warn,
    Kill,
    Escalate,
}

impl StuckAction {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "warn" => Some(StuckAction::Warn),
            "kill" => Some(StuckAction::Kill),
            "escalate" => Some(StuckAction::Escalate),
            _ => None,
        }
    }
}

/// Cluster-wide tunables sourced from the `hortator-defaults` `ConfigMap`
/// (§4.2). Missing/malformed entries fall back to these hard-coded defaults.
#[derive(Debug, Clone)]
pub struct ClusterDefaults {
    pub pod: PodDefaults,
    pub retention: RetentionDefaults,
    pub warm_pool: WarmPoolDefaults,
    pub result_cache: ResultCacheDefaults,
    pub stuck: StuckDefaults,
    pub presidio_endpoint: Option<String>,
}

impl Default for ClusterDefaults {
    fn default() -> Self {
        Self {
            pod: PodDefaults {
                basic_image: "hortator/legionary:latest".to_string(),
                agentic_image: "hortator/agentic:latest".to_string(),
                default_cpu_request: "250m".to_string(),
                default_cpu_limit: "500m".to_string(),
                default_memory_request: "256Mi".to_string(),
                default_memory_limit: "512Mi".to_string(),
                allowed_shell_commands: None,
                denied_shell_commands: None,
                read_only_workspace: false,
            },
            retention: RetentionDefaults::default(),
            warm_pool: WarmPoolDefaults::default(),
            result_cache: ResultCacheDefaults::default(),
            stuck: StuckDefaults::default(),
            presidio_endpoint: None,
        }
    }
}

impl ClusterDefaults {
    /// Parse from a `ConfigMap`'s string data, falling back field-by-field to
    /// the hard-coded default on any missing or malformed entry.
    pub fn from_config_map(data: &BTreeMap<String, String>) -> Self {
        let mut defaults = ClusterDefaults::default();

        if let Some(v) = data.get("basicImage") {
            defaults.pod.basic_image = v.clone();
        }
        if let Some(v) = data.get("agenticImage") {
            defaults.pod.agentic_image = v.clone();
        }
        if let Some(v) = data.get("defaultCpuRequest") {
            defaults.pod.default_cpu_request = v.clone();
        }
        if let Some(v) = data.get("defaultCpuLimit") {
            defaults.pod.default_cpu_limit = v.clone();
        }
        if let Some(v) = data.get("defaultMemoryRequest") {
            defaults.pod.default_memory_request = v.clone();
        }
        if let Some(v) = data.get("defaultMemoryLimit") {
            defaults.pod.default_memory_limit = v.clone();
        }
        if let Some(v) = data.get("allowedShellCommands") {
            defaults.pod.allowed_shell_commands = Some(v.clone());
        }
        if let Some(v) = data.get("deniedShellCommands") {
            defaults.pod.denied_shell_commands = Some(v.clone());
        }
        if let Some(v) = data.get("readOnlyWorkspace") {
            defaults.pod.read_only_workspace = v == "true";
        }
        if let Some(v) = data.get("retentionCompleted") {
            defaults.retention.completed = v.clone();
        }
        if let Some(v) = data.get("retentionFailed") {
            defaults.retention.failed = v.clone();
        }
        if let Some(v) = data.get("retentionCancelled") {
            defaults.retention.cancelled = v.clone();
        }
        if let Some(v) = data.get("warmPoolTargetIdle").and_then(|v| v.parse().ok()) {
            defaults.warm_pool.target_idle = v;
        }
        if let Some(v) = data.get("warmPoolCooldownSeconds").and_then(|v| v.parse().ok()) {
            defaults.warm_pool.cooldown_seconds = v;
        }
        if let Some(v) = data.get("resultCacheEnabled") {
            defaults.result_cache.enabled = v == "true";
        }
        if let Some(v) = data.get("resultCacheCapacity").and_then(|v| v.parse().ok()) {
            defaults.result_cache.capacity = v;
        }
        if let Some(v) = data.get("resultCacheTtlSeconds").and_then(|v| v.parse().ok()) {
            defaults.result_cache.ttl_seconds = v;
        }
        if let Some(v) = data.get("stuckMinToolDiversity").and_then(|v| v.parse().ok()) {
            defaults.stuck.min_tool_diversity = v;
        }
        if let Some(v) = data.get("stuckMaxRepeatedRun").and_then(|v| v.parse().ok()) {
            defaults.stuck.max_repeated_run = v;
        }
        if let Some(v) = data.get("stuckStaleMinutes").and_then(|v| v.parse().ok()) {
            defaults.stuck.stale_minutes = v;
        }
        if let Some(v) = data.get("stuckAction").and_then(|v| StuckAction::parse(v)) {
            defaults.stuck.action = v;
        }
        if let Some(v) = data.get("presidioEndpoint") {
            defaults.presidio_endpoint = Some(v.clone());
        }
        if let Ok(image) = std::env::var("HORTATOR_AGENT_IMAGE") {
            defaults.pod.agentic_image = image;
        }

        defaults
    }
}

/// Process-wide cache of [`ClusterDefaults`], refreshed when its monotonic
/// age exceeds a TTL (default 30s). Read under shared lock; reload takes the
/// exclusive lock only for the struct assignment (§4.2, §5).
pub struct DefaultsCache {
    inner: RwLock<(ClusterDefaults, Instant)>,
    ttl: Duration,
}

impl DefaultsCache {
    pub fn new(initial: ClusterDefaults) -> Self {
        Self {
            inner: RwLock::new((initial, Instant::now())),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(initial: ClusterDefaults, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new((initial, Instant::now())),
            ttl,
        }
    }

    /// True when the cached value is older than the TTL and a refresh via
    /// [`DefaultsCache::refresh`] should be attempted.
    pub fn is_stale(&self) -> bool {
        self.inner.read().1.elapsed() >= self.ttl
    }

    pub fn get(&self) -> ClusterDefaults {
        self.inner.read().0.clone()
    }

    pub fn refresh(&self, defaults: ClusterDefaults) {
        let mut guard = self.inner.write();
        *guard = (defaults, Instant::now());
    }
}

#[cfg(test)]
#[path = "defaults_cache_tests.rs"]
mod tests;
