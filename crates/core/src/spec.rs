//! Task spec: desired state, immutable after creation except for
//! cancellation annotations (§3).

use crate::status::TaskStatus;
use crate::tier::Tier;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reference to the model a task's worker should use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ModelRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Name of the secret holding the API key; the pod builder infers the
    /// env var name (`ANTHROPIC_*`, `OPENAI_*`, else generic) from `endpoint`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
}

/// CPU/memory requests and limits, as Kubernetes quantity strings (§3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

/// Per-task persistent volume configuration (§3, §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct StorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub retain: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_days: Option<u32>,
}

/// A literal or secret-referenced environment variable (§3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

/// Token/cost budget, used both per-task and (only meaningfully) as the
/// hierarchy budget on roots (§3, §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct BudgetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost_usd: Option<f64>,
}

/// Retry policy parameters (§3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetrySpec {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "RetrySpec::default_backoff_seconds")]
    pub backoff_seconds: u64,
    #[serde(default = "RetrySpec::default_max_backoff_seconds")]
    pub max_backoff_seconds: u64,
}

impl RetrySpec {
    pub const fn default_backoff_seconds() -> u64 {
        30
    }

    pub const fn default_max_backoff_seconds() -> u64 {
        300
    }
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            backoff_seconds: Self::default_backoff_seconds(),
            max_backoff_seconds: Self::default_max_backoff_seconds(),
        }
    }
}

/// Per-task overrides for the stuck detector's layered configuration (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct HealthSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tool_diversity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeated_run: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_minutes: Option<u32>,
}

/// Desired state of a Task (§3).
///
/// Also the `kube::CustomResource` derive input: the generated `Task` type
/// (group `hortator.io`, version `v1alpha1`) wraps this as `.spec` alongside
/// `.status: Option<TaskStatus>` and standard `ObjectMeta` (§3 EXPANSION).
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "hortator.io",
    version = "v1alpha1",
    kind = "Task",
    namespaced,
    status = "TaskStatus",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Tier", "type":"string", "jsonPath":".spec.tier"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub prompt: String,
    #[serde(default)]
    pub role: Option<String>,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub resources: ResourceSpec,
    #[serde(default)]
    pub storage: StorageSpec,
    #[serde(default)]
    pub env: Vec<EnvVarSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetSpec>,
    /// Only meaningful on root tasks (§3, §4.10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_budget: Option<BudgetSpec>,
    #[serde(default)]
    pub retry: RetrySpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub health: HealthSpec,
}

impl TaskSpec {
    pub fn is_root(&self) -> bool {
        match &self.parent_task_id {
            None => true,
            Some(id) => id.is_empty(),
        }
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
