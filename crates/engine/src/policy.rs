//! Evaluate admission policies against a task (§4.3).

use hortator_core::{Tier, TaskSpec};
use serde::{Deserialize, Serialize};

/// An admission policy document, namespace-scoped or cluster-wide (§4.3, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionPolicy {
    #[serde(default)]
    pub denied_capabilities: Vec<String>,
    /// When present, only these capabilities may be declared.
    #[serde(default)]
    pub allowed_capabilities: Option<Vec<String>>,
    /// Glob patterns (e.g. `"myregistry.io/*"`); when present, `image` must
    /// match at least one.
    #[serde(default)]
    pub allowed_image_globs: Option<Vec<String>>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub max_cost_usd: Option<f64>,
    #[serde(default)]
    pub max_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub max_tier: Option<Tier>,
    #[serde(default)]
    pub max_concurrent_running: Option<u32>,
    #[serde(default)]
    pub allowed_shell_commands: Option<Vec<String>>,
    #[serde(default)]
    pub denied_shell_commands: Option<Vec<String>>,
    #[serde(default)]
    pub read_only_workspace: bool,
}

/// Enforce the ordered set of checks in §4.3 against a task and the policies
/// scoped to its namespace. Returns the first violating description, or
/// `None` when admissible.
pub fn check_admission(spec: &TaskSpec, policies: &[AdmissionPolicy], running_in_namespace: u32) -> Option<String> {
    for policy in policies {
        for denied in &policy.denied_capabilities {
            if spec.capabilities.contains(denied) {
                return Some(format!("capability '{denied}' is denied by policy"));
            }
        }

        if let Some(allowed) = &policy.allowed_capabilities {
            for cap in &spec.capabilities {
                if !allowed.contains(cap) {
                    return Some(format!("capability '{cap}' is not in the allowed set"));
                }
            }
        }

        if let Some(globs) = &policy.allowed_image_globs {
            if let Some(image) = &spec.image {
                if !globs.iter().any(|glob| glob_match(glob, image)) {
                    return Some(format!("image '{image}' does not match any allowed pattern"));
                }
            }
        }

        if let (Some(max_tokens), Some(budget)) = (policy.max_tokens, &spec.budget) {
            if let Some(requested) = budget.max_tokens {
                if requested > max_tokens {
                    return Some(format!("requested max tokens {requested} exceeds policy limit {max_tokens}"));
                }
            }
        }

        if let (Some(max_cost), Some(budget)) = (policy.max_cost_usd, &spec.budget) {
            if let Some(requested) = budget.max_cost_usd {
                if requested > max_cost {
                    return Some(format!("requested max cost {requested} exceeds policy limit {max_cost}"));
                }
            }
        }

        if let (Some(max_timeout), Some(timeout)) = (policy.max_timeout_seconds, spec.timeout_seconds) {
            if timeout > max_timeout {
                return Some(format!("requested timeout {timeout}s exceeds policy limit {max_timeout}s"));
            }
        }

        if let Some(max_tier) = policy.max_tier {
            if spec.tier.rank() > max_tier.rank() {
                return Some(format!("tier '{}' exceeds policy maximum '{max_tier}'", spec.tier));
            }
        }

        if let Some(max_concurrent) = policy.max_concurrent_running {
            if running_in_namespace >= max_concurrent {
                return Some(format!(
                    "namespace has {running_in_namespace} running tasks, at or above policy limit {max_concurrent}"
                ));
            }
        }
    }
    None
}

/// Minimal `*`-only glob matcher, sufficient for image-registry patterns
/// such as `"myregistry.io/*"` (§4.3).
fn glob_match(pattern: &str, value: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == value,
        Some((prefix, suffix)) => value.starts_with(prefix) && value.ends_with(suffix) && value.len() >= prefix.len() + suffix.len(),
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
