//! Capability rules (§4.4): effective capability computation and
//! parent-child escalation checks.

use crate::tier::Tier;
use std::collections::BTreeSet;

/// The capability auto-injected into agentic tiers.
pub const SPAWN: &str = "spawn";

/// Compute the effective capability set for a task given its tier and
/// declared capabilities.
///
/// Centurion and tribune tiers implicitly gain `spawn` (once — a set, so
/// re-adding is a no-op). The input set is never mutated; a new set is
/// returned.
pub fn effective_capabilities(tier: Tier, declared: &BTreeSet<String>) -> BTreeSet<String> {
    let mut caps = declared.clone();
    if tier.is_agentic() {
        caps.insert(SPAWN.to_string());
    }
    caps
}

/// Result of a parent→child capability escalation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationCheck {
    Allowed,
    Denied {
        /// The first capability the child declared that the parent doesn't
        /// effectively hold.
        denied_capability: String,
        /// The parent's effective capability set, for the diagnostic message.
        parent_effective: BTreeSet<String>,
    },
}

/// Check that a child's declared capabilities are a subset of its parent's
/// effective capability set (§4.4, §3 invariants).
///
/// Root tasks (no parent) have no escalation check to perform; callers
/// should only invoke this for tasks with a `parentTaskId`.
pub fn check_escalation(
    child_declared: &BTreeSet<String>,
    parent_tier: Tier,
    parent_declared: &BTreeSet<String>,
) -> EscalationCheck {
    let parent_effective = effective_capabilities(parent_tier, parent_declared);
    for cap in child_declared {
        if !parent_effective.contains(cap) {
            return EscalationCheck::Denied {
                denied_capability: cap.clone(),
                parent_effective,
            };
        }
    }
    EscalationCheck::Allowed
}

/// Render the human-readable reason used when a task is Failed with
/// `CapabilityEscalation` at admission (§3, §4.4, end-to-end scenario 3).
pub fn escalation_message(denied_capability: &str, parent_effective: &BTreeSet<String>) -> String {
    let effective_list: Vec<&str> = parent_effective.iter().map(String::as_str).collect();
    format!(
        "capability escalation denied: capability {denied_capability:?} not held by parent (parent effective capabilities: [{}])",
        effective_list.join(", ")
    )
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;
