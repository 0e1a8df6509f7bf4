//! Walk the task tree, aggregate usage, cancel descendants on exhaustion (§4.10).

use hortator_core::{BudgetSpec, Task, TokenUsage};
use std::collections::{HashMap, HashSet};

/// Guard against cycles in the (structurally acyclic, but defended-in-depth)
/// task tree (§4.10, §9).
const MAX_DEPTH: usize = 10;

/// Walk up `parentTaskId` references to the unique ancestor whose own
/// `parentTaskId` is empty, bounded by [`MAX_DEPTH`] (§4.10).
pub fn find_root<'a>(task: &'a Task, by_name: &HashMap<String, &'a Task>) -> Option<&'a Task> {
    let mut current = task;
    for _ in 0..MAX_DEPTH {
        if current.spec.is_root() {
            return Some(current);
        }
        let parent_id = current.spec.parent_task_id.as_deref()?;
        current = by_name.get(parent_id)?;
    }
    None
}

/// Compute the node set of a root's subtree by repeated-pass membership
/// growth until a fixed point, bounded by [`MAX_DEPTH`] passes (§4.10).
pub fn subtree_members<'a>(root_name: &str, tasks: &'a [Task]) -> Vec<&'a Task> {
    let mut members: HashSet<String> = HashSet::new();
    members.insert(root_name.to_string());

    for _ in 0..MAX_DEPTH {
        let before = members.len();
        for task in tasks {
            if let Some(parent) = &task.spec.parent_task_id {
                if !parent.is_empty() && members.contains(parent) {
                    if let Some(name) = &task.metadata.name {
                        members.insert(name.clone());
                    }
                }
            }
        }
        if members.len() == before {
            break;
        }
    }

    tasks
        .iter()
        .filter(|t| t.metadata.name.as_deref().is_some_and(|n| members.contains(n)))
        .collect()
}

/// Whether admitting a non-root task should be rejected for exceeding its
/// root's hierarchy budget (§4.10).
pub fn exceeds_hierarchy_budget(root_usage: &TokenUsage, root_cost: f64, budget: &BudgetSpec) -> Option<String> {
    if let Some(max_tokens) = budget.max_tokens {
        if root_usage.total() > max_tokens {
            return Some(format!(
                "hierarchy token budget exhausted: {}/{max_tokens}",
                root_usage.total()
            ));
        }
    }
    if let Some(max_cost) = budget.max_cost_usd {
        if root_cost > max_cost {
            return Some(format!("hierarchy cost budget exhausted: {root_cost:.2}/{max_cost:.2}"));
        }
    }
    None
}

/// The accounting delta applied to a root when a descendant becomes terminal
/// for the first time (§4.10).
pub struct AccountingDelta {
    pub tokens: TokenUsage,
    pub cost_usd: f64,
}

pub fn descendant_contribution(descendant: &Task) -> AccountingDelta {
    let status = descendant.status.as_ref();
    AccountingDelta {
        tokens: status.map(|s| s.tokens_used).unwrap_or_default(),
        cost_usd: status.and_then(|s| s.estimated_cost_usd).unwrap_or(0.0),
    }
}

#[cfg(test)]
#[path = "hierarchy_tests.rs"]
mod tests;
