//! Score running tasks for looping/staleness; act on the verdict (§4.11).

use crate::defaults_cache::{StuckAction, StuckDefaults};
use hortator_core::HealthSpec;

/// Effective stuck-detection configuration, layered cluster defaults →
/// role-level overrides → task-level overrides, most specific field wins
/// (§4.11).
#[derive(Debug, Clone, Copy)]
pub struct EffectiveHealthConfig {
    pub min_tool_diversity: u32,
    pub max_repeated_run: u32,
    pub stale_minutes: u32,
    pub action: StuckAction,
}

pub fn layer_config(
    cluster: &StuckDefaults,
    role: Option<&HealthSpec>,
    task: &HealthSpec,
) -> EffectiveHealthConfig {
    let min_tool_diversity = task
        .min_tool_diversity
        .or_else(|| role.and_then(|r| r.min_tool_diversity))
        .unwrap_or(cluster.min_tool_diversity);
    let max_repeated_run = task
        .max_repeated_run
        .or_else(|| role.and_then(|r| r.max_repeated_run))
        .unwrap_or(cluster.max_repeated_run);
    let stale_minutes = task
        .stale_minutes
        .or_else(|| role.and_then(|r| r.stale_minutes))
        .unwrap_or(cluster.stale_minutes);
    EffectiveHealthConfig {
        min_tool_diversity,
        max_repeated_run,
        stale_minutes,
        action: cluster.action,
    }
}

/// The three 0..1 penalty signals and their weighted aggregate (§4.11).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StuckScore {
    pub diversity_penalty: f64,
    pub repetition_penalty: f64,
    pub staleness_penalty: f64,
    pub aggregate: f64,
}

impl StuckScore {
    pub fn is_stuck(&self) -> bool {
        self.aggregate >= 0.5
    }
}

/// `observed_unique_tools` is `None` when fewer than three tool calls were
/// observed, treated as "assume healthy" (penalty 0) per §4.11.
pub fn score(
    config: &EffectiveHealthConfig,
    observed_unique_tools: Option<u32>,
    observed_max_run: u32,
    staleness_minutes: u32,
) -> StuckScore {
    let diversity_penalty = match observed_unique_tools {
        None => 0.0,
        Some(observed) => {
            let min_required = config.min_tool_diversity as f64;
            if min_required <= 0.0 {
                0.0
            } else {
                (0.0f64).max((min_required - observed as f64) / min_required)
            }
        }
    };

    let repetition_penalty = {
        let max_allowed = config.max_repeated_run as f64;
        if max_allowed <= 0.0 {
            0.0
        } else {
            (1.0f64).min(((observed_max_run as f64) - max_allowed) / max_allowed).max(0.0)
        }
    };

    let staleness_penalty = {
        let stale_min = config.stale_minutes as f64;
        if stale_min <= 0.0 {
            0.0
        } else {
            (1.0f64)
                .min(((staleness_minutes as f64) - stale_min) / stale_min)
                .max(0.0)
        }
    };

    let aggregate = 0.40 * diversity_penalty + 0.35 * repetition_penalty + 0.25 * staleness_penalty;

    StuckScore {
        diversity_penalty,
        repetition_penalty,
        staleness_penalty,
        aggregate,
    }
}

/// Human-readable diagnostic reason carrying the score and contributing
/// factors, used as the Failed message for `kill`/`escalate` verdicts
/// (§4.11).
pub fn diagnostic_reason(score: &StuckScore) -> String {
    format!(
        "stuck detector score {:.2} (diversity penalty {:.2}, repetition penalty {:.2}, staleness penalty {:.2})",
        score.aggregate, score.diversity_penalty, score.repetition_penalty, score.staleness_penalty
    )
}

#[cfg(test)]
#[path = "stuck_tests.rs"]
mod tests;
