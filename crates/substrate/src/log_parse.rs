//! Parse the worker pod's final log region for token counts, the result
//! block, and status markers (§6, §4.11).

use hortator_core::{constants, TokenUsage};
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn token_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Tokens:\s*in=(\d+)\s+out=(\d+)").expect("static regex"))
}

#[allow(clippy::expect_used)]
fn status_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""status":\s*"(budget_exceeded|waiting)""#).expect("static regex"))
}

/// Tool-call trace line: `[tool] <name> ...` emitted by the agentic runtime
/// this engine observes (§4.11). Distinct runtimes with a different prefix
/// produce no signal — the stuck detector assumes healthy (§9 open question).
#[allow(clippy::expect_used)]
fn tool_call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\[tool\]\s+(\S+)").expect("static regex"))
}

/// Repeated-prompt trace line: `[prompt-hash] <hex>` (§4.11).
#[allow(clippy::expect_used)]
fn prompt_hash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\[prompt-hash\]\s+([0-9a-f]+)").expect("static regex"))
}

/// Extract `tokensUsed` from a `Tokens: in=<int> out=<int>` line (§6).
pub fn extract_token_usage(log_tail: &str) -> Option<TokenUsage> {
    let caps = token_line_regex().captures(log_tail)?;
    let input = caps.get(1)?.as_str().parse().ok()?;
    let output = caps.get(2)?.as_str().parse().ok()?;
    Some(TokenUsage { input, output })
}

/// Extract the trimmed content between the result markers, if both are
/// present in order. A begin marker without a matching end leaves the output
/// unchanged (§8 boundary behavior).
pub fn extract_result_block(log_tail: &str) -> Option<String> {
    let begin = log_tail.find(constants::RESULT_BEGIN_MARKER)?;
    let after_begin = begin + constants::RESULT_BEGIN_MARKER.len();
    let end = log_tail[after_begin..].find(constants::RESULT_END_MARKER)?;
    Some(log_tail[after_begin..after_begin + end].trim().to_string())
}

/// Status markers that steer a logical-completion (exit 0) transition (§6, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    BudgetExceeded,
    Waiting,
}

pub fn extract_status_marker(log_tail: &str) -> Option<StatusMarker> {
    let caps = status_marker_regex().captures(log_tail)?;
    match caps.get(1)?.as_str() {
        "budget_exceeded" => Some(StatusMarker::BudgetExceeded),
        "waiting" => Some(StatusMarker::Waiting),
        _ => None,
    }
}

/// Tool diversity signal: count of unique tool names observed in the recent
/// log (§4.11). Fewer than three calls total is "assume healthy" (`None`).
pub fn unique_tool_count(log_tail: &str) -> Option<u32> {
    let names: Vec<&str> = tool_call_regex()
        .captures_iter(log_tail)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if names.len() < 3 {
        return None;
    }
    let unique: std::collections::HashSet<&str> = names.iter().copied().collect();
    Some(unique.len() as u32)
}

/// Longest run of consecutive identical prompt hashes observed in the log
/// (§4.11).
pub fn max_repeated_run(log_tail: &str) -> u32 {
    let hashes: Vec<&str> = prompt_hash_regex()
        .captures_iter(log_tail)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let mut best = 0u32;
    let mut current = 0u32;
    let mut last: Option<&str> = None;
    for hash in hashes {
        if Some(hash) == last {
            current += 1;
        } else {
            current = 1;
            last = Some(hash);
        }
        best = best.max(current);
    }
    best
}

/// Names of spawned children declared in a `"status": "waiting"` payload's
/// `children` array (§4.12). Parsed from the same result block JSON the
/// runtime writes, not from the log tail.
pub fn extract_waiting_children(payload_json: &str) -> Vec<String> {
    serde_json::from_str::<serde_json::Value>(payload_json)
        .ok()
        .and_then(|v| v.get("children").cloned())
        .and_then(|v| v.as_array().cloned())
        .map(|arr| arr.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "log_parse_tests.rs"]
mod tests;
