//! Task status: observed state, mutated only by the engine (§3).

use crate::phase::Phase;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum length of `TaskStatus::output`, in bytes (§3).
pub const OUTPUT_TRUNCATE_BYTES: usize = 16 * 1024;

/// A single attempt's record (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct AttemptRecord {
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Input/output token accounting (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input + self.output
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// Observed state of a Task (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct TaskStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub history: Vec<AttemptRecord>,
    #[serde(default)]
    pub tokens_used: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub child_tasks: Vec<String>,
    #[serde(default)]
    pub pending_children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_tokens_used: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_cost_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_time: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// Truncate `output` to [`OUTPUT_TRUNCATE_BYTES`] on a UTF-8 boundary.
    pub fn set_output(&mut self, output: impl Into<String>) {
        let mut output = output.into();
        if output.len() > OUTPUT_TRUNCATE_BYTES {
            let mut cut = OUTPUT_TRUNCATE_BYTES;
            while cut > 0 && !output.is_char_boundary(cut) {
                cut -= 1;
            }
            output.truncate(cut);
        }
        self.output = Some(output);
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
