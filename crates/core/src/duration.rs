//! Extended duration parsing.
//!
//! Accepts the standard Go-style unit suffixes (`h`, `m`, `s`) plus the
//! extension `<N>d` for days, used throughout retention windows, backoff
//! settings, and TTLs (§6, §4.13).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration string")]
    Empty,
    #[error("invalid duration string: {0:?}")]
    Invalid(String),
}

/// Parse a duration string like `"30s"`, `"5m"`, `"2h"`, or `"7d"`.
///
/// Only a single numeric value with a single unit suffix is supported;
/// compound forms like `"1h30m"` are not part of this grammar.
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let unit_len = if s.ends_with("ms") { 2 } else { 1 };
    if s.len() <= unit_len {
        return Err(DurationParseError::Invalid(s.to_string()));
    }
    let (value_str, unit) = s.split_at(s.len() - unit_len);
    let value: f64 =
        value_str.parse().map_err(|_| DurationParseError::Invalid(s.to_string()))?;
    if value < 0.0 {
        return Err(DurationParseError::Invalid(s.to_string()));
    }

    let secs = match unit {
        "d" => value * 86_400.0,
        "h" => value * 3_600.0,
        "m" => value * 60.0,
        "s" => value,
        "ms" => value / 1000.0,
        _ => return Err(DurationParseError::Invalid(s.to_string())),
    };

    Ok(Duration::from_secs_f64(secs))
}

/// Format a duration back to the shortest unit form (used for annotations
/// like `retention=7d`).
pub fn format_days(days: u32) -> String {
    format!("{days}d")
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
