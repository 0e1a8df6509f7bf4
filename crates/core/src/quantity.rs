//! Resource quantity parsing and validation (§4.5).
//!
//! Task CPU/memory requests and limits are carried as Kubernetes quantity
//! strings (`"500m"`, `"512Mi"`, `"2"`). We don't need to do arithmetic on
//! them — only validate that they parse cleanly before handing them to the
//! pod builder, so an invalid quantity produces a clean admission error
//! instead of the substrate rejecting pod creation later.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid resource quantity {0:?}")]
pub struct InvalidQuantity(pub String);

const SUFFIXES: &[&str] =
    &["Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "K", "M", "G", "T", "P", "E", ""];

/// Validate a Kubernetes-style resource quantity string.
///
/// Accepts an optional leading sign, a decimal numeral, and one of the
/// standard binary/decimal SI suffixes. This mirrors the subset of
/// `k8s.io/apimachinery`'s quantity grammar actually used by task specs.
pub fn validate_quantity(s: &str) -> Result<(), InvalidQuantity> {
    let s = s.trim();
    if s.is_empty() {
        return Err(InvalidQuantity(s.to_string()));
    }

    for suffix in SUFFIXES {
        if let Some(numeral) = s.strip_suffix(suffix) {
            if numeral.is_empty() && !suffix.is_empty() {
                continue;
            }
            if is_decimal_numeral(numeral) {
                return Ok(());
            }
        }
    }
    Err(InvalidQuantity(s.to_string()))
}

fn is_decimal_numeral(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    if s.is_empty() {
        return false;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    for c in s.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

#[cfg(test)]
#[path = "quantity_tests.rs"]
mod tests;
