//! Content-addressed deduplication of identical tasks (§4.8).

use hortator_core::TokenUsage;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// SHA-256 of `role || 0x00 || model || 0x00 || tier || 0x00 || prompt`
/// (§4.8). Callers pass `""` for an absent role/model.
pub fn cache_key(role: &str, model: &str, tier: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(role.as_bytes());
    hasher.update([0u8]);
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(tier.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct CachedResult {
    pub output: String,
    pub tokens_used: TokenUsage,
    pub estimated_cost_usd: Option<f64>,
}

struct Entry {
    key: String,
    value: CachedResult,
    inserted_at: Instant,
}

/// In-memory LRU-by-insertion-order cache with lazy TTL eviction (§4.8).
/// `Get` takes the shared lock; `Put`/eviction take the exclusive lock
/// (§5) — both collapse to the same `parking_lot::Mutex` here since the
/// critical sections are all pure in-memory bookkeeping, never held across a
/// substrate call.
pub struct ResultCache {
    entries: Mutex<VecDeque<Entry>>,
    capacity: usize,
    ttl: Duration,
    enabled: bool,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration, enabled: bool) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
            ttl,
            enabled,
        }
    }

    /// Returns the stored result, evicting it first if its TTL has elapsed.
    /// A disabled cache never stores or returns (§4.8).
    pub fn get(&self, key: &str) -> Option<CachedResult> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.key == key)?;
        if entries[index].inserted_at.elapsed() >= self.ttl {
            entries.remove(index);
            return None;
        }
        Some(entries[index].value.clone())
    }

    /// Skips duplicates; evicts the oldest entry (insertion-order LRU) when
    /// at capacity.
    pub fn put(&self, key: String, value: CachedResult) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.key == key) {
            return;
        }
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(Entry {
            key,
            value,
            inserted_at: Instant::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "result_cache_tests.rs"]
mod tests;
