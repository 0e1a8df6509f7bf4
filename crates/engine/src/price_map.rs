//! Per-model USD pricing, TTL-cached the same way [`crate::defaults_cache`]
//! caches cluster configuration, but behind its own lock — §5 calls the
//! price map out as a shared resource distinct from the defaults cache,
//! refreshed in the background off a `ConfigMap` fetch bounded to 10 MB.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Bound on the raw `ConfigMap` payload a refresh will parse (§5); larger
/// fetches are treated as malformed and the stale map is kept.
pub const MAX_FETCH_BYTES: usize = 10 * 1024 * 1024;

/// USD price per 1,000 tokens, input and output priced independently since
/// most providers charge output tokens at a multiple of input cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPrice {
    fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

fn builtin_prices() -> BTreeMap<String, ModelPrice> {
    // Conservative fallbacks used when no `hortator-model-prices` ConfigMap
    // is present; real deployments are expected to override these.
    BTreeMap::from([
        ("claude-3-5-sonnet".to_string(), ModelPrice { input_per_1k: 0.003, output_per_1k: 0.015 }),
        ("claude-3-5-haiku".to_string(), ModelPrice { input_per_1k: 0.0008, output_per_1k: 0.004 }),
        ("gpt-4o".to_string(), ModelPrice { input_per_1k: 0.0025, output_per_1k: 0.01 }),
        ("gpt-4o-mini".to_string(), ModelPrice { input_per_1k: 0.00015, output_per_1k: 0.0006 }),
    ])
}

/// A fallback price used for any model name absent from the map, so an
/// unrecognized model still yields a (conservative) non-zero estimate
/// rather than silently reporting zero cost.
fn default_price() -> ModelPrice {
    ModelPrice { input_per_1k: 0.003, output_per_1k: 0.015 }
}

/// Parse a `ConfigMap`'s string data into a price table. Keys are model
/// names; values are `"<input-per-1k>,<output-per-1k>"`. Entries that fail
/// to parse are skipped rather than aborting the whole refresh.
pub fn parse_config_map(data: &BTreeMap<String, String>) -> BTreeMap<String, ModelPrice> {
    let mut prices = BTreeMap::new();
    for (model, raw) in data {
        let Some((input, output)) = raw.split_once(',') else { continue };
        let (Ok(input_per_1k), Ok(output_per_1k)) = (input.trim().parse::<f64>(), output.trim().parse::<f64>()) else {
            continue;
        };
        prices.insert(model.clone(), ModelPrice { input_per_1k, output_per_1k });
    }
    prices
}

/// Process-wide cache of per-model USD prices, refreshed when its monotonic
/// age exceeds a TTL. Read under shared lock; reload takes the exclusive
/// lock only for the struct assignment (§5), mirroring [`crate::defaults_cache::DefaultsCache`].
pub struct PriceMap {
    inner: RwLock<(BTreeMap<String, ModelPrice>, Instant)>,
    ttl: Duration,
}

impl Default for PriceMap {
    fn default() -> Self {
        Self::new(builtin_prices())
    }
}

impl PriceMap {
    /// The hard-coded fallback table used when no `ConfigMap` is present.
    pub fn default_prices() -> BTreeMap<String, ModelPrice> {
        builtin_prices()
    }

    pub fn new(initial: BTreeMap<String, ModelPrice>) -> Self {
        Self { inner: RwLock::new((initial, Instant::now())), ttl: DEFAULT_TTL }
    }

    pub fn with_ttl(initial: BTreeMap<String, ModelPrice>, ttl: Duration) -> Self {
        Self { inner: RwLock::new((initial, Instant::now())), ttl }
    }

    /// True when the cached table is older than the TTL and a refresh via
    /// [`PriceMap::refresh`] should be attempted.
    pub fn is_stale(&self) -> bool {
        self.inner.read().1.elapsed() >= self.ttl
    }

    pub fn refresh(&self, prices: BTreeMap<String, ModelPrice>) {
        if prices.is_empty() {
            // A malformed or empty fetch keeps the previous table rather
            // than wiping pricing out from under in-flight cost estimates.
            self.inner.write().1 = Instant::now();
            return;
        }
        let mut guard = self.inner.write();
        *guard = (prices, Instant::now());
    }

    /// Estimate USD cost for a model's token usage, falling back to
    /// [`default_price`] for names the table doesn't recognize.
    pub fn estimate_cost(&self, model_name: Option<&str>, input_tokens: u64, output_tokens: u64) -> f64 {
        let guard = self.inner.read();
        let price = model_name.and_then(|name| guard.0.get(name)).copied().unwrap_or_else(default_price);
        price.estimate(input_tokens, output_tokens)
    }
}

#[cfg(test)]
#[path = "price_map_tests.rs"]
mod tests;
