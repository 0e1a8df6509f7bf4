use super::*;

#[test]
fn known_model_uses_its_own_price() {
    let map = PriceMap::default();
    let cost = map.estimate_cost(Some("claude-3-5-sonnet"), 1000, 1000);
    assert!((cost - (0.003 + 0.015)).abs() < 1e-9);
}

#[test]
fn unknown_model_falls_back_to_default_price() {
    let map = PriceMap::default();
    let known = map.estimate_cost(Some("some-future-model"), 1000, 0);
    let explicit_default = map.estimate_cost(None, 1000, 0);
    assert_eq!(known, explicit_default);
    assert!(known > 0.0);
}

#[test]
fn parse_config_map_skips_malformed_entries() {
    let data = BTreeMap::from([
        ("good-model".to_string(), "0.001,0.002".to_string()),
        ("bad-model".to_string(), "not-a-number".to_string()),
        ("missing-comma".to_string(), "0.001".to_string()),
    ]);
    let parsed = parse_config_map(&data);
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed["good-model"], ModelPrice { input_per_1k: 0.001, output_per_1k: 0.002 });
}

#[test]
fn refresh_with_empty_table_keeps_previous_prices() {
    let map = PriceMap::new(BTreeMap::from([("m".to_string(), ModelPrice { input_per_1k: 1.0, output_per_1k: 2.0 })]));
    map.refresh(BTreeMap::new());
    assert_eq!(map.estimate_cost(Some("m"), 1000, 0), 1.0);
}

#[test]
fn stale_after_ttl_elapses() {
    let map = PriceMap::with_ttl(builtin_prices(), Duration::from_millis(0));
    assert!(map.is_stale());
    map.refresh(builtin_prices());
    assert!(!map.is_stale());
}
