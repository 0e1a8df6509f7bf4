use super::*;
use std::collections::BTreeMap;

#[test]
fn missing_entries_fall_back_to_hardcoded_defaults() {
    let defaults = ClusterDefaults::from_config_map(&BTreeMap::new());
    assert_eq!(defaults.pod.basic_image, "hortator/legionary:latest");
    assert_eq!(defaults.retention.completed, "7d");
    assert_eq!(defaults.warm_pool.target_idle, 0);
    assert!(defaults.result_cache.enabled);
}

#[test]
fn malformed_numeric_entry_falls_back_to_default() {
    let mut data = BTreeMap::new();
    data.insert("warmPoolTargetIdle".to_string(), "not-a-number".to_string());
    let defaults = ClusterDefaults::from_config_map(&data);
    assert_eq!(defaults.warm_pool.target_idle, 0);
}

#[test]
fn present_entries_override_defaults() {
    let mut data = BTreeMap::new();
    data.insert("basicImage".to_string(), "custom/image:v2".to_string());
    data.insert("warmPoolTargetIdle".to_string(), "5".to_string());
    data.insert("stuckAction".to_string(), "kill".to_string());
    let defaults = ClusterDefaults::from_config_map(&data);
    assert_eq!(defaults.pod.basic_image, "custom/image:v2");
    assert_eq!(defaults.warm_pool.target_idle, 5);
    assert_eq!(defaults.stuck.action, StuckAction::Kill);
}

#[test]
fn cache_reports_stale_only_after_ttl_elapses() {
    let cache = DefaultsCache::with_ttl(ClusterDefaults::default(), Duration::from_millis(10));
    assert!(!cache.is_stale());
    std::thread::sleep(Duration::from_millis(20));
    assert!(cache.is_stale());
}

#[test]
fn refresh_resets_staleness_and_updates_value() {
    let cache = DefaultsCache::with_ttl(ClusterDefaults::default(), Duration::from_millis(10));
    std::thread::sleep(Duration::from_millis(20));
    assert!(cache.is_stale());
    let mut updated = ClusterDefaults::default();
    updated.pod.basic_image = "new/image".to_string();
    cache.refresh(updated);
    assert!(!cache.is_stale());
    assert_eq!(cache.get().pod.basic_image, "new/image");
}
