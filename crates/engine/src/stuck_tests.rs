use super::*;
use hortator_core::HealthSpec;

fn cluster() -> StuckDefaults {
    StuckDefaults {
        min_tool_diversity: 4,
        max_repeated_run: 5,
        stale_minutes: 15,
        action: StuckAction::Warn,
    }
}

#[test]
fn task_level_override_wins_over_role_and_cluster() {
    let role = HealthSpec {
        min_tool_diversity: Some(2),
        max_repeated_run: None,
        stale_minutes: None,
    };
    let task = HealthSpec {
        min_tool_diversity: Some(1),
        ..Default::default()
    };
    let config = layer_config(&cluster(), Some(&role), &task);
    assert_eq!(config.min_tool_diversity, 1);
}

#[test]
fn role_override_wins_over_cluster_when_task_is_silent() {
    let role = HealthSpec {
        min_tool_diversity: Some(2),
        max_repeated_run: None,
        stale_minutes: None,
    };
    let config = layer_config(&cluster(), Some(&role), &HealthSpec::default());
    assert_eq!(config.min_tool_diversity, 2);
    assert_eq!(config.max_repeated_run, 5);
}

#[test]
fn cluster_default_applies_when_nothing_overrides() {
    let config = layer_config(&cluster(), None, &HealthSpec::default());
    assert_eq!(config.min_tool_diversity, 4);
    assert_eq!(config.stale_minutes, 15);
}

#[test]
fn fewer_than_three_tool_calls_gives_zero_diversity_penalty() {
    let config = layer_config(&cluster(), None, &HealthSpec::default());
    let result = score(&config, None, 0, 0);
    assert_eq!(result.diversity_penalty, 0.0);
}

#[test]
fn low_diversity_and_high_repetition_and_staleness_trip_stuck_verdict() {
    let config = layer_config(&cluster(), None, &HealthSpec::default());
    // observed 1 unique tool against min 4 => penalty 0.75
    // observed run 10 against max 5 => penalty 1.0
    // stale for 30 min against 15 min threshold => penalty 1.0
    let result = score(&config, Some(1), 10, 30);
    assert!(result.is_stuck());
    assert!((result.aggregate - (0.40 * 0.75 + 0.35 * 1.0 + 0.25 * 1.0)).abs() < 1e-9);
}

#[test]
fn healthy_signals_never_trip_stuck_verdict() {
    let config = layer_config(&cluster(), None, &HealthSpec::default());
    let result = score(&config, Some(5), 1, 1);
    assert!(!result.is_stuck());
}

#[test]
fn diagnostic_reason_includes_the_aggregate_score() {
    let config = layer_config(&cluster(), None, &HealthSpec::default());
    let result = score(&config, Some(1), 10, 30);
    let reason = diagnostic_reason(&result);
    assert!(reason.contains(&format!("{:.2}", result.aggregate)));
}
