use super::*;

#[test]
fn name_matches_the_dotted_taxonomy_tag() {
    let event = TraceEvent::TaskCompleted { task: "t1".to_string() };
    assert_eq!(event.name(), "task.completed");
}

#[test]
fn failures_and_stuck_outcomes_are_warning_events() {
    let event = TraceEvent::TaskFailed { task: "t1".to_string(), reason: "boom".to_string() };
    assert_eq!(event.event_type(), EventType::Warning);
    let event = TraceEvent::TaskStarted { task: "t1".to_string() };
    assert_eq!(event.event_type(), EventType::Normal);
}

#[test]
fn serializes_with_the_tagged_type_field() {
    let event = TraceEvent::TaskRetrying { task: "t1".to_string(), attempt: 2 };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task.retrying");
    assert_eq!(json["attempt"], 2);
}

#[test]
fn message_embeds_the_reason_for_failures() {
    let event = TraceEvent::TaskFailed { task: "t1".to_string(), reason: "capability escalation denied: spawn".to_string() };
    assert!(event.message().contains("capability escalation denied: spawn"));
}
