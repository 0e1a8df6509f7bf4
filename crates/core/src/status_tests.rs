use super::*;

#[test]
fn token_usage_total_sums_input_and_output() {
    let usage = TokenUsage { input: 10, output: 5 };
    assert_eq!(usage.total(), 15);
}

#[test]
fn token_usage_add_accumulates() {
    let mut usage = TokenUsage { input: 10, output: 5 };
    usage.add(TokenUsage { input: 1, output: 2 });
    assert_eq!(usage, TokenUsage { input: 11, output: 7 });
}

#[test]
fn set_output_under_limit_is_untouched() {
    let mut status = TaskStatus::default();
    status.set_output("hello");
    assert_eq!(status.output.as_deref(), Some("hello"));
}

#[test]
fn set_output_truncates_to_16kb_on_a_char_boundary() {
    let mut status = TaskStatus::default();
    // Use a multi-byte character near the truncation point so we can check
    // the cut lands on a valid boundary rather than splitting it.
    let body: String = "a".repeat(OUTPUT_TRUNCATE_BYTES - 1) + "é" + &"b".repeat(100);
    status.set_output(body);
    let output = status.output.unwrap();
    assert!(output.len() <= OUTPUT_TRUNCATE_BYTES);
    assert!(output.is_char_boundary(output.len()));
}

#[test]
fn default_status_is_pending_with_empty_collections() {
    let status = TaskStatus::default();
    assert_eq!(status.phase, Phase::Pending);
    assert!(status.history.is_empty());
    assert!(status.child_tasks.is_empty());
    assert!(status.pending_children.is_empty());
}
