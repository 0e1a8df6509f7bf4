use super::*;

#[test]
fn accepts_common_cpu_and_memory_forms() {
    for q in ["500m", "1", "2.5", "512Mi", "1Gi", "100Ki", "0.5"] {
        assert!(validate_quantity(q).is_ok(), "expected {q:?} to be valid");
    }
}

#[test]
fn rejects_garbage() {
    for q in ["", "abc", "--5", "5..0", "Mi"] {
        assert!(validate_quantity(q).is_err(), "expected {q:?} to be invalid");
    }
}

#[test]
fn error_message_carries_the_offending_string() {
    let err = validate_quantity("bogus").unwrap_err();
    assert_eq!(err.0, "bogus");
}
