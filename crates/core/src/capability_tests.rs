use super::*;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn legionary_does_not_gain_spawn() {
    let caps = effective_capabilities(Tier::Legionary, &set(&["shell"]));
    assert_eq!(caps, set(&["shell"]));
}

#[test]
fn centurion_and_tribune_gain_spawn_exactly_once() {
    let caps = effective_capabilities(Tier::Centurion, &set(&["shell", "spawn"]));
    assert_eq!(caps, set(&["shell", "spawn"]));

    let caps = effective_capabilities(Tier::Tribune, &set(&[]));
    assert_eq!(caps, set(&["spawn"]));
}

#[test]
fn effective_capabilities_does_not_mutate_input() {
    let declared = set(&["shell"]);
    let _ = effective_capabilities(Tier::Tribune, &declared);
    assert_eq!(declared, set(&["shell"]));
}

#[test]
fn escalation_allowed_when_child_is_subset_of_parent_effective() {
    let parent_declared = set(&["shell"]);
    let child_declared = set(&["shell"]);
    assert_eq!(
        check_escalation(&child_declared, Tier::Legionary, &parent_declared),
        EscalationCheck::Allowed
    );
}

#[test]
fn escalation_denied_reports_first_missing_capability() {
    // Parent is legionary with only "shell" — spawn is not auto-injected
    // for legionary, so a child declaring "spawn" is denied.
    let parent_declared = set(&["shell"]);
    let child_declared = set(&["shell", "spawn"]);
    match check_escalation(&child_declared, Tier::Legionary, &parent_declared) {
        EscalationCheck::Denied { denied_capability, parent_effective } => {
            assert_eq!(denied_capability, "spawn");
            assert_eq!(parent_effective, set(&["shell"]));
        }
        other => panic!("expected Denied, got {other:?}"),
    }
}

#[test]
fn centurion_parent_implicitly_allows_spawn_children() {
    // Parent declares no capabilities but is centurion, so it effectively
    // holds "spawn" and a child may declare it.
    let parent_declared = set(&[]);
    let child_declared = set(&["spawn"]);
    assert_eq!(
        check_escalation(&child_declared, Tier::Centurion, &parent_declared),
        EscalationCheck::Allowed
    );
}

#[test]
fn escalation_message_lists_parent_effective_capabilities() {
    let msg = escalation_message("spawn", &set(&["shell"]));
    assert!(msg.contains("capability escalation denied"));
    assert!(msg.contains("spawn"));
    assert!(msg.contains("shell"));
}

proptest::proptest! {
    #[test]
    fn escalation_is_equivalent_to_subset_check(
        child_caps in proptest::collection::btree_set("[a-c]", 0..3),
        parent_caps in proptest::collection::btree_set("[a-c]", 0..3),
        tier_idx in 0u8..3,
    ) {
        let tier = match tier_idx {
            0 => Tier::Legionary,
            1 => Tier::Centurion,
            _ => Tier::Tribune,
        };
        let effective = effective_capabilities(tier, &parent_caps);
        let expected_allowed = child_caps.is_subset(&effective);
        let actual_allowed = matches!(
            check_escalation(&child_caps, tier, &parent_caps),
            EscalationCheck::Allowed
        );
        proptest::prop_assert_eq!(expected_allowed, actual_allowed);
    }
}
