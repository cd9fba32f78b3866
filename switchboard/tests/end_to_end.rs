//! End-to-end scenarios through the `switchboard` facade.
//!
//! Each test plays an operator story against a registry assembled by
//! [`SwitchboardBuilder`]: staged percentage rollouts, user and host
//! targeting, inheritance, optimistic edits, and listing search.

use std::collections::BTreeMap;

use switchboard::prelude::*;
use switchboard::{Switch, identity_bucket};

fn fields(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn staged_percentage_rollout() {
    let registry = SwitchboardBuilder::new().build().unwrap();
    registry
        .create("beta_ui", "Beta UI", "New dashboard rollout")
        .unwrap();
    registry
        .set_status("beta_ui", SwitchStatus::ActiveForConditions)
        .unwrap();
    registry
        .add_condition("beta_ui", "percentage", fields(&[("percent", "0-24")]))
        .unwrap();

    // Stage one: a quarter of identities, stable across calls.
    for identity in ["u1", "u2", "u3", "pilot-7", "pilot-8"] {
        let ctx = EvalContext::for_identity(identity);
        let expected = identity_bucket(identity) < 25;
        assert_eq!(registry.evaluate("beta_ui", &ctx).unwrap(), expected);
        assert_eq!(registry.evaluate("beta_ui", &ctx).unwrap(), expected);
    }

    // Widen to everyone by dropping the gate: the demotion rule flips the
    // status to ActiveForEveryone when the last condition goes.
    let fully_on = registry
        .remove_condition("beta_ui", "percentage", "percent", "0-24")
        .unwrap();
    assert_eq!(fully_on.status, SwitchStatus::ActiveForEveryone);
    assert!(registry
        .evaluate("beta_ui", &EvalContext::for_identity("u1"))
        .unwrap());
    assert!(registry.evaluate("beta_ui", &EvalContext::new()).unwrap());

    registry.delete("beta_ui").unwrap();
    assert!(registry.evaluate("beta_ui", &EvalContext::new()).is_err());
}

#[test]
fn or_across_sets_and_within_a_set() {
    let registry = SwitchboardBuilder::new().build().unwrap();
    registry.create("admin_tools", "Admin Tools", "").unwrap();
    registry
        .set_status("admin_tools", SwitchStatus::ActiveForConditions)
        .unwrap();
    // Set 1: staff member named alice (both must hold).
    registry
        .add_condition(
            "admin_tools",
            "user",
            fields(&[("username", "alice"), ("is_staff", "flag")]),
        )
        .unwrap();
    // Set 2: any internal address (independent alternative).
    registry
        .add_condition("admin_tools", "ip", fields(&[("internal", "flag")]))
        .unwrap();

    let staff_alice = EvalContext::new()
        .with_attribute("username", "alice")
        .with_attribute("is_staff", "true");
    let nonstaff_alice = EvalContext::new().with_attribute("username", "alice");
    let internal_bob = EvalContext::new()
        .with_attribute("username", "bob")
        .with_attribute("internal", "yes");
    let outsider = EvalContext::new().with_attribute("username", "mallory");

    assert!(registry.evaluate("admin_tools", &staff_alice).unwrap());
    assert!(!registry.evaluate("admin_tools", &nonstaff_alice).unwrap());
    assert!(registry.evaluate("admin_tools", &internal_bob).unwrap());
    assert!(!registry.evaluate("admin_tools", &outsider).unwrap());
}

#[test]
fn inherited_status_uses_own_conditions() {
    let registry = SwitchboardBuilder::new().build().unwrap();
    registry.create("experiments", "Experiments", "").unwrap();
    registry.create("new_editor", "New Editor", "").unwrap();
    registry
        .set_parent("new_editor", Some("experiments"))
        .unwrap();
    registry
        .set_status("new_editor", SwitchStatus::InheritFromParent)
        .unwrap();
    registry
        .add_condition("new_editor", "user", fields(&[("username", "alice")]))
        .unwrap();

    let alice = EvalContext::new().with_attribute("username", "alice");
    let bob = EvalContext::new().with_attribute("username", "bob");

    // Parent off: the child is off no matter what it stores.
    assert!(!registry.evaluate("new_editor", &alice).unwrap());

    // Parent armed for conditions: the child consults its own sets, so
    // alice is in and bob is out even though the parent has no conditions.
    registry
        .set_status("experiments", SwitchStatus::ActiveForConditions)
        .unwrap();
    assert!(registry.evaluate("new_editor", &alice).unwrap());
    assert!(!registry.evaluate("new_editor", &bob).unwrap());

    // Parent fully on: everyone gets the child.
    registry
        .set_status("experiments", SwitchStatus::ActiveForEveryone)
        .unwrap();
    assert!(registry.evaluate("new_editor", &bob).unwrap());
}

#[test]
fn boolean_family_acts_as_stored_kill_switch() {
    let registry = SwitchboardBuilder::new().build().unwrap();
    registry.create("maintenance", "Maintenance Banner", "").unwrap();
    registry
        .set_status("maintenance", SwitchStatus::ActiveForConditions)
        .unwrap();
    registry
        .add_condition("maintenance", "boolean", fields(&[("value", "true")]))
        .unwrap();

    // A stored literal ignores the request context entirely.
    assert!(registry.evaluate("maintenance", &EvalContext::new()).unwrap());

    // Flipping the literal merges into the same set, so the switch stays
    // armed for conditions rather than demoting through an empty set.
    registry
        .add_condition("maintenance", "boolean", fields(&[("value", "false")]))
        .unwrap();
    assert!(!registry.evaluate("maintenance", &EvalContext::new()).unwrap());
}

#[test]
fn concurrent_editors_detect_stale_saves() {
    let registry = SwitchboardBuilder::new().build().unwrap();
    registry.create("beta_ui", "Beta UI", "").unwrap();

    let form_a = registry.get("beta_ui").unwrap();
    let form_b = registry.get("beta_ui").unwrap();

    registry
        .update("beta_ui", "beta_ui", "Saved by B", "", form_b.version)
        .unwrap();
    let err = registry
        .update("beta_ui", "beta_ui", "Saved by A", "", form_a.version)
        .unwrap_err();
    assert!(matches!(err, SwitchError::VersionConflict { .. }));
    assert_eq!(registry.get("beta_ui").unwrap().name, "Saved by B");
}

#[test]
fn listing_search_ranks_best_matches_first() {
    let registry = SwitchboardBuilder::new().build().unwrap();
    registry
        .create("beta_ui", "Beta UI", "new dashboard")
        .unwrap();
    registry
        .create("search_v2", "Search V2", "ranking experiment")
        .unwrap();
    registry.create("dark_mode", "Dark Mode", "").unwrap();

    let hits = registry.search("search");
    assert_eq!(hits.first().map(|s| s.key.as_str()), Some("search_v2"));
    assert!(!hits.iter().any(|s| s.key == "dark_mode"));

    let everything = registry.search("  ");
    assert_eq!(everything.len(), 3);
    assert_eq!(everything[0].key, "beta_ui");
}

#[test]
fn autocreate_is_opt_in_through_the_builder() {
    let registry = SwitchboardBuilder::new()
        .with_config(SwitchboardConfig::default().with_autocreate_missing(true))
        .build()
        .unwrap();

    assert!(!registry
        .evaluate("first_seen_in_code", &EvalContext::new())
        .unwrap());
    let created = registry.get("first_seen_in_code").unwrap();
    assert_eq!(created.status, SwitchStatus::Disabled);
    assert_eq!(created.version, 1);
}

#[test]
fn snapshots_serialize_for_transport() {
    let registry = SwitchboardBuilder::new().build().unwrap();
    registry
        .create("beta_ui", "Beta UI", "new dashboard")
        .unwrap();
    registry
        .set_status("beta_ui", SwitchStatus::ActiveForConditions)
        .unwrap();
    registry
        .add_condition("beta_ui", "percentage", fields(&[("percent", "10")]))
        .unwrap();

    let snapshot = registry.get("beta_ui").unwrap();
    let encoded = serde_json::to_string(&snapshot).unwrap();
    let decoded: Switch = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, snapshot);
    assert_eq!(decoded.version, 3);
}
