use std::collections::BTreeSet;

use bugline::models::directory::{LabelCatalog, Roster, RosterEntry};
use bugline::models::ticket::{Priority, ReproDetails, TicketFields};
use bugline::pipeline::mapper::{map_fields, resolve_assignee, resolve_labels};

fn roster() -> Roster {
    let entry = |name: &str, id: &str, aliases: &[&str]| RosterEntry {
        name: name.into(),
        role: None,
        expertise: "things".into(),
        assignee_id: id.into(),
        aliases: aliases.iter().map(|a| (*a).to_owned()).collect(),
    };
    Roster::new(
        vec![
            entry("Bhavik Patel", "user-bhavik", &[]),
            entry("Rushil Nagarsheth", "user-rushil", &["kp07usa"]),
        ],
        "Rushil Nagarsheth",
    )
    .expect("roster")
}

fn catalog() -> LabelCatalog {
    LabelCatalog::new([
        ("Bug".to_owned(), "label-bug".to_owned()),
        ("Feature".to_owned(), "label-feature".to_owned()),
        ("Improvement".to_owned(), "label-improvement".to_owned()),
    ])
    .expect("catalog")
}

fn labels(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}

#[test]
fn known_assignee_maps_to_their_id() {
    let roster = roster();
    assert_eq!(resolve_assignee(&roster, Some("bhavik patel")).assignee_id, "user-bhavik");
    assert_eq!(resolve_assignee(&roster, Some("kp07usa")).assignee_id, "user-rushil");
}

#[test]
fn unknown_or_missing_assignee_uses_configured_default() {
    let roster = roster();
    assert_eq!(resolve_assignee(&roster, Some("nobody")).assignee_id, "user-rushil");
    assert_eq!(resolve_assignee(&roster, None).assignee_id, "user-rushil");
}

#[test]
fn known_labels_map_and_unknown_are_dropped() {
    let ids = resolve_labels(&catalog(), &labels(&["Feature", "Ux", "Bug"]), "anything");
    assert_eq!(ids, vec!["label-bug", "label-feature"]);
}

#[test]
fn all_unknown_labels_fall_back_through_title() {
    let catalog = catalog();
    assert_eq!(
        resolve_labels(&catalog, &labels(&["Ux"]), "Feature: dark mode"),
        vec!["label-feature"]
    );
    assert_eq!(
        resolve_labels(&catalog, &labels(&[]), "Crash on login"),
        vec!["label-bug"]
    );
}

#[test]
fn title_fallback_to_missing_catalog_entry_uses_bug() {
    let catalog = LabelCatalog::new([("Bug".to_owned(), "label-bug".to_owned())]).expect("catalog");
    assert_eq!(
        resolve_labels(&catalog, &labels(&[]), "Improvement to search"),
        vec!["label-bug"]
    );
}

#[test]
fn map_fields_resolves_everything() {
    let fields = TicketFields {
        title: "Crash".into(),
        description: "It crashes".into(),
        priority: Priority::High,
        assignee_name: Some("bhavik patel".into()),
        labels: labels(&["Bug"]),
        details: ReproDetails::default(),
    };
    let mapped = map_fields(&fields, &roster(), &catalog());

    assert_eq!(mapped.priority_ordinal, 2);
    assert_eq!(mapped.assignee_id.as_deref(), Some("user-bhavik"));
    assert_eq!(mapped.label_ids, vec!["label-bug"]);
}
