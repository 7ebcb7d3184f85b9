//! Identifier mapping: parsed fields to canonical tracker ids.
//!
//! Nothing here fails. Every unmapped value resolves to a fixed fallback
//! and the fallback is logged.

use std::collections::BTreeSet;

use tracing::info;

use crate::models::directory::{LabelCatalog, Roster, RosterEntry};
use crate::models::ticket::{label_from_title, TicketFields};

/// Fields resolved against the roster and label catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFields {
    /// `0..=2`.
    pub priority_ordinal: u8,
    /// Canonical assignee id.
    pub assignee_id: Option<String>,
    /// Canonical label ids; never empty.
    pub label_ids: Vec<String>,
}

/// Roster entry for a normalized name; unmapped or missing names resolve
/// to the roster's designated default.
#[must_use]
pub fn resolve_assignee<'r>(roster: &'r Roster, name: Option<&str>) -> &'r RosterEntry {
    if let Some(entry) = name.and_then(|name| roster.lookup(name)) {
        return entry;
    }
    let fallback = roster.default_entry();
    info!(
        requested = name.unwrap_or("<none>"),
        fallback = %fallback.name,
        "mapping fallback: assignee"
    );
    fallback
}

/// Catalog ids for label tokens. Unknown tokens are dropped; when nothing
/// matches, the title keywords decide, and finally `Bug`.
#[must_use]
pub fn resolve_labels(catalog: &LabelCatalog, labels: &BTreeSet<String>, title: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for label in labels {
        match catalog.id_for(label) {
            Some(id) if !ids.iter().any(|known| known == id) => ids.push(id.to_owned()),
            Some(_) => {}
            None => info!(label = %label, "mapping fallback: unknown label dropped"),
        }
    }
    if !ids.is_empty() {
        return ids;
    }

    let implied = label_from_title(title);
    let id = catalog.id_for(implied).unwrap_or_else(|| catalog.fallback_id());
    info!(implied, "mapping fallback: label taken from title");
    vec![id.to_owned()]
}

/// Resolve every mappable field.
#[must_use]
pub fn map_fields(fields: &TicketFields, roster: &Roster, catalog: &LabelCatalog) -> MappedFields {
    let assignee = resolve_assignee(roster, fields.assignee_name.as_deref());
    MappedFields {
        priority_ordinal: fields.priority.ordinal(),
        assignee_id: Some(assignee.assignee_id.clone()),
        label_ids: resolve_labels(catalog, &fields.labels, &fields.title),
    }
}
