//! Static name → canonical-id tables: the team roster and the label catalog.
//!
//! Both are built once from configuration at startup and shared read-only
//! for the lifetime of the process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ticket::{capitalize, FALLBACK_LABEL};
use crate::{AppError, Result};

/// One person who can be assigned tickets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RosterEntry {
    /// Display name, e.g. `Bhavik Patel`.
    pub name: String,
    /// Role shown to the model in parentheses.
    #[serde(default)]
    pub role: Option<String>,
    /// What this person is best suited for.
    pub expertise: String,
    /// Tracker user identifier.
    pub assignee_id: String,
    /// Alternative handles that resolve to the same person.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl RosterEntry {
    fn answers_to(&self, normalized: &str) -> bool {
        self.name.trim().to_lowercase() == normalized
            || self
                .aliases
                .iter()
                .any(|alias| alias.trim().to_lowercase() == normalized)
    }
}

/// Assignable people plus the designated fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    default_index: usize,
}

impl Roster {
    /// Build a roster whose fallback is the entry named `default_assignee`
    /// (matched against names and aliases, case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the roster is empty or the default
    /// does not name an entry.
    pub fn new(entries: Vec<RosterEntry>, default_assignee: &str) -> Result<Self> {
        if entries.is_empty() {
            return Err(AppError::Config("roster must not be empty".into()));
        }
        let wanted = default_assignee.trim().to_lowercase();
        let default_index = entries
            .iter()
            .position(|entry| entry.answers_to(&wanted))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "default_assignee '{default_assignee}' is not on the roster"
                ))
            })?;
        Ok(Self {
            entries,
            default_index,
        })
    }

    /// Find the entry for an already-normalized (lowercase) name.
    #[must_use]
    pub fn lookup(&self, normalized_name: &str) -> Option<&RosterEntry> {
        let wanted = normalized_name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.entries.iter().find(|entry| entry.answers_to(&wanted))
    }

    /// The designated fallback entry.
    #[must_use]
    pub fn default_entry(&self) -> &RosterEntry {
        &self.entries[self.default_index]
    }

    /// Numbered roster description used to bias the model's recommendation.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            let who = match entry.role.as_deref() {
                Some(role) if !role.trim().is_empty() => format!("{} ({})", entry.name, role),
                _ => entry.name.clone(),
            };
            out.push_str(&format!(
                "{}. **{who}:** Best for {}.\n",
                idx + 1,
                entry.expertise.trim_end_matches('.')
            ));
        }
        out
    }
}

/// Label name → tracker label id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: BTreeMap<String, String>,
}

impl LabelCatalog {
    /// Build a catalog. Names are capitalized so lookups match
    /// normalized tokens.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the `Bug` entry is missing or an id
    /// is blank.
    pub fn new(labels: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut normalized = BTreeMap::new();
        for (name, id) in labels {
            if id.trim().is_empty() {
                return Err(AppError::Config(format!("label '{name}' has an empty id")));
            }
            normalized.insert(capitalize(name.trim()), id.trim().to_owned());
        }
        if !normalized.contains_key(FALLBACK_LABEL) {
            return Err(AppError::Config(format!(
                "label catalog must contain a '{FALLBACK_LABEL}' entry"
            )));
        }
        Ok(Self { labels: normalized })
    }

    /// Id for a label name, compared case-insensitively.
    #[must_use]
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.labels.get(&capitalize(name.trim())).map(String::as_str)
    }

    /// Id of the `Bug` entry.
    #[must_use]
    pub fn fallback_id(&self) -> &str {
        self.labels
            .get(FALLBACK_LABEL)
            .map_or("", String::as_str)
    }
}
