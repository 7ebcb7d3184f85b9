//! Ticket field models, from parsed draft to tracker-ready payload.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Placeholder title used when the draft has none.
pub const DEFAULT_TITLE: &str = "Bug Report Ticket";

/// Placeholder description used when the draft has none.
pub const DEFAULT_DESCRIPTION: &str = "No description provided.";

/// Label applied when nothing else matches.
pub const FALLBACK_LABEL: &str = "Bug";

/// Markdown emphasis and quoting characters models wrap values in.
#[must_use]
pub fn is_emphasis(c: char) -> bool {
    matches!(c, '*' | '`' | '_' | '"')
}

/// Ticket urgency on the three-level scale the tracker receives.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Ordinal 0.
    Low,
    /// Ordinal 1. Default for missing or unrecognized values.
    #[default]
    Medium,
    /// Ordinal 2. Also the target for `urgent`.
    High,
}

impl Priority {
    /// Map a free-form priority word. Returns `None` when it is not recognized.
    ///
    /// Leading markdown emphasis is ignored. Only the first word is considered, so `"High - affects checkout"`
    /// maps to [`Priority::High`]. `Urgent` has no ordinal of its own and
    /// collapses to [`Priority::High`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let word: String = raw
            .trim_start_matches(|c: char| c.is_whitespace() || is_emphasis(c))
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .collect();
        match word.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" | "urgent" => Some(Self::High),
            _ => None,
        }
    }

    /// Numeric value sent to the tracker, always within `0..=2`.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Optional reproduction blocks carried into the ticket body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReproDetails {
    /// Numbered steps, kept verbatim.
    pub steps_to_reproduce: Option<String>,
    /// Expected behavior.
    pub expected: Option<String>,
    /// Actual behavior.
    pub actual: Option<String>,
}

impl ReproDetails {
    /// True when no block was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps_to_reproduce.is_none() && self.expected.is_none() && self.actual.is_none()
    }
}

/// Typed fields parsed from an enriched draft. Every field is populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TicketFields {
    /// Concise summary.
    pub title: String,
    /// Sanitized description paragraph.
    pub description: String,
    /// Parsed urgency.
    pub priority: Priority,
    /// Normalized (lowercase, annotation-free) assignee name.
    pub assignee_name: Option<String>,
    /// Capitalized label tokens; never empty.
    pub labels: BTreeSet<String>,
    /// Reproduction blocks.
    pub details: ReproDetails,
}

/// Title default.
#[must_use]
pub fn default_title() -> String {
    DEFAULT_TITLE.to_owned()
}

/// Description default.
#[must_use]
pub fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_owned()
}

/// Label implied by keywords in a title, falling back to `Bug`.
#[must_use]
pub fn label_from_title(title: &str) -> &'static str {
    let lowered = title.to_lowercase();
    if lowered.contains("feature") {
        "Feature"
    } else if lowered.contains("improvement") {
        "Improvement"
    } else {
        FALLBACK_LABEL
    }
}

/// Upper-case the first character and lower-case the rest.
#[must_use]
pub fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Ticket with every field resolved to tracker identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ResolvedTicket {
    /// Tracker team identifier.
    pub team_id: String,
    /// Issue title.
    pub title: String,
    /// Final markdown body, including any relayed attachments.
    pub description: String,
    /// `0..=2`.
    pub priority_ordinal: u8,
    /// Canonical assignee identifier.
    pub assignee_id: Option<String>,
    /// Canonical label identifiers; never empty.
    pub label_ids: Vec<String>,
}

/// Issue reference returned by the tracker after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedIssue {
    /// Tracker issue identifier.
    pub id: String,
    /// Title as stored by the tracker.
    pub title: String,
    /// Browser URL of the issue.
    pub url: String,
}
