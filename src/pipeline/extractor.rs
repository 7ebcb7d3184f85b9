//! Field extraction from an enriched ticket draft.
//!
//! The draft is untrusted markdown: sections may be missing, reordered,
//! misspelled, or accompanied by an attachments section the model was told
//! not to write. [`parse_sections`] makes one pass over the text, splits it
//! on bold `**Header:**` markers into a [`DraftSections`] record, and drops
//! attachment content on the way:
//!
//! 1. lines beginning with `attachments:` (any case) are discarded;
//! 2. a `**Attachments:**` marker discards everything up to the next bold
//!    header or end of text, including the `**Attachments:** None` form.
//!
//! [`extract_fields`] then turns the record into [`TicketFields`], taking a
//! named default for every missing value.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::ticket::{
    capitalize, default_description, default_title, is_emphasis, label_from_title, Priority,
    ReproDetails, TicketFields,
};

#[allow(clippy::expect_used)] // literal pattern
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:[-*+]\s+)?\*\*\s*(?P<name>[A-Za-z][A-Za-z /]*?)\s*(?::\s*\*\*|\*\*\s*:)\s*(?P<rest>.*)$",
    )
    .expect("header pattern")
});

#[allow(clippy::expect_used)] // literal pattern
static ATTACHMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*attachments?:").expect("attachment line pattern"));

#[allow(clippy::expect_used)] // literal pattern
static INLINE_ATTACHMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*\*\s*attachments?\s*:\s*\*\*").expect("inline attachments pattern")
});

#[allow(clippy::expect_used)] // literal pattern
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)?").expect("parenthetical pattern"));

/// Known section names, after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Title,
    Description,
    Priority,
    Assignee,
    Labels,
    Steps,
    Expected,
    Actual,
    Attachments,
    Other,
}

impl SectionKind {
    fn from_header(name: &str) -> Self {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match normalized.as_str() {
            "title" | "summary" => Self::Title,
            "description" => Self::Description,
            "priority" => Self::Priority,
            "recommended assignee" | "assignee" => Self::Assignee,
            "labels" | "label" => Self::Labels,
            "steps to reproduce" | "steps" | "reproduction steps" => Self::Steps,
            "expected behavior" | "expected behaviour" | "expected" | "expected result" => {
                Self::Expected
            }
            "actual behavior" | "actual behaviour" | "actual" | "actual result" => Self::Actual,
            "attachments" | "attachment" => Self::Attachments,
            _ => Self::Other,
        }
    }
}

#[derive(Debug)]
struct RawSection {
    kind: SectionKind,
    inline: String,
    body: Vec<String>,
}

impl RawSection {
    /// Rest of the header line, or the first non-blank line after it.
    fn single_line(&self) -> Option<String> {
        std::iter::once(self.inline.as_str())
            .chain(self.body.iter().map(String::as_str))
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
    }

    /// First paragraph: leading blank lines skipped, stops at the next blank line.
    fn paragraph(&self) -> Option<String> {
        let lines: Vec<&str> = std::iter::once(self.inline.as_str())
            .chain(self.body.iter().map(String::as_str))
            .map(str::trim)
            .skip_while(|line| line.is_empty())
            .take_while(|line| !line.is_empty())
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    /// Every line up to the next header, outer blank lines removed.
    fn block(&self) -> Option<String> {
        let lines: Vec<&str> = std::iter::once(self.inline.as_str())
            .chain(self.body.iter().map(String::as_str))
            .map(str::trim)
            .collect();
        let start = lines.iter().position(|line| !line.is_empty())?;
        let end = lines.iter().rposition(|line| !line.is_empty())?;
        Some(lines[start..=end].join("\n"))
    }
}

/// Named sections recovered from a draft. Absent sections are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftSections {
    /// `**Title:**`
    pub title: Option<String>,
    /// `**Description:**`, first paragraph only.
    pub description: Option<String>,
    /// `**Priority:**`
    pub priority: Option<String>,
    /// `**Recommended Assignee:**`
    pub assignee: Option<String>,
    /// `**Labels:**`
    pub labels: Option<String>,
    /// `**Steps to Reproduce:**`
    pub steps: Option<String>,
    /// `**Expected Behavior:**`
    pub expected: Option<String>,
    /// `**Actual Behavior:**`
    pub actual: Option<String>,
    /// Number of attachment sections or lines that were discarded.
    pub attachments_dropped: usize,
}

/// Split a draft into named sections in a single pass.
///
/// When a header appears more than once the first occurrence wins.
#[must_use]
pub fn parse_sections(text: &str) -> DraftSections {
    let mut sections: Vec<RawSection> = Vec::new();
    let mut dropped = 0_usize;

    for line in text.lines() {
        if ATTACHMENT_LINE.is_match(line) {
            dropped += 1;
            continue;
        }

        if let Some(caps) = HEADER.captures(line) {
            let kind = SectionKind::from_header(&caps["name"]);
            let rest = caps.name("rest").map_or("", |m| m.as_str());
            open_section(&mut sections, &mut dropped, kind, rest);
            continue;
        }

        // Whatever precedes the first header is preamble and is ignored.
        if let Some(kind) = sections.last().map(|section| section.kind) {
            push_body_line(&mut sections, &mut dropped, kind, line);
        }
    }

    let mut out = DraftSections {
        attachments_dropped: dropped,
        ..DraftSections::default()
    };
    for section in &sections {
        let (target, value) = match section.kind {
            SectionKind::Title => (&mut out.title, section.single_line()),
            SectionKind::Description => (&mut out.description, section.paragraph()),
            SectionKind::Priority => (&mut out.priority, section.single_line()),
            SectionKind::Assignee => (&mut out.assignee, section.single_line()),
            SectionKind::Labels => (&mut out.labels, section.single_line()),
            SectionKind::Steps => (&mut out.steps, section.block()),
            SectionKind::Expected => (&mut out.expected, section.block()),
            SectionKind::Actual => (&mut out.actual, section.block()),
            SectionKind::Attachments | SectionKind::Other => continue,
        };
        if target.is_none() {
            *target = value;
        }
    }
    out
}

/// Open a new section for a header line. Header content that itself holds
/// an inline `**Attachments:**` marker is cut there and the remainder
/// becomes a discarded attachments section.
fn open_section(
    sections: &mut Vec<RawSection>,
    dropped: &mut usize,
    kind: SectionKind,
    rest: &str,
) {
    if kind == SectionKind::Attachments {
        *dropped += 1;
        sections.push(RawSection {
            kind,
            inline: String::new(),
            body: Vec::new(),
        });
        return;
    }

    match INLINE_ATTACHMENTS.find(rest) {
        Some(found) => {
            sections.push(RawSection {
                kind,
                inline: rest[..found.start()].trim_end().to_owned(),
                body: Vec::new(),
            });
            *dropped += 1;
            sections.push(RawSection {
                kind: SectionKind::Attachments,
                inline: String::new(),
                body: Vec::new(),
            });
        }
        None => sections.push(RawSection {
            kind,
            inline: rest.to_owned(),
            body: Vec::new(),
        }),
    }
}

fn push_body_line(
    sections: &mut Vec<RawSection>,
    dropped: &mut usize,
    kind: SectionKind,
    line: &str,
) {
    if kind == SectionKind::Attachments {
        return;
    }
    let Some(current) = sections.last_mut() else {
        return;
    };
    match INLINE_ATTACHMENTS.find(line) {
        Some(found) => {
            let kept = line[..found.start()].trim_end();
            if !kept.is_empty() {
                current.body.push(kept.to_owned());
            }
            *dropped += 1;
            sections.push(RawSection {
                kind: SectionKind::Attachments,
                inline: String::new(),
                body: Vec::new(),
            });
        }
        None => current.body.push(line.to_owned()),
    }
}

/// Lowercase an assignee, drop parenthetical annotations and anything
/// after the first `-` or `,`.
///
/// `"Bhavik Patel (Founding Engineer)"` becomes `"bhavik patel"`.
#[must_use]
pub fn normalize_assignee(raw: &str) -> Option<String> {
    let unstyled = raw.replace("**", "").replace(['*', '`'], "");
    let without_roles = PARENTHETICAL.replace_all(&unstyled, "");
    let name = without_roles
        .split(['-', ',', '–', '—'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches('.')
        .trim()
        .to_lowercase();
    (!name.is_empty()).then_some(name)
}

/// Split a label line on commas and capitalize each token.
#[must_use]
pub fn parse_labels(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|token| {
            token
                .trim()
                .trim_matches(|c: char| is_emphasis(c) || c == '.')
                .trim()
        })
        .filter(|token| !token.is_empty())
        .map(capitalize)
        .collect()
}

/// Title of a draft, or the placeholder.
#[must_use]
pub fn extract_title(sections: &DraftSections) -> String {
    sections.title.clone().unwrap_or_else(|| {
        debug!(field = "title", "extraction default applied");
        default_title()
    })
}

/// Sanitized description paragraph, or the placeholder.
#[must_use]
pub fn extract_description(sections: &DraftSections) -> String {
    sections.description.clone().unwrap_or_else(|| {
        debug!(field = "description", "extraction default applied");
        default_description()
    })
}

/// Priority of a draft. Missing or unrecognized values become `Medium`.
#[must_use]
pub fn extract_priority(sections: &DraftSections) -> Priority {
    match sections.priority.as_deref() {
        Some(raw) => Priority::parse(raw).unwrap_or_else(|| {
            debug!(field = "priority", raw, "mapping fallback: unrecognized priority");
            Priority::default()
        }),
        None => {
            debug!(field = "priority", "extraction default applied");
            Priority::default()
        }
    }
}

/// Normalized assignee name, if the draft names one.
#[must_use]
pub fn extract_assignee(sections: &DraftSections) -> Option<String> {
    let name = sections.assignee.as_deref().and_then(normalize_assignee);
    if name.is_none() {
        debug!(field = "assignee", "extraction default applied");
    }
    name
}

/// Label tokens; never empty. Without explicit labels the title decides
/// between `Feature`, `Improvement` and `Bug`.
#[must_use]
pub fn extract_labels(sections: &DraftSections) -> BTreeSet<String> {
    let labels = sections
        .labels
        .as_deref()
        .map(parse_labels)
        .unwrap_or_default();
    if !labels.is_empty() {
        return labels;
    }
    let fallback = label_from_title(sections.title.as_deref().unwrap_or_default());
    debug!(field = "labels", fallback, "extraction default applied");
    BTreeSet::from([fallback.to_owned()])
}

/// Parse a draft into fully-populated ticket fields.
#[must_use]
pub fn extract_fields(enriched: &str) -> TicketFields {
    let sections = parse_sections(enriched);
    if sections.attachments_dropped > 0 {
        debug!(
            count = sections.attachments_dropped,
            "discarded model-written attachment content"
        );
    }
    TicketFields {
        title: extract_title(&sections),
        description: extract_description(&sections),
        priority: extract_priority(&sections),
        assignee_name: extract_assignee(&sections),
        labels: extract_labels(&sections),
        details: ReproDetails {
            steps_to_reproduce: sections.steps.clone(),
            expected: sections.expected.clone(),
            actual: sections.actual.clone(),
        },
    }
}
