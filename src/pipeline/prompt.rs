//! Deterministic enrichment request construction.

use std::fmt::Write as _;

use crate::enrichment::{EnrichmentRequest, PromptImage};
use crate::models::directory::Roster;
use crate::models::report::IncidentReport;

/// System instruction. Pins the markdown format and forbids an
/// attachments section; the relay writes that section itself.
pub const SYSTEM_INSTRUCTION: &str = "You format bug reports into a structured ticket exactly \
following the Markdown format provided. Do not alter the markdown syntax. Do not include any \
section with 'Attachments:' in your response.";

/// Field schema in the fixed order the extractor expects.
const FIELD_SCHEMA: &str = "\
**Title:** <a concise summary of the issue>

**Description:** <detailed explanation of the bug, one paragraph>

**Priority:** <High, Medium, or Low>

**Recommended Assignee:** <choose the team member best suited>

**Labels:** <choose one: Bug, Feature, or Improvement>

**Steps to Reproduce:** <numbered steps, if they can be inferred>

**Expected Behavior:** <what should happen>

**Actual Behavior:** <what happens instead>
";

/// Model settings carried into every request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSettings {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether screenshots are sent to the model.
    pub include_image_urls: bool,
}

/// Build the user prompt: schema, roster, report text, attached screenshot names.
#[must_use]
pub fn build_user_prompt(report: &IncidentReport, roster: &Roster, images: &[PromptImage]) -> String {
    let mut prompt = String::from(
        "You are the best AI product manager. Read the following raw bug report and produce \
         a structured ticket with the following exact format:\n\n",
    );
    prompt.push_str(FIELD_SCHEMA);
    prompt.push_str("\nTeam Members:\n");
    prompt.push_str(&roster.describe());
    prompt.push_str("\nRaw Bug Report:\n");
    prompt.push_str(&report.raw_text);
    prompt.push('\n');

    if !images.is_empty() {
        prompt.push_str(
            "\nThe reporter attached these screenshots, included as images below. Use them as \
             visual evidence when describing the bug:\n",
        );
        for image in images {
            let _ = writeln!(prompt, "- {}", image.filename);
        }
        prompt.push_str(
            "\nThey will be linked on the ticket automatically. Do not add an Attachments \
             section.\n",
        );
    }
    prompt
}

/// Build the complete enrichment request for a report. `images` are
/// dropped when screenshots are disabled.
#[must_use]
pub fn build_request(
    report: &IncidentReport,
    roster: &Roster,
    settings: &PromptSettings,
    images: Vec<PromptImage>,
) -> EnrichmentRequest {
    let images = if settings.include_image_urls {
        images
    } else {
        Vec::new()
    };
    EnrichmentRequest {
        model: settings.model.clone(),
        system_instruction: SYSTEM_INSTRUCTION.to_owned(),
        user_prompt: build_user_prompt(report, roster, &images),
        temperature: settings.temperature,
        images,
    }
}
