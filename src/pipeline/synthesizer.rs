//! Ticket synthesis: final body, payload assembly, and submission.

use tracing::{error, info};

use super::mapper::MappedFields;
use crate::models::ticket::{CreatedIssue, ResolvedTicket, TicketFields};
use crate::tracker::IssueTracker;
use crate::Result;

/// Render the ticket body from the description and any reproduction blocks.
#[must_use]
pub fn render_body(fields: &TicketFields) -> String {
    let mut body = fields.description.trim().to_owned();
    let details = &fields.details;
    if let Some(steps) = &details.steps_to_reproduce {
        body.push_str("\n\n**Steps to Reproduce:**\n");
        body.push_str(steps);
    }
    if let Some(expected) = &details.expected {
        body.push_str("\n\n**Expected Behavior:** ");
        body.push_str(expected);
    }
    if let Some(actual) = &details.actual {
        body.push_str("\n\n**Actual Behavior:** ");
        body.push_str(actual);
    }
    body
}

/// Combine parsed and mapped fields with the final description.
#[must_use]
pub fn assemble(
    team_id: &str,
    fields: &TicketFields,
    mapped: MappedFields,
    description: String,
) -> ResolvedTicket {
    ResolvedTicket {
        team_id: team_id.to_owned(),
        title: fields.title.clone(),
        description,
        priority_ordinal: mapped.priority_ordinal,
        assignee_id: mapped.assignee_id,
        label_ids: mapped.label_ids,
    }
}

/// Submit one creation mutation. No retry key: identical reports produce
/// separate issues.
///
/// # Errors
///
/// Returns `AppError::TicketSubmission` with the tracker's message.
pub async fn submit(tracker: &dyn IssueTracker, ticket: &ResolvedTicket) -> Result<CreatedIssue> {
    match tracker.create_issue(ticket).await {
        Ok(issue) => {
            info!(issue_id = %issue.id, title = %issue.title, "ticket submitted");
            Ok(issue)
        }
        Err(err) => {
            error!(%err, title = %ticket.title, "ticket submission failed");
            Err(err)
        }
    }
}
