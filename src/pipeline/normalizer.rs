//! Ingestion normalizer: validates raw report text before any network call.

use tracing::{debug, info};

use crate::models::report::{IncidentReport, InboundEvent};
use crate::{AppError, Result};

/// Minimum trimmed length, in characters, of an actionable report.
pub const MIN_REPORT_CHARS: usize = 10;

/// Guidance returned when a report is too short.
pub const GUIDANCE: &str =
    "Please include what you did, what happened, and what you expected to happen.";

/// Trim and validate an inbound event into an [`IncidentReport`].
///
/// # Errors
///
/// Returns `AppError::InsufficientContext` carrying [`GUIDANCE`] when the
/// trimmed text is shorter than [`MIN_REPORT_CHARS`].
pub fn normalize(event: InboundEvent) -> Result<IncidentReport> {
    let text = event.text.trim();
    let chars = text.chars().count();
    if chars < MIN_REPORT_CHARS {
        info!(
            author_id = %event.author_id,
            chars,
            "report rejected: insufficient context"
        );
        return Err(AppError::InsufficientContext(GUIDANCE.into()));
    }

    let report = IncidentReport::new(
        text.to_owned(),
        event.author_id,
        event.thread_ref,
        event.attachments,
    );
    debug!(
        report_id = %report.report_id,
        attachments = report.attachments.len(),
        images = report.images().count(),
        "report validated"
    );
    Ok(report)
}
