//! Report-to-ticket pipeline.
//!
//! A report moves through
//! `Received → Validated → Enriched → Parsed → Mapped → AttachmentsRelayed
//! → Submitted → Succeeded | Failed`. Only three failures are terminal:
//! insufficient context, enrichment failure, and ticket submission
//! failure. Extraction defaults, mapping fallbacks and per-attachment
//! errors are absorbed along the way.
//!
//! All collaborators arrive through [`PipelineContext`]; there is no
//! global client state.

pub mod enrich;
pub mod extractor;
pub mod mapper;
pub mod normalizer;
pub mod prompt;
pub mod relay;
pub mod synthesizer;

use std::sync::Arc;

use tracing::{debug, info, info_span, Instrument};

use self::prompt::PromptSettings;
use self::relay::AttachmentSource;
use crate::config::GlobalConfig;
use crate::enrichment::EnrichmentClient;
use crate::models::directory::{LabelCatalog, Roster};
use crate::models::report::{InboundEvent, IncidentReport};
use crate::models::ticket::CreatedIssue;
use crate::tracker::IssueTracker;
use crate::{AppError, Result};

/// Collaborators and read-only tables shared by every report.
pub struct PipelineContext {
    /// Generative text backend.
    pub enrichment: Arc<dyn EnrichmentClient>,
    /// Issue tracker.
    pub tracker: Arc<dyn IssueTracker>,
    /// Chat-platform file downloads.
    pub attachments: Arc<dyn AttachmentSource>,
    /// Assignable people.
    pub roster: Arc<Roster>,
    /// Label ids.
    pub labels: Arc<LabelCatalog>,
    /// Tracker team receiving the issues.
    pub team_id: String,
    /// Model settings.
    pub prompt: PromptSettings,
}

impl PipelineContext {
    /// Build a context from configuration and concrete collaborators.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the roster or label catalog is invalid.
    pub fn from_config(
        config: &GlobalConfig,
        enrichment: Arc<dyn EnrichmentClient>,
        tracker: Arc<dyn IssueTracker>,
        attachments: Arc<dyn AttachmentSource>,
    ) -> Result<Self> {
        Ok(Self {
            enrichment,
            tracker,
            attachments,
            roster: Arc::new(config.roster()?),
            labels: Arc::new(config.label_catalog()?),
            team_id: config.linear.team_id.clone(),
            prompt: PromptSettings {
                model: config.enrichment.model.clone(),
                temperature: config.enrichment.temperature,
                include_image_urls: config.enrichment.include_image_urls,
            },
        })
    }
}

/// Per-report processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStage {
    /// Event accepted from the chat adapter.
    Received,
    /// Text passed validation.
    Validated,
    /// Draft returned by the generative service.
    Enriched,
    /// Draft parsed into fields.
    Parsed,
    /// Fields resolved to ids.
    Mapped,
    /// Attachments relayed (or skipped).
    AttachmentsRelayed,
    /// Creation mutation sent.
    Submitted,
    /// Ticket exists.
    Succeeded,
    /// Terminal failure.
    Failed,
}

fn advance(stage: ReportStage) {
    debug!(?stage, "report stage");
}

/// Reply to deliver back to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Channel to post in.
    pub channel_id: String,
    /// Thread to post in.
    pub thread_ts: Option<String>,
    /// Plain-text body.
    pub text: String,
}

/// Process a validated report into a created issue.
///
/// # Errors
///
/// Returns `AppError::Enrichment` or `AppError::TicketSubmission`; all
/// other problems are absorbed.
pub async fn process_report(ctx: &PipelineContext, report: &IncidentReport) -> Result<CreatedIssue> {
    advance(ReportStage::Validated);

    let prepared = relay::fetch_attachments(ctx.attachments.as_ref(), report).await;
    let images = if ctx.prompt.include_image_urls {
        relay::prompt_images(report, &prepared)
    } else {
        Vec::new()
    };

    let request = prompt::build_request(report, &ctx.roster, &ctx.prompt, images);
    let draft = enrich::enrich(ctx.enrichment.as_ref(), &request).await?;
    advance(ReportStage::Enriched);

    let fields = extractor::extract_fields(&draft);
    debug!(
        title = %fields.title,
        priority = fields.priority.as_str(),
        labels = ?fields.labels,
        "draft parsed"
    );
    advance(ReportStage::Parsed);

    let mapped = mapper::map_fields(&fields, &ctx.roster, &ctx.labels);
    advance(ReportStage::Mapped);

    let relayed = relay::relay_attachments(ctx.tracker.as_ref(), report, prepared).await;
    let description = relay::append_attachments_section(
        &synthesizer::render_body(&fields),
        &relay::asset_urls(&relayed),
    );
    advance(ReportStage::AttachmentsRelayed);

    let ticket = synthesizer::assemble(&ctx.team_id, &fields, mapped, description);
    advance(ReportStage::Submitted);
    synthesizer::submit(ctx.tracker.as_ref(), &ticket).await
}

/// User-facing reply for a pipeline result.
#[must_use]
pub fn compose_reply(author_id: &str, result: &Result<CreatedIssue>) -> String {
    match result {
        Ok(issue) => format!(
            "Thanks for reporting the bug, <@{author_id}>! A ticket has been created in Linear: {}",
            issue.url
        ),
        Err(AppError::InsufficientContext(guidance)) => format!(
            "<@{author_id}>, I need a bit more detail to file this. {guidance}"
        ),
        Err(AppError::TicketSubmission(_)) => format!(
            "Sorry <@{author_id}>, your report was processed but the ticket could not be \
             created in Linear. Your report is still here in the thread; please try again \
             later or file it manually."
        ),
        Err(_) => format!(
            "Sorry <@{author_id}>, there was an error processing your bug report."
        ),
    }
}

/// Validate, process and answer one inbound event. Never fails: every
/// outcome becomes a reply.
pub async fn handle_event(ctx: &PipelineContext, event: InboundEvent) -> Reply {
    let channel_id = event.thread_ref.channel_id.clone();
    let thread_ts = event.thread_ref.thread_ts.clone();
    let author_id = event.author_id.clone();
    advance(ReportStage::Received);

    let result = match normalizer::normalize(event) {
        Ok(report) => {
            let span = info_span!("report", report_id = %report.report_id, author_id = %report.author_id);
            process_report(ctx, &report).instrument(span).await
        }
        Err(err) => Err(err),
    };

    match &result {
        Ok(issue) => {
            advance(ReportStage::Succeeded);
            info!(author_id, url = %issue.url, "report succeeded");
        }
        Err(err) => {
            advance(ReportStage::Failed);
            info!(author_id, %err, "report failed");
        }
    }

    Reply {
        channel_id,
        thread_ts,
        text: compose_reply(&author_id, &result),
    }
}
