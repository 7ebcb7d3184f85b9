//! Incident report and attachment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of an attachment by its MIME type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// `image/*` payload; counts as visual evidence.
    Image,
    /// Any other file type.
    Other,
}

impl AttachmentKind {
    /// Classify a MIME type by its `image/` prefix (case-insensitive).
    #[must_use]
    pub fn classify(mime_type: &str) -> Self {
        let prefix = mime_type.trim().get(..6);
        if prefix.is_some_and(|p| p.eq_ignore_ascii_case("image/")) {
            Self::Image
        } else {
            Self::Other
        }
    }
}

/// A file shared alongside a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Attachment {
    /// Private URL on the chat platform; requires an authenticated fetch.
    pub source_url: String,
    /// Original file name.
    pub filename: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Derived from `mime_type`.
    pub kind: AttachmentKind,
    /// Public tracker asset URL, set once the relay succeeds.
    pub uploaded_asset_url: Option<String>,
}

impl Attachment {
    /// Construct an attachment and classify it.
    #[must_use]
    pub fn new(
        source_url: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        let mime_type = mime_type.into();
        Self {
            source_url: source_url.into(),
            filename: filename.into(),
            kind: AttachmentKind::classify(&mime_type),
            mime_type,
            uploaded_asset_url: None,
        }
    }

    /// Whether this attachment is visual evidence.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }
}

/// Where a report came from and where the reply should go.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SourceRef {
    /// Chat channel identifier.
    pub channel_id: String,
    /// Thread timestamp to reply into, if any.
    pub thread_ts: Option<String>,
}

/// Raw event handed over by the chat adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Submitting user.
    pub author_id: String,
    /// Message text as typed.
    pub text: String,
    /// Channel and thread of the message.
    pub thread_ref: SourceRef,
    /// Files shared with the message.
    pub attachments: Vec<Attachment>,
}

/// A validated report. Created once per inbound event and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IncidentReport {
    /// Correlation identifier used in logs.
    pub report_id: String,
    /// Trimmed report text.
    pub raw_text: String,
    /// Submitting user.
    pub author_id: String,
    /// Channel/thread reference.
    pub source_ref: SourceRef,
    /// All shared files, images and others.
    pub attachments: Vec<Attachment>,
    /// Time the report passed validation.
    pub received_at: DateTime<Utc>,
}

impl IncidentReport {
    /// Construct a report from already-validated parts.
    #[must_use]
    pub fn new(
        raw_text: String,
        author_id: String,
        source_ref: SourceRef,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4().to_string(),
            raw_text,
            author_id,
            source_ref,
            attachments,
            received_at: Utc::now(),
        }
    }

    /// Image attachments only.
    pub fn images(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }
}
