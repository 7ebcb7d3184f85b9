//! Issue tracker abstraction.
//!
//! [`IssueTracker`] covers the two tracker capabilities the pipeline needs:
//! creating an issue and the two-phase asset upload (reserve an upload
//! target, then transfer the bytes).

pub mod linear;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::models::ticket::{CreatedIssue, ResolvedTicket};
use crate::Result;

/// Upload slot returned by the tracker's storage endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Pre-signed URL the payload is sent to.
    pub upload_url: String,
    /// Public URL the asset is served from once uploaded.
    pub asset_url: String,
    /// Extra headers the upload request must carry.
    pub headers: Vec<(String, String)>,
}

/// Tracker operations used by the pipeline.
pub trait IssueTracker: Send + Sync {
    /// Submit one issue-creation mutation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::TicketSubmission`](crate::AppError::TicketSubmission)
    /// when the tracker reports errors or cannot be reached.
    fn create_issue<'a>(
        &'a self,
        ticket: &'a ResolvedTicket,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedIssue>> + Send + 'a>>;

    /// Reserve an upload target for a file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Attachment`](crate::AppError::Attachment) on failure.
    fn request_upload<'a>(
        &'a self,
        content_type: &'a str,
        filename: &'a str,
        size: usize,
    ) -> Pin<Box<dyn Future<Output = Result<UploadTarget>> + Send + 'a>>;

    /// Transfer the payload to a reserved target.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Attachment`](crate::AppError::Attachment) on failure.
    fn upload<'a>(
        &'a self,
        target: &'a UploadTarget,
        content_type: &'a str,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
