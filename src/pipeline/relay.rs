//! Attachment relay: moves shared files from the chat platform into the
//! tracker's storage.
//!
//! Every attachment is downloaded once, before enrichment, so supported
//! images can also be shown to the model. Downloads and uploads run
//! concurrently per attachment. A failure (download, empty payload,
//! upload) is logged and that attachment is skipped; it never aborts
//! ticket creation.

use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures_util::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, info, warn};

use crate::enrichment::PromptImage;
use crate::models::report::{Attachment, IncidentReport};
use crate::tracker::IssueTracker;
use crate::{AppError, Result};

/// MIME used for payloads with no usable declared or detected type.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Largest image inlined into the enrichment prompt.
pub const MAX_PROMPT_IMAGE_BYTES: usize = 20 * 1024 * 1024;

const JPEG_QUALITY: u8 = 90;

/// Authenticated download of a shared file.
pub trait AttachmentSource: Send + Sync {
    /// Download the attachment's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Attachment`](crate::AppError::Attachment) when
    /// the download fails.
    fn fetch<'a>(
        &'a self,
        attachment: &'a Attachment,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send + 'a>>;
}

/// Image formats the tracker renders inline and the model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG.
    Png,
    /// JPEG.
    Jpeg,
    /// GIF.
    Gif,
    /// WebP.
    Webp,
}

impl ImageFormat {
    /// Map a detected format onto the supported set.
    #[must_use]
    pub fn supported(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::WebP => Some(Self::Webp),
            _ => None,
        }
    }

    /// Canonical MIME type.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// A downloaded attachment ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedFile {
    /// Content type to upload under.
    pub content_type: String,
    /// Filename to upload under.
    pub filename: String,
    /// Bytes to upload, re-encoded when the original format is unsupported.
    pub payload: Bytes,
}

impl PreparedFile {
    /// Whether the payload is an image in a supported format.
    #[must_use]
    pub fn is_inline_image(&self) -> bool {
        ["image/png", "image/jpeg", "image/gif", "image/webp"].contains(&self.content_type.as_str())
    }

    /// `data:` URL carrying the payload.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64.encode(&self.payload)
        )
    }
}

fn with_extension(filename: &str, extension: &str) -> String {
    if filename.contains('.') {
        filename.to_owned()
    } else {
        format!("{filename}.{extension}")
    }
}

fn replace_extension(filename: &str, extension: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    format!("{stem}.{extension}")
}

fn encode_jpeg(payload: &[u8]) -> image::ImageResult<Vec<u8>> {
    let rgb = image::load_from_memory(payload)?.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out)
}

/// Content type, filename and bytes to upload a payload under.
///
/// Non-image attachments keep their declared type. Image payloads in a
/// supported format take the type of their actual bytes, and a filename
/// without an extension gains one. Other images are re-encoded as JPEG;
/// images that cannot be decoded are relayed as plain files.
///
/// # Errors
///
/// Returns `AppError::Attachment` for an empty payload.
pub fn normalize_payload(attachment: &Attachment, payload: Bytes) -> Result<PreparedFile> {
    if payload.is_empty() {
        return Err(AppError::Attachment(format!(
            "{} downloaded as an empty file",
            attachment.filename
        )));
    }

    if !attachment.is_image() {
        let content_type = if attachment.mime_type.trim().is_empty() {
            FALLBACK_CONTENT_TYPE.to_owned()
        } else {
            attachment.mime_type.clone()
        };
        return Ok(PreparedFile {
            content_type,
            filename: attachment.filename.clone(),
            payload,
        });
    }

    let detected = image::guess_format(&payload).ok();
    if let Some(format) = detected.and_then(ImageFormat::supported) {
        if !format.mime().eq_ignore_ascii_case(&attachment.mime_type) {
            debug!(
                filename = %attachment.filename,
                declared = %attachment.mime_type,
                actual = format.mime(),
                "image type corrected from payload"
            );
        }
        return Ok(PreparedFile {
            content_type: format.mime().to_owned(),
            filename: with_extension(&attachment.filename, format.extension()),
            payload,
        });
    }

    match encode_jpeg(&payload) {
        Ok(jpeg) => {
            info!(
                filename = %attachment.filename,
                detected = ?detected,
                "unsupported image format; converted to jpeg"
            );
            Ok(PreparedFile {
                content_type: ImageFormat::Jpeg.mime().to_owned(),
                filename: replace_extension(&attachment.filename, ImageFormat::Jpeg.extension()),
                payload: Bytes::from(jpeg),
            })
        }
        Err(err) => {
            warn!(
                filename = %attachment.filename,
                declared = %attachment.mime_type,
                %err,
                "image could not be decoded; relaying as plain file"
            );
            Ok(PreparedFile {
                content_type: FALLBACK_CONTENT_TYPE.to_owned(),
                filename: attachment.filename.clone(),
                payload,
            })
        }
    }
}

async fn prepare_one(source: &dyn AttachmentSource, attachment: &Attachment) -> Result<PreparedFile> {
    let payload = source.fetch(attachment).await?;
    let owned = attachment.clone();
    // Decoding and re-encoding is CPU bound.
    tokio::task::spawn_blocking(move || normalize_payload(&owned, payload))
        .await
        .map_err(|err| AppError::Attachment(format!("image conversion task failed: {err}")))?
}

/// Download and normalize every attachment of a report concurrently.
/// Results are in input order; failures stay per attachment.
pub async fn fetch_attachments(
    source: &dyn AttachmentSource,
    report: &IncidentReport,
) -> Vec<Result<PreparedFile>> {
    join_all(
        report
            .attachments
            .iter()
            .map(|attachment| prepare_one(source, attachment)),
    )
    .await
}

/// Images to show the model, as `data:` URLs.
#[must_use]
pub fn prompt_images(report: &IncidentReport, prepared: &[Result<PreparedFile>]) -> Vec<PromptImage> {
    report
        .attachments
        .iter()
        .zip(prepared)
        .filter_map(|(attachment, result)| {
            let file = result.as_ref().ok()?;
            if !attachment.is_image() || !file.is_inline_image() {
                return None;
            }
            if file.payload.len() > MAX_PROMPT_IMAGE_BYTES {
                warn!(filename = %file.filename, size = file.payload.len(), "image too large for prompt");
                return None;
            }
            Some(PromptImage {
                filename: file.filename.clone(),
                data_url: file.data_url(),
            })
        })
        .collect()
}

async fn upload_one(tracker: &dyn IssueTracker, file: &PreparedFile) -> Result<String> {
    let target = tracker
        .request_upload(&file.content_type, &file.filename, file.payload.len())
        .await?;
    tracker
        .upload(&target, &file.content_type, file.payload.clone())
        .await?;
    Ok(target.asset_url)
}

async fn relay_one(tracker: &dyn IssueTracker, prepared: Result<PreparedFile>) -> Result<String> {
    upload_one(tracker, &prepared?).await
}

/// Upload every prepared attachment. Returns the attachments with
/// `uploaded_asset_url` set for those that succeeded, in input order.
pub async fn relay_attachments(
    tracker: &dyn IssueTracker,
    report: &IncidentReport,
    prepared: Vec<Result<PreparedFile>>,
) -> Vec<Attachment> {
    let results = join_all(prepared.into_iter().map(|file| relay_one(tracker, file))).await;

    report
        .attachments
        .iter()
        .zip(results)
        .map(|(attachment, result)| {
            let mut relayed = attachment.clone();
            match result {
                Ok(asset_url) => {
                    debug!(report_id = %report.report_id, filename = %attachment.filename, "attachment relayed");
                    relayed.uploaded_asset_url = Some(asset_url);
                }
                Err(err) => {
                    warn!(
                        report_id = %report.report_id,
                        filename = %attachment.filename,
                        %err,
                        "attachment skipped"
                    );
                }
            }
            relayed
        })
        .collect()
}

/// Asset URLs of successfully relayed attachments.
#[must_use]
pub fn asset_urls(attachments: &[Attachment]) -> Vec<&str> {
    attachments
        .iter()
        .filter_map(|attachment| attachment.uploaded_asset_url.as_deref())
        .collect()
}

/// Append a freshly written attachments section. No-op without URLs.
#[must_use]
pub fn append_attachments_section(description: &str, urls: &[&str]) -> String {
    if urls.is_empty() {
        return description.to_owned();
    }
    let mut out = description.trim_end().to_owned();
    out.push_str("\n\n**Attachments:**\n");
    for url in urls {
        let _ = writeln!(out, "- {url}");
    }
    info!(count = urls.len(), "attachments section appended");
    out.trim_end().to_owned()
}
