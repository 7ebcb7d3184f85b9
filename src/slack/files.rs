//! Authenticated downloads of files shared in Slack.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::http::{send_with_retry, RetryPolicy};
use crate::models::report::Attachment;
use crate::pipeline::relay::AttachmentSource;
use crate::{AppError, Result};

/// Downloads `url_private` files with the bot token.
pub struct SlackFileFetcher {
    http: reqwest::Client,
    bot_token: String,
    policy: RetryPolicy,
}

impl SlackFileFetcher {
    /// Build a fetcher.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be created.
    pub fn new(bot_token: impl Into<String>, policy: RetryPolicy) -> Result<Self> {
        let http = policy
            .client()
            .map_err(|err| AppError::Config(format!("failed to build file client: {err}")))?;
        Ok(Self {
            http,
            bot_token: bot_token.into(),
            policy,
        })
    }

    async fn download(&self, attachment: &Attachment) -> Result<Bytes> {
        let response = send_with_retry("file_download", &self.policy, || {
            self.http
                .get(&attachment.source_url)
                .bearer_auth(&self.bot_token)
        })
        .await
        .map_err(|err| {
            AppError::Attachment(format!("download of {} failed: {err}", attachment.filename))
        })?;

        // Slack answers an unauthorized file URL with its HTML sign-in page.
        let html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/html"));
        if html && !attachment.mime_type.starts_with("text/html") {
            return Err(AppError::Attachment(format!(
                "download of {} returned a sign-in page; check the files:read scope",
                attachment.filename
            )));
        }

        let payload = response.bytes().await.map_err(|err| {
            AppError::Attachment(format!("reading {} failed: {err}", attachment.filename))
        })?;
        debug!(filename = %attachment.filename, size = payload.len(), "attachment downloaded");
        Ok(payload)
    }
}

impl AttachmentSource for SlackFileFetcher {
    fn fetch<'a>(
        &'a self,
        attachment: &'a Attachment,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send + 'a>> {
        Box::pin(self.download(attachment))
    }
}
