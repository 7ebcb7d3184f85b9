//! OpenAI-compatible chat-completions client.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EnrichmentClient, EnrichmentRequest};
use crate::config::EnrichmentConfig;
use crate::http::{send_with_retry, RetryPolicy};
use crate::{AppError, Result};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

/// Plain text without images; text plus one `image_url` part per image
/// otherwise.
fn user_content(request: &EnrichmentRequest) -> MessageContent<'_> {
    if request.images.is_empty() {
        return MessageContent::Text(&request.user_prompt);
    }
    let mut parts = Vec::with_capacity(request.images.len() + 1);
    parts.push(ContentPart::Text {
        text: &request.user_prompt,
    });
    parts.extend(request.images.iter().map(|image| ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: &image.data_url,
        },
    }));
    MessageContent::Parts(parts)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client authenticating with a bearer API key.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl ChatCompletionsClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be created.
    pub fn new(config: &EnrichmentConfig, policy: RetryPolicy) -> Result<Self> {
        let http = policy
            .client()
            .map_err(|err| AppError::Config(format!("failed to build enrichment client: {err}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            policy,
        })
    }

    async fn call(&self, request: &EnrichmentRequest) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system_instruction),
                },
                ChatMessage {
                    role: "user",
                    content: user_content(request),
                },
            ],
            temperature: request.temperature,
        };

        let response = send_with_retry("chat_completion", &self.policy, || {
            self.http
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await
        .map_err(|err| AppError::Enrichment(err.to_string()))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| AppError::Enrichment(format!("malformed completion body: {err}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Enrichment("completion returned no content".into()))?;

        debug!(
            model = %request.model,
            images = request.images.len(),
            chars = text.len(),
            "completion received"
        );
        Ok(text)
    }
}

impl EnrichmentClient for ChatCompletionsClient {
    fn complete<'a>(
        &'a self,
        request: &'a EnrichmentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.call(request))
    }
}
