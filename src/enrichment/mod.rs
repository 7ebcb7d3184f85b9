//! Generative text service abstraction.
//!
//! The [`EnrichmentClient`] trait is the seam between the pipeline and
//! whichever chat-completions backend turns a raw report into a ticket
//! draft. Its output is untrusted text; callers parse it defensively.

pub mod openai;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::Result;

/// Screenshot shown to the model alongside the prompt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PromptImage {
    /// Name listed in the prompt text.
    pub filename: String,
    /// `data:<mime>;base64,...` URL.
    pub data_url: String,
}

/// A fully-built enrichment call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrichmentRequest {
    /// Model identifier.
    pub model: String,
    /// Pins output format and the no-attachments contract.
    pub system_instruction: String,
    /// Schema, roster, report text and image references.
    pub user_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Screenshots sent as image content parts.
    pub images: Vec<PromptImage>,
}

/// Backend that completes an [`EnrichmentRequest`] into raw text.
pub trait EnrichmentClient: Send + Sync {
    /// Run the completion and return the model's text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Enrichment`](crate::AppError::Enrichment) on
    /// transport failure, non-2xx status, or an empty completion.
    fn complete<'a>(
        &'a self,
        request: &'a EnrichmentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}
