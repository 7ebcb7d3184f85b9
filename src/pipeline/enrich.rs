//! Enrichment invocation.

use tracing::{debug, error};

use crate::enrichment::{EnrichmentClient, EnrichmentRequest};
use crate::{AppError, Result};

/// Run the enrichment call. Failure detail is logged here; callers only
/// surface a generic apology.
///
/// # Errors
///
/// Returns `AppError::Enrichment` on any backend failure or an empty draft.
pub async fn enrich(client: &dyn EnrichmentClient, request: &EnrichmentRequest) -> Result<String> {
    match client.complete(request).await {
        Ok(text) if !text.trim().is_empty() => {
            debug!(model = %request.model, chars = text.chars().count(), "draft received");
            Ok(text)
        }
        Ok(_) => {
            error!(model = %request.model, "enrichment returned empty text");
            Err(AppError::Enrichment("empty completion".into()))
        }
        Err(err) => {
            error!(model = %request.model, %err, "enrichment call failed");
            Err(match err {
                AppError::Enrichment(_) => err,
                other => AppError::Enrichment(other.to_string()),
            })
        }
    }
}
