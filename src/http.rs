//! Outbound HTTP helpers: timeout-bounded client and transient-failure retry.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use reqwest::{header::RETRY_AFTER, RequestBuilder, Response, StatusCode};
use tracing::warn;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 500;

/// Timeout and retry settings applied to every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Build a `reqwest` client honoring the timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error if the TLS backend fails to
    /// initialize.
    pub fn client(&self) -> std::result::Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder().timeout(self.timeout).build()
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

/// Final failure of a request after retries were exhausted.
#[derive(Debug)]
pub enum HttpFailure {
    /// The request never produced a response.
    Transport(reqwest::Error),
    /// The server answered with a non-success status.
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body, truncated.
        body: String,
    },
}

impl Display for HttpFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "request failed: {err}"),
            Self::Status { status, body } if body.is_empty() => write!(f, "http {status}"),
            Self::Status { status, body } => write!(f, "http {status}: {body}"),
        }
    }
}

impl std::error::Error for HttpFailure {}

/// Statuses worth another attempt.
#[must_use]
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_DELAY))
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_owned(),
    }
}

/// Send a request, retrying transient transport errors and `429`/`5xx`
/// responses up to `policy.max_retries` times. Only success responses are
/// returned as `Ok`.
///
/// `build` is invoked once per attempt because a `RequestBuilder` is
/// consumed by `send`.
///
/// # Errors
///
/// Returns [`HttpFailure`] describing the last attempt.
pub async fn send_with_retry<F>(
    operation: &str,
    policy: &RetryPolicy,
    mut build: F,
) -> std::result::Result<Response, HttpFailure>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0_u32;
    loop {
        attempt = attempt.saturating_add(1);
        let can_retry = attempt <= policy.max_retries;

        match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let wait = retry_after(&response).unwrap_or_else(|| policy.delay_for(attempt));
                let body = response.text().await.unwrap_or_default();
                if can_retry && is_transient_status(status) {
                    warn!(operation, %status, attempt, delay = ?wait, "transient http status; retrying");
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(HttpFailure::Status {
                    status,
                    body: truncate(&body),
                });
            }
            Err(err) => {
                if can_retry && is_transient_error(&err) {
                    let wait = policy.delay_for(attempt);
                    warn!(operation, %err, attempt, delay = ?wait, "transient transport error; retrying");
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(HttpFailure::Transport(err));
            }
        }
    }
}
