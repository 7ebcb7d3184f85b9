//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Slack API or Socket Mode failure.
    Slack(String),
    /// Report text too short to be actionable. Carries the user-facing guidance.
    InsufficientContext(String),
    /// Generative text service unreachable, errored, or returned nothing.
    Enrichment(String),
    /// A single attachment could not be fetched, normalized, or uploaded.
    Attachment(String),
    /// Issue tracker rejected the mutation or the transport failed.
    TicketSubmission(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::InsufficientContext(msg) => write!(f, "insufficient context: {msg}"),
            Self::Enrichment(msg) => write!(f, "enrichment: {msg}"),
            Self::Attachment(msg) => write!(f, "attachment: {msg}"),
            Self::TicketSubmission(msg) => write!(f, "ticket submission: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
