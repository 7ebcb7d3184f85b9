//! Global configuration parsing, validation, and credential loading.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::http::RetryPolicy;
use crate::models::directory::{LabelCatalog, Roster, RosterEntry};
use crate::{AppError, Result};

/// Keychain service under which credentials are looked up.
const KEYRING_SERVICE: &str = "bugline";

/// Slack connectivity and trigger settings.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// not from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Plain channel messages containing this keyword are treated as reports.
    /// An empty keyword disables keyword triggering.
    #[serde(default = "default_trigger_keyword")]
    pub trigger_keyword: String,
    /// Whether `@bot` mentions are treated as reports.
    #[serde(default = "default_true")]
    pub listen_to_mentions: bool,
    /// App-level token used for Socket Mode (populated at runtime).
    #[serde(skip)]
    pub app_token: String,
    /// Bot user token used for posting and file downloads (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            trigger_keyword: default_trigger_keyword(),
            listen_to_mentions: true,
            app_token: String::new(),
            bot_token: String::new(),
        }
    }
}

/// Linear issue tracker settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LinearConfig {
    /// Team that owns created issues. May be supplied via `LINEAR_TEAM_ID`.
    #[serde(default)]
    pub team_id: String,
    /// GraphQL endpoint.
    #[serde(default = "default_linear_api_url")]
    pub api_url: String,
    /// Personal API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            team_id: String::new(),
            api_url: default_linear_api_url(),
            api_key: String::new(),
        }
    }
}

/// Generative text service settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct EnrichmentConfig {
    /// Chat-completions endpoint.
    #[serde(default = "default_enrichment_api_url")]
    pub api_url: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature; moderate and non-zero.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Whether screenshots are sent to the model as inline images.
    #[serde(default = "default_true")]
    pub include_image_urls: bool,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_url: default_enrichment_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            include_image_urls: true,
            api_key: String::new(),
        }
    }
}

/// Outbound HTTP hardening.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Retries after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl HttpConfig {
    /// Retry policy derived from these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_seconds),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_trigger_keyword() -> String {
    "bug!".into()
}

fn default_linear_api_url() -> String {
    "https://api.linear.app/graphql".into()
}

fn default_enrichment_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_http_port() -> u16 {
    5005
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Slack connectivity settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Linear settings.
    #[serde(default)]
    pub linear: LinearConfig,
    /// Generative text service settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Outbound HTTP timeouts and retries.
    #[serde(default)]
    pub http: HttpConfig,
    /// Port of the health endpoint.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Label name → Linear label id. Must contain `Bug` once env
    /// overrides are applied.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Assignable team members.
    pub roster: Vec<RosterEntry>,
    /// Roster name or alias used when the model's pick cannot be mapped.
    pub default_assignee: String,
}

impl GlobalConfig {
    /// Load configuration from a TOML file, apply process environment
    /// overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str_with_env(&raw, |key| env::var(key).ok())
    }

    /// Parse and validate configuration from a TOML string without
    /// consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Self::from_toml_str_with_env(raw, |_| None)
    }

    /// Parse configuration, apply overrides from `lookup`, then validate.
    ///
    /// Recognized overrides: `LINEAR_TEAM_ID`, `LINEAR_BUG_LABEL_ID`,
    /// `LINEAR_FEATURE_LABEL_ID`, `LINEAR_IMPROVEMENT_LABEL_ID`,
    /// `OPENAI_MODEL`. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str_with_env<F>(raw: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = toml::from_str(raw)?;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(team_id) = get("LINEAR_TEAM_ID") {
            self.linear.team_id = team_id.trim().to_owned();
        }
        for (label, key) in [
            ("Bug", "LINEAR_BUG_LABEL_ID"),
            ("Feature", "LINEAR_FEATURE_LABEL_ID"),
            ("Improvement", "LINEAR_IMPROVEMENT_LABEL_ID"),
        ] {
            if let Some(id) = get(key) {
                self.labels.retain(|name, _| !name.eq_ignore_ascii_case(label));
                self.labels.insert(label.to_owned(), id.trim().to_owned());
            }
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.enrichment.model = model.trim().to_owned();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.linear.team_id.trim().is_empty() {
            return Err(AppError::Config(
                "linear.team_id must be set (or LINEAR_TEAM_ID provided)".into(),
            ));
        }

        if self.enrichment.model.trim().is_empty() {
            return Err(AppError::Config("enrichment.model must not be empty".into()));
        }

        if !(self.enrichment.temperature > 0.0 && self.enrichment.temperature <= 2.0) {
            return Err(AppError::Config(
                "enrichment.temperature must be in (0, 2]".into(),
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(AppError::Config(
                "http.timeout_seconds must be greater than zero".into(),
            ));
        }

        // Surface roster and catalog problems at startup rather than per report.
        self.roster()?;
        self.label_catalog()?;

        Ok(())
    }

    /// Build the roster from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the roster is empty or the default
    /// assignee is not on it.
    pub fn roster(&self) -> Result<Roster> {
        Roster::new(self.roster.clone(), &self.default_assignee)
    }

    /// Build the label catalog from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the `Bug` label is missing.
    pub fn label_catalog(&self) -> Result<LabelCatalog> {
        LabelCatalog::new(self.labels.clone())
    }

    /// Load service credentials from OS keychain with env-var fallback.
    ///
    /// Tries the `bugline` keyring service first, then falls back to
    /// `SLACK_APP_TOKEN`, `SLACK_BOT_TOKEN`, `LINEAR_API_KEY` and
    /// `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env vars provide
    /// a required credential.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.app_token = load_credential("slack_app_token", "SLACK_APP_TOKEN").await?;
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        self.linear.api_key = load_credential("linear_api_key", "LINEAR_API_KEY").await?;
        self.enrichment.api_key = load_credential("openai_api_key", "OPENAI_API_KEY").await?;
        info!("credentials loaded");
        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
