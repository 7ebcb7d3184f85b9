#![forbid(unsafe_code)]

//! `bugline`: Slack bug intake bot.
//!
//! Bootstraps configuration and credentials, builds the report pipeline,
//! then runs the Slack Socket Mode listener and the health endpoint until
//! a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use bugline::config::GlobalConfig;
use bugline::enrichment::openai::ChatCompletionsClient;
use bugline::pipeline::PipelineContext;
use bugline::slack::files::SlackFileFetcher;
use bugline::tracker::linear::LinearClient;
use bugline::{health, slack, AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "bugline", about = "Turns Slack bug reports into Linear tickets", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("bugline bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    info!(
        team_id = %config.linear.team_id,
        model = %config.enrichment.model,
        roster = config.roster.len(),
        "configuration loaded"
    );

    // ── Build the pipeline ──────────────────────────────
    let policy = config.http.retry_policy();
    let enrichment = Arc::new(ChatCompletionsClient::new(&config.enrichment, policy)?);
    let tracker = Arc::new(LinearClient::new(&config.linear, policy)?);
    let attachments = Arc::new(SlackFileFetcher::new(config.slack.bot_token.clone(), policy)?);
    let context = Arc::new(PipelineContext::from_config(
        &config,
        enrichment,
        tracker,
        attachments,
    )?);

    // ── Start Slack ─────────────────────────────────────
    let slack_runtime = slack::client::start(&config.slack, context)
        .await
        .map_err(|err| {
            error!(%err, "slack service start failed");
            err
        })?;

    // ── Start health endpoint ───────────────────────────
    let ct = CancellationToken::new();
    let health_ct = ct.clone();
    let port = config.http_port;
    let health_handle = tokio::spawn(async move {
        if let Err(err) = health::serve_health(port, health_ct).await {
            error!(%err, "health endpoint failed");
        }
    });

    info!("bugline ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    slack_runtime.socket_task.abort();
    slack_runtime.queue_task.abort();
    let _ = health_handle.await;
    info!("bugline shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
