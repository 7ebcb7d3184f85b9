//! Slack Socket Mode client with a small buffered send queue.

use std::sync::Arc;
use std::time::Duration;

use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiToken, SlackApiTokenType, SlackApiTokenValue,
    SlackChannelId, SlackClient, SlackClientEventsListenerEnvironment,
    SlackClientHyperHttpsConnector, SlackClientSocketModeConfig, SlackClientSocketModeListener,
    SlackMessageContent, SlackSocketModeListenerCallbacks, SlackTs,
};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{error, info, warn};

use crate::pipeline::{PipelineContext, Reply};
use crate::slack::events;
use crate::{config::SlackConfig, AppError, Result};

const QUEUE_CAPACITY: usize = 256;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const MAX_POST_ATTEMPTS: u32 = 5;

/// Message to be delivered to Slack via chat.postMessage.
#[derive(Debug, Clone)]
pub struct SlackMessage {
    /// Destination channel.
    pub channel: SlackChannelId,
    /// Plain-text body.
    pub text: String,
    /// Parent message to thread under.
    pub thread_ts: Option<SlackTs>,
}

impl SlackMessage {
    /// Create a plain-text message for a channel.
    #[must_use]
    pub fn plain(channel: SlackChannelId, text: impl Into<String>) -> Self {
        Self {
            channel,
            text: text.into(),
            thread_ts: None,
        }
    }

    /// Thread the message under `ts`.
    #[must_use]
    pub fn in_thread(mut self, ts: Option<SlackTs>) -> Self {
        self.thread_ts = ts;
        self
    }

    fn into_request(self) -> SlackApiChatPostMessageRequest {
        let content = SlackMessageContent {
            text: Some(self.text),
            markdown_text: None,
            blocks: None,
            attachments: None,
            upload: None,
            files: None,
            reactions: None,
            metadata: None,
        };

        SlackApiChatPostMessageRequest {
            channel: self.channel,
            content,
            as_user: None,
            icon_emoji: None,
            icon_url: None,
            link_names: Some(true),
            parse: None,
            thread_ts: self.thread_ts,
            username: None,
            reply_broadcast: None,
            unfurl_links: None,
            unfurl_media: None,
        }
    }
}

impl From<Reply> for SlackMessage {
    fn from(reply: Reply) -> Self {
        Self::plain(SlackChannelId(reply.channel_id), reply.text)
            .in_thread(reply.thread_ts.map(SlackTs))
    }
}

/// Listener state handed to every push-event callback.
#[derive(Clone)]
pub struct IntakeState {
    /// Shared pipeline collaborators.
    pub context: Arc<PipelineContext>,
    /// Outgoing reply queue.
    pub replies: mpsc::Sender<SlackMessage>,
    /// Keyword that turns a plain channel message into a report.
    pub trigger_keyword: String,
    /// Whether `app_mention` events are handled.
    pub listen_to_mentions: bool,
    /// The bot's own user id, for mention de-duplication.
    pub bot_user_id: String,
}

/// Join handles for Slack background tasks.
pub struct SlackRuntime {
    /// Reply sender task.
    pub queue_task: JoinHandle<()>,
    /// Socket Mode listener task.
    pub socket_task: JoinHandle<()>,
}

fn token(value: &str, token_type: SlackApiTokenType) -> SlackApiToken {
    SlackApiToken {
        token_value: SlackApiTokenValue(value.to_owned()),
        cookie: None,
        team_id: None,
        scope: None,
        token_type: Some(token_type),
    }
}

/// Start the Slack client, the reply sender task and the socket listener.
///
/// # Errors
///
/// Returns `AppError::Slack` if the HTTPS connector cannot be created or
/// the bot identity cannot be resolved.
pub async fn start(config: &SlackConfig, context: Arc<PipelineContext>) -> Result<SlackRuntime> {
    let connector = SlackClientHyperHttpsConnector::new()
        .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
    let client = Arc::new(SlackClient::new(connector));
    let bot_token = token(&config.bot_token, SlackApiTokenType::Bot);
    let app_token = token(&config.app_token, SlackApiTokenType::App);

    let identity = client
        .open_session(&bot_token)
        .auth_test()
        .await
        .map_err(|err| AppError::Slack(format!("auth.test failed: {err}")))?;
    let bot_user_id = identity.user_id.to_string();
    info!(bot_user_id, "slack bot identity resolved");

    let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
    let queue_task = spawn_worker(Arc::clone(&client), bot_token, queue_rx);

    let state = IntakeState {
        context,
        replies: queue_tx,
        trigger_keyword: config.trigger_keyword.clone(),
        listen_to_mentions: config.listen_to_mentions,
        bot_user_id,
    };
    let socket_task = spawn_socket_mode(&client, app_token, state);

    info!("slack service started with buffered queue and socket mode");

    Ok(SlackRuntime {
        queue_task,
        socket_task,
    })
}

fn spawn_worker(
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    token: SlackApiToken,
    mut queue_rx: mpsc::Receiver<SlackMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let session = client.open_session(&token);
        while let Some(message) = queue_rx.recv().await {
            let channel = message.channel.clone();
            let request = message.into_request();
            let mut backoff = INITIAL_RETRY_DELAY;
            let mut attempt = 1;
            loop {
                match session.chat_post_message(&request).await {
                    Ok(_) => {
                        info!(%channel, "sent slack message");
                        break;
                    }
                    Err(error) if attempt >= MAX_POST_ATTEMPTS => {
                        error!(?error, %channel, attempt, "slack post failed; dropping reply");
                        break;
                    }
                    Err(error) => {
                        let delay = match &error {
                            slack_morphism::errors::SlackClientError::RateLimitError(rate) => {
                                rate.retry_after.unwrap_or(backoff)
                            }
                            _ => backoff,
                        };
                        warn!(?error, delay=?delay, "slack post failed; retrying");
                        sleep(delay).await;
                        backoff = (backoff * 2).min(MAX_RETRY_DELAY);
                        attempt += 1;
                    }
                }
            }
        }
        info!("slack sender task exiting");
    })
}

fn spawn_socket_mode(
    client: &Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    app_token: SlackApiToken,
    state: IntakeState,
) -> JoinHandle<()> {
    let listener_env = Arc::new(
        SlackClientEventsListenerEnvironment::new(Arc::clone(client))
            .with_error_handler(|err, _client, _state| {
                error!(?err, "socket mode error");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            })
            .with_user_state(state),
    );
    let callbacks = SlackSocketModeListenerCallbacks::new()
        .with_hello_events(|event, _client, _state| async move {
            info!(?event, "socket hello");
        })
        .with_push_events(events::handle_push_event);
    let config = SlackClientSocketModeConfig {
        max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
        debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
        initial_backoff_in_seconds:
            SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
        reconnect_timeout_in_seconds:
            SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
        ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
        ping_failure_threshold_times:
            SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
    };

    let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
    tokio::spawn(async move {
        if let Err(error) = listener.listen_for(&app_token).await {
            error!(?error, "socket mode listen failed");
            return;
        }

        listener.serve().await;
        info!("socket mode listener exited");
    })
}
