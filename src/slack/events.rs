//! Push-event intake.
//!
//! Turns `app_mention` events and keyword-triggered channel messages into
//! [`InboundEvent`]s, runs each one through the pipeline on its own task,
//! and queues the reply into the report's thread.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use slack_morphism::prelude::{
    SlackAppMentionEvent, SlackClient, SlackClientEventsUserState,
    SlackClientHyperHttpsConnector, SlackEventCallbackBody, SlackFile, SlackMessageEvent,
    SlackMessageEventType, SlackMessageOrigin, SlackPushEventCallback,
};
use tracing::{debug, info, warn};

use crate::models::report::{Attachment, InboundEvent, SourceRef};
use crate::pipeline;
use crate::slack::client::{IntakeState, SlackMessage};

#[allow(clippy::expect_used)]
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[A-Z0-9]+(?:\|[^>]*)?>").expect("static regex"));

/// Handle Socket Mode push events.
///
/// # Errors
///
/// Never fails; unusable events are logged and dropped.
pub async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::UserCallbackResult<()> {
    let intake: Option<IntakeState> = {
        let guard = state.read().await;
        guard.get_user_state::<IntakeState>().cloned()
    };
    let Some(intake) = intake else {
        warn!("intake state not available; dropping push event");
        return Ok(());
    };

    let inbound = match event.event {
        SlackEventCallbackBody::AppMention(mention) if intake.listen_to_mentions => {
            Some(from_mention(mention))
        }
        SlackEventCallbackBody::Message(message) => from_message(message, &intake),
        other => {
            debug!(?other, "push event ignored");
            None
        }
    };

    if let Some(inbound) = inbound {
        dispatch(intake, inbound);
    }
    Ok(())
}

/// Run one report on its own task; the socket callback returns immediately.
fn dispatch(intake: IntakeState, inbound: InboundEvent) {
    info!(
        author_id = %inbound.author_id,
        channel_id = %inbound.thread_ref.channel_id,
        attachments = inbound.attachments.len(),
        "bug report received"
    );
    tokio::spawn(async move {
        let reply = pipeline::handle_event(&intake.context, inbound).await;
        if let Err(err) = intake.replies.send(SlackMessage::from(reply)).await {
            warn!(%err, "reply queue closed; reply dropped");
        }
    });
}

fn from_mention(event: SlackAppMentionEvent) -> InboundEvent {
    InboundEvent {
        author_id: event.user.to_string(),
        text: strip_mentions(event.content.text.as_deref().unwrap_or_default()),
        thread_ref: source_ref(event.channel.to_string(), &event.origin),
        attachments: attachments_from_files(event.content.files.as_deref().unwrap_or_default()),
    }
}

fn from_message(event: SlackMessageEvent, intake: &IntakeState) -> Option<InboundEvent> {
    if event.sender.bot_id.is_some() {
        return None;
    }
    let accepted_subtype = matches!(event.subtype, None | Some(SlackMessageEventType::FileShare));
    if !accepted_subtype {
        return None;
    }
    let author_id = event.sender.user.as_ref()?.to_string();
    let channel_id = event.origin.channel.as_ref()?.to_string();
    let content = event.content?;
    let text = content.text.as_deref().unwrap_or_default();

    if !should_handle_message(
        text,
        &intake.trigger_keyword,
        &intake.bot_user_id,
        intake.listen_to_mentions,
    ) {
        return None;
    }

    Some(InboundEvent {
        author_id,
        text: report_text(text, &intake.trigger_keyword),
        thread_ref: source_ref(channel_id, &event.origin),
        attachments: attachments_from_files(content.files.as_deref().unwrap_or_default()),
    })
}

/// Replies thread under the report's thread, or start one on the message.
fn source_ref(channel_id: String, origin: &SlackMessageOrigin) -> SourceRef {
    let thread_ts = origin.thread_ts.as_ref().unwrap_or(&origin.ts).to_string();
    SourceRef {
        channel_id,
        thread_ts: Some(thread_ts),
    }
}

/// Whether a plain channel message is a report.
///
/// The message must contain the trigger keyword. When mentions are handled
/// separately, messages that mention the bot are left to the mention
/// handler so one report never yields two tickets.
#[must_use]
pub fn should_handle_message(
    text: &str,
    trigger_keyword: &str,
    bot_user_id: &str,
    listen_to_mentions: bool,
) -> bool {
    let keyword = trigger_keyword.trim();
    if keyword.is_empty() || !text.to_lowercase().contains(&keyword.to_lowercase()) {
        return false;
    }
    !(listen_to_mentions && text.contains(&format!("<@{bot_user_id}")))
}

/// Remove `<@U…>` user mentions and collapse the surrounding whitespace.
#[must_use]
pub fn strip_mentions(text: &str) -> String {
    MENTION
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Report text of a keyword message: mentions and the keyword removed.
#[must_use]
pub fn report_text(text: &str, trigger_keyword: &str) -> String {
    let keyword = trigger_keyword.trim();
    let stripped = strip_mentions(text);
    if keyword.is_empty() {
        return stripped;
    }
    let pattern = format!("(?i){}", regex::escape(keyword));
    match Regex::new(&pattern) {
        Ok(re) => strip_mentions(&re.replace_all(&stripped, " ")),
        Err(_) => stripped,
    }
}

/// Attachments for every shared file that has a download URL.
#[must_use]
pub fn attachments_from_files(files: &[SlackFile]) -> Vec<Attachment> {
    files
        .iter()
        .filter_map(|file| {
            let url = file
                .url_private_download
                .as_ref()
                .or(file.url_private.as_ref())?;
            let filename = file.name.clone().unwrap_or_else(|| file.id.to_string());
            let mime = file
                .mimetype
                .as_ref()
                .map(|mime| mime.0.clone())
                .unwrap_or_default();
            Some(Attachment::new(url.as_str(), filename, mime))
        })
        .collect()
}
