//! Telegram updates in, [`InboundEvent`]s out.

use std::time::Duration;

use teloxide::{
    prelude::*,
    requests::Request,
    types::{AllowedUpdate, Update, UpdateKind},
};
use tokio::{sync::mpsc, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fortuna_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{CallbackQuery, InboundEvent, IncomingMessage},
};

/// Convert one update. Anything other than a text message or a callback
/// query yields `None`.
pub fn convert_update(update: Update) -> Option<InboundEvent> {
    match update.kind {
        UpdateKind::Message(m) => convert_message(&m).map(InboundEvent::Message),
        UpdateKind::CallbackQuery(q) => Some(InboundEvent::Callback(convert_callback(q))),
        _ => None,
    }
}

fn convert_message(m: &Message) -> Option<IncomingMessage> {
    let from = m.from()?;
    let text = m.text()?;
    Some(IncomingMessage::from_text(
        ChatId(m.chat.id.0),
        UserId(from.id.0 as i64),
        text,
    ))
}

fn convert_callback(q: teloxide::types::CallbackQuery) -> CallbackQuery {
    CallbackQuery {
        callback_id: q.id,
        user_id: UserId(q.from.id.0 as i64),
        message: q.message.map(|m| MessageRef {
            chat_id: ChatId(m.chat.id.0),
            message_id: MessageId(m.id.0),
        }),
        data: q.data.unwrap_or_default(),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
    pub timeout: Duration,
    pub error_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// Long-poll `getUpdates` and forward converted events to `tx` until
/// `shutdown` fires or the receiving side goes away.
pub async fn poll_updates(
    bot: Bot,
    cfg: PollConfig,
    tx: mpsc::Sender<InboundEvent>,
    shutdown: CancellationToken,
) {
    let timeout = u32::try_from(cfg.timeout.as_secs()).unwrap_or(u32::MAX);
    let mut offset: i32 = 0;
    info!(timeout_secs = timeout, "update poller started");

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            res = request.send() => res,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = update.id + 1;
                    let Some(event) = convert_update(update) else {
                        continue;
                    };
                    debug!(user_id = event.sender().0, kind = event.kind(), "update received");
                    if tx.send(event).await.is_err() {
                        warn!("dispatcher gone, stopping update poller");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = sleep(cfg.error_backoff) => {}
                }
            }
        }
    }

    info!("update poller stopped");
}
