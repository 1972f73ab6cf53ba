use std::path::PathBuf;

use crate::domain::{ChatId, MessageRef, UserId};

/// Cross-messenger inbound event model.
///
/// Telegram-specific fields live in the Telegram adapter; once converted an
/// event is immutable and owned by whichever worker dequeues it.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    Message(IncomingMessage),
    Callback(CallbackQuery),
}

impl InboundEvent {
    pub fn sender(&self) -> UserId {
        match self {
            InboundEvent::Message(m) => m.user_id,
            InboundEvent::Callback(q) => q.user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Message(m) if m.command.is_some() => "command",
            InboundEvent::Message(_) => "text",
            InboundEvent::Callback(_) => "callback",
        }
    }
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    /// Lowercased command name without the leading `/` or `@botname` suffix.
    pub command: Option<String>,
    /// Command arguments, or the whole body for free text.
    pub text: String,
}

impl IncomingMessage {
    /// Build a message from raw text, splitting off a leading `/command`.
    pub fn from_text(chat_id: ChatId, user_id: UserId, text: &str) -> Self {
        let (command, text) = match parse_command(text) {
            Some((cmd, args)) => (Some(cmd), args),
            None => (None, text.to_string()),
        };
        Self {
            chat_id,
            user_id,
            command,
            text,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub callback_id: String,
    pub user_id: UserId,
    /// Inline callbacks may arrive without an originating message.
    pub message: Option<MessageRef>,
    pub data: String,
}

/// Split `/cmd@botname arg1 ...` into (`cmd`, `arg1 ...`).
///
/// Returns `None` for text that is not a command.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();
    if cmd.is_empty() {
        return None;
    }

    Some((cmd, rest))
}

/// Where a photo comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhotoSource {
    Url(String),
    File(PathBuf),
}

impl PhotoSource {
    /// `http(s)://` references are URLs, everything else is a local path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            PhotoSource::Url(raw.to_string())
        } else {
            PhotoSource::File(PathBuf::from(raw))
        }
    }
}

/// Something the gateway can deliver to a chat.
#[derive(Clone, Debug)]
pub enum Sendable {
    Text {
        html: String,
        keyboard: Option<InlineKeyboard>,
    },
    Photo {
        photo: PhotoSource,
        caption_html: Option<String>,
        keyboard: Option<InlineKeyboard>,
    },
    Dice {
        emoji: String,
    },
}

impl Sendable {
    pub fn text(html: impl Into<String>) -> Self {
        Sendable::Text {
            html: html.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(html: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Sendable::Text {
            html: html.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn photo(
        photo: PhotoSource,
        caption_html: impl Into<String>,
        keyboard: Option<InlineKeyboard>,
    ) -> Self {
        Sendable::Photo {
            photo,
            caption_html: Some(caption_html.into()),
            keyboard,
        }
    }

    pub fn dice() -> Self {
        Sendable::Dice {
            emoji: "🎲".to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Sendable::Text { .. } => "text",
            Sendable::Photo { .. } => "photo",
            Sendable::Dice { .. } => "dice",
        }
    }
}

/// Inline keyboard, row by row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub action: ButtonAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// Single-row keyboard.
    pub fn row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }

    /// Convenience for "one button per row" layouts.
    pub fn one_per_row(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    /// All callback payloads carried by this keyboard.
    pub fn callback_payloads(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match &b.action {
                ButtonAction::Callback(data) => Some(data.as_str()),
                ButtonAction::Url(_) => None,
            })
            .collect()
    }
}

/// Membership of a user in a chat, as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    pub fn is_subscribed(self) -> bool {
        matches!(
            self,
            MemberStatus::Owner | MemberStatus::Administrator | MemberStatus::Member
        )
    }
}
