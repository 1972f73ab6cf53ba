//! Telegram adapter (teloxide).
//!
//! Implements the `fortuna-core` [`MessagingPort`] over the Telegram Bot API
//! and feeds long-polled updates into the dispatcher.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        ChatMemberKind, DiceEmoji, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
        ParseMode,
    },
};

pub mod commands;
pub mod intake;
pub mod polling;

use fortuna_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ButtonAction, InlineKeyboard, MemberStatus, PhotoSource, Sendable},
    },
    Result,
};

/// Raw Telegram client. Every call is made exactly once; retrying is the
/// caller's decision, and the bot core never retries.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn msg_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }
    }
}

fn parse_url(raw: &str) -> Result<reqwest::Url> {
    raw.parse::<reqwest::Url>()
        .map_err(|e| Error::External(format!("invalid url {raw:?}: {e}")))
}

pub(crate) fn to_markup(keyboard: InlineKeyboard) -> Result<InlineKeyboardMarkup> {
    let rows = keyboard
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|b| match b.action {
                    ButtonAction::Callback(data) => Ok(InlineKeyboardButton::callback(b.label, data)),
                    ButtonAction::Url(url) => Ok(InlineKeyboardButton::url(b.label, parse_url(&url)?)),
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(InlineKeyboardMarkup::new(rows))
}

fn to_input_file(photo: PhotoSource) -> Result<InputFile> {
    Ok(match photo {
        PhotoSource::Url(url) => InputFile::url(parse_url(&url)?),
        PhotoSource::File(path) => InputFile::file(path),
    })
}

fn to_dice_emoji(emoji: &str) -> DiceEmoji {
    match emoji {
        "🎯" => DiceEmoji::Darts,
        "🏀" => DiceEmoji::Basketball,
        "⚽" => DiceEmoji::Football,
        "🎳" => DiceEmoji::Bowling,
        "🎰" => DiceEmoji::SlotMachine,
        _ => DiceEmoji::Dice,
    }
}

pub(crate) fn to_member_status(kind: &ChatMemberKind) -> MemberStatus {
    match kind {
        ChatMemberKind::Owner(_) => MemberStatus::Owner,
        ChatMemberKind::Administrator(_) => MemberStatus::Administrator,
        ChatMemberKind::Member => MemberStatus::Member,
        ChatMemberKind::Restricted(_) => MemberStatus::Restricted,
        ChatMemberKind::Left => MemberStatus::Left,
        ChatMemberKind::Banned(_) => MemberStatus::Banned,
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send(&self, chat_id: ChatId, item: Sendable) -> Result<MessageRef> {
        let chat = Self::tg_chat(chat_id);
        let msg = match item {
            Sendable::Text { html, keyboard } => {
                let mut req = self.bot.send_message(chat, html).parse_mode(ParseMode::Html);
                if let Some(k) = keyboard {
                    req = req.reply_markup(to_markup(k)?);
                }
                req.await.map_err(Self::map_err)?
            }
            Sendable::Photo {
                photo,
                caption_html,
                keyboard,
            } => {
                let mut req = self
                    .bot
                    .send_photo(chat, to_input_file(photo)?)
                    .parse_mode(ParseMode::Html);
                if let Some(caption) = caption_html {
                    req = req.caption(caption);
                }
                if let Some(k) = keyboard {
                    req = req.reply_markup(to_markup(k)?);
                }
                req.await.map_err(Self::map_err)?
            }
            Sendable::Dice { emoji } => self
                .bot
                .send_dice(chat)
                .emoji(to_dice_emoji(&emoji))
                .await
                .map_err(Self::map_err)?,
        };
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut req = self.bot.answer_callback_query(callback_id.to_string());
        if let Some(t) = text {
            req = req.text(t.to_string());
        }
        req.await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn chat_member_status(&self, chat_id: ChatId, user_id: UserId) -> Result<MemberStatus> {
        let user = teloxide::types::UserId(
            u64::try_from(user_id.0)
                .map_err(|_| Error::External(format!("invalid telegram user id {}", user_id.0)))?,
        );
        let member = self
            .bot
            .get_chat_member(Self::tg_chat(chat_id), user)
            .await
            .map_err(Self::map_err)?;
        Ok(to_member_status(&member.kind))
    }
}

#[cfg(test)]
mod tests {
    use fortuna_core::messaging::types::InlineButton;

    use super::*;

    #[test]
    fn keyboard_rows_and_button_kinds_are_kept() {
        let keyboard = InlineKeyboard::new(vec![
            vec![
                InlineButton::callback("Edit", "edit_1"),
                InlineButton::callback("Delete", "del_1"),
            ],
            vec![InlineButton::url("Shop", "https://shop.example/book")],
        ]);

        let markup = to_markup(keyboard).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[0][1].text, "Delete");
        assert_eq!(markup.inline_keyboard[1][0].text, "Shop");
    }

    #[test]
    fn malformed_url_button_is_an_error() {
        let keyboard = InlineKeyboard::row(vec![InlineButton::url("Shop", "not a url")]);
        assert!(matches!(to_markup(keyboard), Err(Error::External(_))));
    }

    #[test]
    fn dice_emoji_defaults_to_cube() {
        assert_eq!(to_dice_emoji("🎲"), DiceEmoji::Dice);
        assert_eq!(to_dice_emoji("🎰"), DiceEmoji::SlotMachine);
        assert_eq!(to_dice_emoji("?"), DiceEmoji::Dice);
    }

    #[test]
    fn only_full_members_count_as_subscribed() {
        assert!(to_member_status(&ChatMemberKind::Member).is_subscribed());
        assert!(!to_member_status(&ChatMemberKind::Left).is_subscribed());
    }
}
