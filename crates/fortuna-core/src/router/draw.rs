use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{EventRouter, RouterSettings};
use crate::{
    callback::CallbackAction,
    claim::ClaimError,
    deadline::Deadline,
    domain::{ChatId, Promotion, UserId},
    messaging::{
        gateway::OutboundGateway,
        port::MessagingPort,
        types::{InlineButton, InlineKeyboard, PhotoSource, Sendable},
    },
    texts,
};

fn draw_keyboard() -> InlineKeyboard {
    InlineKeyboard::row(vec![InlineButton::callback(
        texts::DRAW_BUTTON,
        CallbackAction::Draw.payload(),
    )])
}

fn shop_keyboard(settings: &RouterSettings) -> Option<InlineKeyboard> {
    settings
        .shop_url
        .as_ref()
        .map(|url| InlineKeyboard::row(vec![InlineButton::url(texts::SHOP_BUTTON, url.clone())]))
}

fn with_shop_button(settings: &RouterSettings, html: &str) -> Sendable {
    match shop_keyboard(settings) {
        Some(keyboard) => Sendable::with_keyboard(html, keyboard),
        None => Sendable::text(html),
    }
}

impl EventRouter {
    pub(super) async fn send_start(&self, chat_id: ChatId, user_id: UserId, deadline: Deadline) {
        if let Err(e) = deadline
            .sub(self.settings.upsert_timeout)
            .run("upsert user", self.store.upsert_user(user_id))
            .await
        {
            warn!(user_id = user_id.0, error = %e, "failed to record user");
        }

        let item = match &self.settings.start_photo {
            Some(photo) => Sendable::photo(photo.clone(), texts::START_CAPTION, Some(draw_keyboard())),
            None => Sendable::with_keyboard(texts::START_CAPTION, draw_keyboard()),
        };
        self.reply(chat_id, item).await;
    }

    async fn is_subscribed(&self, user_id: UserId, deadline: Deadline) -> bool {
        let Some(sub) = &self.settings.subscription else {
            return true;
        };
        let lookup = deadline
            .sub(self.settings.membership_timeout)
            .run(
                "membership lookup",
                self.gateway.chat_member_status(sub.chat_id, user_id),
            )
            .await;
        match lookup {
            Ok(status) => status.is_subscribed(),
            Err(e) => {
                warn!(user_id = user_id.0, error = %e, "membership lookup failed, treating as not subscribed");
                false
            }
        }
    }

    pub(super) async fn draw(&self, chat_id: ChatId, user_id: UserId, deadline: Deadline) {
        if !self.is_subscribed(user_id, deadline).await {
            let link = self
                .settings
                .subscription
                .as_ref()
                .map(|s| s.link.as_str())
                .unwrap_or_default();
            let keyboard = InlineKeyboard::row(vec![InlineButton::callback(
                texts::CHECK_SUBSCRIPTION_BUTTON,
                CallbackAction::Draw.payload(),
            )]);
            return self
                .reply(chat_id, Sendable::with_keyboard(texts::subscribe_prompt(link), keyboard))
                .await;
        }

        let claimed = self
            .claims
            .claim_before(user_id, deadline.sub(self.settings.store_timeout))
            .await;
        match claimed {
            Ok(promotion) => {
                info!(user_id = user_id.0, promotion_id = promotion.id.0, "promotion claimed");
                self.reply(chat_id, Sendable::dice()).await;
                self.spawn_reveal(chat_id, promotion);
            }
            Err(ClaimError::AlreadyClaimed) => {
                debug!(user_id = user_id.0, "repeat draw");
                self.reply(chat_id, with_shop_button(&self.settings, texts::ALREADY_CLAIMED))
                    .await;
            }
            Err(ClaimError::NoPromotions) => {
                debug!(user_id = user_id.0, "draw with empty catalog");
                self.reply(chat_id, Sendable::text(texts::NO_PROMOTIONS)).await;
            }
            Err(ClaimError::Store(e)) => {
                error!(user_id = user_id.0, error = %e, "claim failed");
                self.reply(chat_id, Sendable::text(texts::TRY_LATER)).await;
            }
        }
    }

    /// The reveal outlives the event: it is not bound to the event deadline.
    fn spawn_reveal(&self, chat_id: ChatId, promotion: Promotion) {
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        tokio::spawn(reveal(gateway, settings, chat_id, promotion));
    }
}

async fn reveal(
    gateway: Arc<OutboundGateway>,
    settings: Arc<RouterSettings>,
    chat_id: ChatId,
    promotion: Promotion,
) {
    sleep(settings.reveal_delay).await;

    let html = texts::reveal(&promotion.value);
    let item = match promotion.image_url.as_deref() {
        Some(image) => Sendable::photo(PhotoSource::parse(image), html, None),
        None => Sendable::text(html),
    };
    gateway.deliver(chat_id, item).await;

    sleep(settings.followup_delay).await;
    gateway
        .deliver(chat_id, with_shop_button(&settings, texts::CLAIMED_FOLLOWUP))
        .await;
}
