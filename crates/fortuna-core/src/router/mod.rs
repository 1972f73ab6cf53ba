//! Event classification and the bot's user flows.
//!
//! One [`EventRouter`] serves every worker. For a message the precedence is:
//! admin command, public command, admin free text (dialog), otherwise ignored.
//! Callbacks are acknowledged before anything else happens.

mod admin;
mod draw;

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    callback::CallbackAction,
    claim::ClaimService,
    config::{Config, Subscription},
    deadline::Deadline,
    dialog::DialogStateStore,
    dispatch::EventHandler,
    domain::{ChatId, UserId},
    messaging::{
        gateway::OutboundGateway,
        port::MessagingPort,
        types::{CallbackQuery, InboundEvent, IncomingMessage, PhotoSource, Sendable},
    },
    store::Store,
    Result,
};

/// Knobs the flows need; everything else comes in through the constructor.
#[derive(Clone, Debug)]
pub struct RouterSettings {
    pub admin_id: UserId,
    pub shop_url: Option<String>,
    pub subscription: Option<Subscription>,
    pub start_photo: Option<PhotoSource>,
    pub reveal_delay: Duration,
    pub followup_delay: Duration,
    /// Sub-deadline for claim and catalog store calls.
    pub store_timeout: Duration,
    /// Sub-deadline for recording a user on the start screen.
    pub upsert_timeout: Duration,
    /// Sub-deadline for the subscription lookup.
    pub membership_timeout: Duration,
}

impl RouterSettings {
    pub fn new(admin_id: UserId) -> Self {
        Self {
            admin_id,
            shop_url: None,
            subscription: None,
            start_photo: None,
            reveal_delay: Duration::from_secs(2),
            followup_delay: Duration::from_secs(1),
            store_timeout: Duration::from_millis(500),
            upsert_timeout: Duration::from_millis(300),
            membership_timeout: Duration::from_secs(2),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            shop_url: cfg.shop_url.clone(),
            subscription: cfg.subscription.clone(),
            start_photo: cfg.start_photo.clone(),
            reveal_delay: cfg.reveal_delay,
            followup_delay: cfg.followup_delay,
            ..Self::new(cfg.admin_id)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AdminCommand {
    Start,
    Promotions,
    AddPromotion,
    Cancel,
}

impl AdminCommand {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(AdminCommand::Start),
            "promotions" | "packs" => Some(AdminCommand::Promotions),
            "addpromotion" | "addpack" => Some(AdminCommand::AddPromotion),
            "cancel" => Some(AdminCommand::Cancel),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PublicCommand {
    Start,
    Draw,
}

impl PublicCommand {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(PublicCommand::Start),
            "draw" => Some(PublicCommand::Draw),
            _ => None,
        }
    }
}

pub struct EventRouter {
    settings: Arc<RouterSettings>,
    store: Arc<dyn Store>,
    gateway: Arc<OutboundGateway>,
    claims: ClaimService,
    dialogs: DialogStateStore,
}

impl EventRouter {
    pub fn new(settings: RouterSettings, store: Arc<dyn Store>, gateway: Arc<OutboundGateway>) -> Self {
        let claims = ClaimService::new(store.clone(), settings.admin_id);
        let dialogs = DialogStateStore::new(store.clone(), settings.store_timeout);
        Self {
            settings: Arc::new(settings),
            store,
            gateway,
            claims,
            dialogs,
        }
    }

    /// Best-effort reply; failures are logged by the gateway.
    async fn reply(&self, chat_id: ChatId, item: Sendable) {
        self.gateway.deliver(chat_id, item).await;
    }

    /// Run a catalog/claim store call under the store sub-deadline.
    async fn store_call<T, F>(&self, what: &'static str, deadline: Deadline, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        deadline.sub(self.settings.store_timeout).run(what, fut).await
    }

    async fn on_message(&self, msg: IncomingMessage, deadline: Deadline) {
        let is_admin = self.claims.is_admin(msg.user_id);

        if let Some(name) = msg.command.as_deref() {
            if is_admin {
                if let Some(cmd) = AdminCommand::parse(name) {
                    return self.admin_command(cmd, &msg, deadline).await;
                }
            }
            match PublicCommand::parse(name) {
                Some(PublicCommand::Start) => {
                    self.send_start(msg.chat_id, msg.user_id, deadline).await
                }
                Some(PublicCommand::Draw) => self.draw(msg.chat_id, msg.user_id, deadline).await,
                None => debug!(user_id = msg.user_id.0, command = name, "unrecognized command ignored"),
            }
            return;
        }

        if is_admin {
            self.admin_text(&msg, deadline).await;
        }
    }

    async fn on_callback(&self, query: CallbackQuery, deadline: Deadline) {
        if !query.callback_id.is_empty() {
            if let Err(e) = self.gateway.answer_callback_query(&query.callback_id, None).await {
                warn!(user_id = query.user_id.0, error = %e, "callback acknowledgment failed");
            }
        }

        let Some(origin) = query.message else {
            debug!(user_id = query.user_id.0, "callback without originating message dropped");
            return;
        };
        let chat_id = origin.chat_id;
        let user_id = query.user_id;

        let Some(action) = CallbackAction::parse(&query.data) else {
            debug!(user_id = user_id.0, data = %query.data, "unrecognized callback payload ignored");
            return;
        };

        if action.is_admin_only() && !self.claims.is_admin(user_id) {
            warn!(user_id = user_id.0, data = %query.data, "admin callback from non-admin ignored");
            return;
        }

        match action {
            CallbackAction::Start => self.send_start(chat_id, user_id, deadline).await,
            CallbackAction::Draw => self.draw(chat_id, user_id, deadline).await,
            CallbackAction::Promotion(id) => self.promotion_menu(chat_id, id, deadline).await,
            CallbackAction::Edit(id) => self.begin_edit(chat_id, user_id, id, deadline).await,
            CallbackAction::Delete(id) => self.ask_delete(chat_id, id, deadline).await,
            CallbackAction::ConfirmDelete(id) => self.delete(chat_id, id, deadline).await,
        }
    }
}

#[async_trait]
impl EventHandler for EventRouter {
    async fn handle(&self, event: InboundEvent, deadline: Deadline) {
        match event {
            InboundEvent::Message(msg) => self.on_message(msg, deadline).await,
            InboundEvent::Callback(query) => self.on_callback(query, deadline).await,
        }
    }
}
