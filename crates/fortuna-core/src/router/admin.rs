use tracing::{debug, error, info, warn};

use super::{AdminCommand, EventRouter};
use crate::{
    callback::CallbackAction,
    deadline::Deadline,
    dialog::{DialogState, DialogTransition},
    domain::{ChatId, PromotionId, UserId},
    formatting::truncate_label,
    messaging::types::{IncomingMessage, InlineButton, InlineKeyboard, Sendable},
    texts,
};

const BUTTON_LABEL_MAX: usize = 48;

fn prompt_for(state: &DialogState) -> &'static str {
    match state {
        DialogState::AddAwaitingName => texts::ADMIN_ASK_NAME,
        DialogState::AddAwaitingValue { .. } => texts::ADMIN_ASK_VALUE,
        DialogState::EditAwaitingName { .. } => texts::ADMIN_ASK_NEW_NAME,
        DialogState::EditAwaitingValue { .. } => texts::ADMIN_ASK_NEW_VALUE,
    }
}

impl EventRouter {
    pub(super) async fn admin_command(&self, cmd: AdminCommand, msg: &IncomingMessage, deadline: Deadline) {
        let chat_id = msg.chat_id;
        match cmd {
            AdminCommand::Start => self.send_start(chat_id, msg.user_id, deadline).await,
            AdminCommand::Promotions => self.list_promotions(chat_id, deadline).await,
            AdminCommand::AddPromotion => {
                self.enter_step(chat_id, msg.user_id, DialogState::AddAwaitingName, deadline)
                    .await
            }
            AdminCommand::Cancel => {
                if let Err(e) = self.dialogs.clear(msg.user_id, deadline).await {
                    warn!(user_id = msg.user_id.0, error = %e, "failed to clear dialog state");
                    return self.reply(chat_id, Sendable::text(texts::TRY_LATER)).await;
                }
                self.reply(chat_id, Sendable::text(texts::ADMIN_CANCELLED)).await;
            }
        }
    }

    /// Persist `state`, then prompt for the field it waits on.
    async fn enter_step(&self, chat_id: ChatId, user_id: UserId, state: DialogState, deadline: Deadline) {
        if let Err(e) = self.dialogs.advance(user_id, &state, deadline).await {
            warn!(user_id = user_id.0, step = state.step_name(), error = %e, "failed to save dialog state");
            return self.reply(chat_id, Sendable::text(texts::TRY_LATER)).await;
        }
        debug!(user_id = user_id.0, step = state.step_name(), "dialog advanced");
        self.reply(chat_id, Sendable::text(prompt_for(&state))).await;
    }

    /// Free text from the admin feeds the dialog, if one is open.
    pub(super) async fn admin_text(&self, msg: &IncomingMessage, deadline: Deadline) {
        let (chat_id, user_id) = (msg.chat_id, msg.user_id);

        let state = match self.dialogs.current(user_id, deadline).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(user_id = user_id.0, "admin text outside a dialog ignored");
                return;
            }
            Err(e) => {
                warn!(user_id = user_id.0, error = %e, "failed to load dialog state");
                return self.reply(chat_id, Sendable::text(texts::TRY_LATER)).await;
            }
        };

        match state.feed(&msg.text) {
            DialogTransition::Advance(next) => self.enter_step(chat_id, user_id, next, deadline).await,
            DialogTransition::Rejected(state) => {
                let html = format!("{}\n{}", texts::ADMIN_EMPTY_INPUT, prompt_for(&state));
                self.reply(chat_id, Sendable::text(html)).await;
            }
            DialogTransition::Create(new) => {
                let created = self
                    .store_call("create promotion", deadline, self.store.create_promotion(new))
                    .await;
                match created {
                    Ok(p) => {
                        info!(promotion_id = p.id.0, name = %p.name, "promotion created");
                        self.finish_dialog(user_id, deadline).await;
                        self.reply(chat_id, Sendable::text(texts::promotion_added(&p.name, &p.value)))
                            .await;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to create promotion");
                        self.reply(chat_id, Sendable::text(texts::store_failure(&e))).await;
                    }
                }
            }
            DialogTransition::Update { id, name, value } => {
                let updated = self
                    .store_call(
                        "update promotion",
                        deadline,
                        self.store.update_promotion(id, &name, &value),
                    )
                    .await;
                match updated {
                    Ok(true) => {
                        info!(promotion_id = id.0, "promotion updated");
                        self.finish_dialog(user_id, deadline).await;
                        self.reply(chat_id, Sendable::text(texts::promotion_updated(&name, &value)))
                            .await;
                    }
                    Ok(false) => {
                        self.finish_dialog(user_id, deadline).await;
                        self.reply(chat_id, Sendable::text(texts::ADMIN_NOT_FOUND)).await;
                    }
                    Err(e) => {
                        error!(promotion_id = id.0, error = %e, "failed to update promotion");
                        self.reply(chat_id, Sendable::text(texts::store_failure(&e))).await;
                    }
                }
            }
        }
    }

    async fn finish_dialog(&self, user_id: UserId, deadline: Deadline) {
        if let Err(e) = self.dialogs.clear(user_id, deadline).await {
            warn!(user_id = user_id.0, error = %e, "failed to clear dialog state");
        }
    }

    async fn list_promotions(&self, chat_id: ChatId, deadline: Deadline) {
        let promotions = match self
            .store_call("list promotions", deadline, self.store.list_promotions())
            .await
        {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to list promotions");
                return self.reply(chat_id, Sendable::text(texts::store_failure(&e))).await;
            }
        };

        if promotions.is_empty() {
            return self.reply(chat_id, Sendable::text(texts::ADMIN_NO_PROMOTIONS)).await;
        }

        let keyboard = InlineKeyboard::one_per_row(promotions.iter().map(|p| {
            InlineButton::callback(
                truncate_label(&texts::promotion_label(p.id, &p.name), BUTTON_LABEL_MAX),
                CallbackAction::Promotion(p.id).payload(),
            )
        }));
        self.reply(chat_id, Sendable::with_keyboard(texts::ADMIN_CHOOSE_PROMOTION, keyboard))
            .await;
    }

    pub(super) async fn promotion_menu(&self, chat_id: ChatId, id: PromotionId, deadline: Deadline) {
        let Some(p) = self.lookup_promotion(chat_id, id, deadline).await else {
            return;
        };
        let keyboard = InlineKeyboard::row(vec![
            InlineButton::callback(texts::EDIT_BUTTON, CallbackAction::Edit(id).payload()),
            InlineButton::callback(texts::DELETE_BUTTON, CallbackAction::Delete(id).payload()),
        ]);
        self.reply(
            chat_id,
            Sendable::with_keyboard(texts::promotion_menu(&p.name, &p.value), keyboard),
        )
        .await;
    }

    pub(super) async fn begin_edit(&self, chat_id: ChatId, user_id: UserId, id: PromotionId, deadline: Deadline) {
        if self.lookup_promotion(chat_id, id, deadline).await.is_none() {
            return;
        }
        self.enter_step(chat_id, user_id, DialogState::EditAwaitingName { id }, deadline)
            .await;
    }

    /// First half of the two-step delete: show the confirm button only.
    pub(super) async fn ask_delete(&self, chat_id: ChatId, id: PromotionId, deadline: Deadline) {
        let Some(p) = self.lookup_promotion(chat_id, id, deadline).await else {
            return;
        };
        let keyboard = InlineKeyboard::row(vec![InlineButton::callback(
            texts::CONFIRM_DELETE_BUTTON,
            CallbackAction::ConfirmDelete(id).payload(),
        )]);
        self.reply(chat_id, Sendable::with_keyboard(texts::confirm_delete(&p.name), keyboard))
            .await;
    }

    pub(super) async fn delete(&self, chat_id: ChatId, id: PromotionId, deadline: Deadline) {
        let deleted = self
            .store_call("delete promotion", deadline, self.store.delete_promotion(id))
            .await;
        match deleted {
            Ok(true) => {
                info!(promotion_id = id.0, "promotion deleted");
                self.reply(chat_id, Sendable::text(texts::ADMIN_DELETED)).await;
            }
            Ok(false) => self.reply(chat_id, Sendable::text(texts::ADMIN_NOT_FOUND)).await,
            Err(e) => {
                error!(promotion_id = id.0, error = %e, "failed to delete promotion");
                self.reply(chat_id, Sendable::text(texts::store_failure(&e))).await;
            }
        }
    }

    async fn lookup_promotion(
        &self,
        chat_id: ChatId,
        id: PromotionId,
        deadline: Deadline,
    ) -> Option<crate::domain::Promotion> {
        match self
            .store_call("get promotion", deadline, self.store.get_promotion(id))
            .await
        {
            Ok(Some(p)) => Some(p),
            Ok(None) => {
                self.reply(chat_id, Sendable::text(texts::ADMIN_NOT_FOUND)).await;
                None
            }
            Err(e) => {
                error!(promotion_id = id.0, error = %e, "failed to load promotion");
                self.reply(chat_id, Sendable::text(texts::store_failure(&e))).await;
                None
            }
        }
    }
}
