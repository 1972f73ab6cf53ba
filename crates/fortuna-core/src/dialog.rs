//! Admin dialog state machine and its persistence wrapper.
//!
//! Each step is an explicit variant carrying exactly the input collected so
//! far. It is stored as tagged JSON, so free text containing any delimiter
//! round-trips unchanged.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    deadline::Deadline,
    domain::{NewPromotion, PromotionId, UserId},
    store::Store,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DialogState {
    AddAwaitingName,
    AddAwaitingValue { name: String },
    EditAwaitingName { id: PromotionId },
    EditAwaitingValue { id: PromotionId, name: String },
}

/// What the admin's next text message does to the dialog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogTransition {
    /// Persist the new state and prompt for the next field.
    Advance(DialogState),
    /// Input was unusable; the state is unchanged.
    Rejected(DialogState),
    Create(NewPromotion),
    Update {
        id: PromotionId,
        name: String,
        value: String,
    },
}

impl DialogState {
    pub fn step_name(&self) -> &'static str {
        match self {
            DialogState::AddAwaitingName => "add_awaiting_name",
            DialogState::AddAwaitingValue { .. } => "add_awaiting_value",
            DialogState::EditAwaitingName { .. } => "edit_awaiting_name",
            DialogState::EditAwaitingValue { .. } => "edit_awaiting_value",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Feed one free-text message into the current step.
    pub fn feed(self, text: &str) -> DialogTransition {
        let input = text.trim();
        if input.is_empty() {
            return DialogTransition::Rejected(self);
        }
        let input = input.to_string();

        match self {
            DialogState::AddAwaitingName => {
                DialogTransition::Advance(DialogState::AddAwaitingValue { name: input })
            }
            DialogState::AddAwaitingValue { name } => {
                DialogTransition::Create(NewPromotion::new(name, input))
            }
            DialogState::EditAwaitingName { id } => {
                DialogTransition::Advance(DialogState::EditAwaitingValue { id, name: input })
            }
            DialogState::EditAwaitingValue { id, name } => DialogTransition::Update {
                id,
                name,
                value: input,
            },
        }
    }
}

/// Per-admin dialog storage backed by the external store.
///
/// Every call runs under a sub-deadline derived from the event's budget.
#[derive(Clone)]
pub struct DialogStateStore {
    store: Arc<dyn Store>,
    op_timeout: Duration,
}

impl DialogStateStore {
    pub fn new(store: Arc<dyn Store>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    pub async fn current(&self, user_id: UserId, deadline: Deadline) -> Result<Option<DialogState>> {
        deadline
            .sub(self.op_timeout)
            .run("load dialog state", self.store.get_dialog_state(user_id))
            .await
    }

    pub async fn advance(&self, user_id: UserId, state: &DialogState, deadline: Deadline) -> Result<()> {
        deadline
            .sub(self.op_timeout)
            .run("save dialog state", self.store.set_dialog_state(user_id, state))
            .await
    }

    pub async fn clear(&self, user_id: UserId, deadline: Deadline) -> Result<()> {
        deadline
            .sub(self.op_timeout)
            .run("clear dialog state", self.store.clear_dialog_state(user_id))
            .await
    }
}
