//! Persistence port.
//!
//! The Postgres implementation lives in `fortuna-postgres`; [`memory`] keeps
//! everything in process for tests and local runs.

use async_trait::async_trait;

use crate::{
    dialog::DialogState,
    domain::{NewPromotion, Promotion, PromotionId, UserId},
    Result,
};

pub mod memory;

#[async_trait]
pub trait Store: Send + Sync {
    /// Record that a user has seen the bot. Idempotent.
    async fn upsert_user(&self, user_id: UserId) -> Result<()>;

    async fn get_dialog_state(&self, user_id: UserId) -> Result<Option<DialogState>>;
    async fn set_dialog_state(&self, user_id: UserId, state: &DialogState) -> Result<()>;
    async fn clear_dialog_state(&self, user_id: UserId) -> Result<()>;

    async fn create_promotion(&self, new: NewPromotion) -> Result<Promotion>;
    /// Returns `false` when no active promotion has this id.
    async fn update_promotion(&self, id: PromotionId, name: &str, value: &str) -> Result<bool>;
    /// Soft delete. Returns `false` when no active promotion has this id.
    async fn delete_promotion(&self, id: PromotionId) -> Result<bool>;
    /// Active promotion by id.
    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>>;
    /// Active promotions ordered by id.
    async fn list_promotions(&self) -> Result<Vec<Promotion>>;

    /// Atomically record a claim. Returns `true` only for the call that
    /// created the record.
    async fn insert_claim_if_absent(&self, user_id: UserId) -> Result<bool>;

    /// Uniformly random active promotion, or [`crate::Error::NoPromotions`].
    async fn random_active_promotion(&self) -> Result<Promotion>;
}
