//! One-time promotion claims.
//!
//! A non-admin user moves from unclaimed to claimed exactly once. The
//! transition is the store's atomic insert-if-absent; there is no
//! read-then-write anywhere in this path.

use std::sync::Arc;

use tokio::time::timeout_at;
use tracing::debug;

use crate::{
    deadline::Deadline,
    domain::{Promotion, UserId},
    errors::Error,
    store::Store,
};

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("user has already claimed a promotion")]
    AlreadyClaimed,

    #[error("no active promotions")]
    NoPromotions,

    /// The claim may or may not have been recorded.
    #[error("claim failed: {0}")]
    Store(#[source] Error),
}

impl From<Error> for ClaimError {
    fn from(e: Error) -> Self {
        match e {
            Error::NoPromotions => ClaimError::NoPromotions,
            other => ClaimError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct ClaimService {
    store: Arc<dyn Store>,
    admin_id: UserId,
}

impl ClaimService {
    pub fn new(store: Arc<dyn Store>, admin_id: UserId) -> Self {
        Self { store, admin_id }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        user_id == self.admin_id
    }

    /// Draw a random active promotion for `user_id`.
    ///
    /// The catalog is checked before the claim is recorded, so an empty
    /// catalog never burns a user's only attempt. The admin may claim any
    /// number of times.
    pub async fn claim(&self, user_id: UserId) -> Result<Promotion, ClaimError> {
        let promotion = self.store.random_active_promotion().await?;

        if self.is_admin(user_id) {
            debug!(user_id = user_id.0, "admin draw, claim not recorded");
            return Ok(promotion);
        }

        if !self.store.insert_claim_if_absent(user_id).await? {
            return Err(ClaimError::AlreadyClaimed);
        }

        debug!(user_id = user_id.0, promotion_id = promotion.id.0, "claim recorded");
        Ok(promotion)
    }

    /// [`Self::claim`] bounded by `deadline`. A timeout is reported as a
    /// store failure: the insert may have landed.
    pub async fn claim_before(
        &self,
        user_id: UserId,
        deadline: Deadline,
    ) -> Result<Promotion, ClaimError> {
        match timeout_at(deadline.instant(), self.claim(user_id)).await {
            Ok(res) => res,
            Err(_) => Err(ClaimError::Store(Error::DeadlineExceeded("claim"))),
        }
    }
}
