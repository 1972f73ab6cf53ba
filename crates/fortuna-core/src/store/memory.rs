use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::Mutex;

use crate::{
    dialog::DialogState,
    domain::{NewPromotion, Promotion, PromotionId, UserId},
    errors::Error,
    store::Store,
    Result,
};

/// In-process [`Store`]. Nothing survives a restart.
///
/// A single lock guards all tables, so `insert_claim_if_absent` is atomic the
/// same way the unique index makes it atomic in Postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: HashMap<UserId, DateTime<Utc>>,
    dialogs: HashMap<UserId, DialogState>,
    promotions: BTreeMap<PromotionId, Promotion>,
    claims: HashSet<UserId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn claim_count(&self) -> usize {
        self.inner.lock().await.claims.len()
    }
}

fn active(p: &&Promotion) -> bool {
    !p.deleted
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_user(&self, user_id: UserId) -> Result<()> {
        self.inner
            .lock()
            .await
            .users
            .entry(user_id)
            .or_insert_with(Utc::now);
        Ok(())
    }

    async fn get_dialog_state(&self, user_id: UserId) -> Result<Option<DialogState>> {
        Ok(self.inner.lock().await.dialogs.get(&user_id).cloned())
    }

    async fn set_dialog_state(&self, user_id: UserId, state: &DialogState) -> Result<()> {
        self.inner
            .lock()
            .await
            .dialogs
            .insert(user_id, state.clone());
        Ok(())
    }

    async fn clear_dialog_state(&self, user_id: UserId) -> Result<()> {
        self.inner.lock().await.dialogs.remove(&user_id);
        Ok(())
    }

    async fn create_promotion(&self, new: NewPromotion) -> Result<Promotion> {
        let mut t = self.inner.lock().await;
        t.next_id += 1;
        let promotion = Promotion {
            id: PromotionId(t.next_id),
            name: new.name,
            value: new.value,
            image_url: new.image_url,
            deleted: false,
            created_at: Utc::now(),
        };
        t.promotions.insert(promotion.id, promotion.clone());
        Ok(promotion)
    }

    async fn update_promotion(&self, id: PromotionId, name: &str, value: &str) -> Result<bool> {
        let mut t = self.inner.lock().await;
        match t.promotions.get_mut(&id).filter(|p| !p.deleted) {
            Some(p) => {
                p.name = name.to_string();
                p.value = value.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_promotion(&self, id: PromotionId) -> Result<bool> {
        let mut t = self.inner.lock().await;
        match t.promotions.get_mut(&id).filter(|p| !p.deleted) {
            Some(p) => {
                p.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>> {
        let t = self.inner.lock().await;
        Ok(t.promotions.get(&id).filter(active).cloned())
    }

    async fn list_promotions(&self) -> Result<Vec<Promotion>> {
        let t = self.inner.lock().await;
        Ok(t.promotions.values().filter(active).cloned().collect())
    }

    async fn insert_claim_if_absent(&self, user_id: UserId) -> Result<bool> {
        Ok(self.inner.lock().await.claims.insert(user_id))
    }

    async fn random_active_promotion(&self) -> Result<Promotion> {
        let t = self.inner.lock().await;
        let candidates: Vec<&Promotion> = t.promotions.values().filter(active).collect();
        if candidates.is_empty() {
            return Err(Error::NoPromotions);
        }
        let idx = rand::thread_rng().gen_range(0..candidates.len());
        Ok(candidates[idx].clone())
    }
}
