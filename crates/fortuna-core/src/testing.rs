//! Test doubles shared by the unit tests of this crate.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    dialog::DialogState,
    domain::{ChatId, MessageId, MessageRef, NewPromotion, Promotion, PromotionId, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MemberStatus, Sendable},
    },
    store::{memory::MemoryStore, Store},
    Result,
};

/// Messenger that records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ChatId, Sendable)>>,
    acks: Mutex<Vec<String>>,
    members: Mutex<HashMap<(i64, i64), MemberStatus>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
    fail_acks: AtomicBool,
}

impl RecordingMessenger {
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }

    pub fn send_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_member_status(&self, chat_id: ChatId, user_id: UserId, status: MemberStatus) {
        self.members
            .lock()
            .unwrap()
            .insert((chat_id.0, user_id.0), status);
    }

    pub fn sent(&self) -> Vec<(ChatId, Sendable)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.acks.lock().unwrap().clear();
    }

    /// Text bodies and photo captions sent to `chat_id`, in order.
    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| *c == chat_id)
            .filter_map(|(_, item)| match item {
                Sendable::Text { html, .. } => Some(html),
                Sendable::Photo { caption_html, .. } => caption_html,
                Sendable::Dice { .. } => None,
            })
            .collect()
    }

    pub fn keyboards_to(&self, chat_id: ChatId) -> Vec<InlineKeyboard> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| *c == chat_id)
            .filter_map(|(_, item)| match item {
                Sendable::Text { keyboard, .. } | Sendable::Photo { keyboard, .. } => keyboard,
                Sendable::Dice { .. } => None,
            })
            .collect()
    }

    pub fn kinds_to(&self, chat_id: ChatId) -> Vec<&'static str> {
        self.sent()
            .iter()
            .filter(|(c, _)| *c == chat_id)
            .map(|(_, item)| item.kind())
            .collect()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send(&self, chat_id: ChatId, item: Sendable) -> Result<MessageRef> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::External("telegram error: connection reset".to_string()));
        }
        self.sent.lock().unwrap().push((chat_id, item));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(n as i32 + 1),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, _text: Option<&str>) -> Result<()> {
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(Error::External("query is too old".to_string()));
        }
        self.acks.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }

    async fn chat_member_status(&self, chat_id: ChatId, user_id: UserId) -> Result<MemberStatus> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&(chat_id.0, user_id.0))
            .copied()
            .unwrap_or(MemberStatus::Left))
    }
}

/// Store whose every operation fails as if the database were unreachable.
pub struct FailingStore;

fn down<T>() -> Result<T> {
    Err(Error::Store("connection refused".to_string()))
}

#[async_trait]
impl Store for FailingStore {
    async fn upsert_user(&self, _user_id: UserId) -> Result<()> {
        down()
    }

    async fn get_dialog_state(&self, _user_id: UserId) -> Result<Option<DialogState>> {
        down()
    }

    async fn set_dialog_state(&self, _user_id: UserId, _state: &DialogState) -> Result<()> {
        down()
    }

    async fn clear_dialog_state(&self, _user_id: UserId) -> Result<()> {
        down()
    }

    async fn create_promotion(&self, _new: NewPromotion) -> Result<Promotion> {
        down()
    }

    async fn update_promotion(&self, _id: PromotionId, _name: &str, _value: &str) -> Result<bool> {
        down()
    }

    async fn delete_promotion(&self, _id: PromotionId) -> Result<bool> {
        down()
    }

    async fn get_promotion(&self, _id: PromotionId) -> Result<Option<Promotion>> {
        down()
    }

    async fn list_promotions(&self) -> Result<Vec<Promotion>> {
        down()
    }

    async fn insert_claim_if_absent(&self, _user_id: UserId) -> Result<bool> {
        down()
    }

    async fn random_active_promotion(&self) -> Result<Promotion> {
        down()
    }
}

/// In-memory store that stalls before every operation.
pub struct SlowStore {
    pub inner: MemoryStore,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl Store for SlowStore {
    async fn upsert_user(&self, user_id: UserId) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert_user(user_id).await
    }

    async fn get_dialog_state(&self, user_id: UserId) -> Result<Option<DialogState>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_dialog_state(user_id).await
    }

    async fn set_dialog_state(&self, user_id: UserId, state: &DialogState) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set_dialog_state(user_id, state).await
    }

    async fn clear_dialog_state(&self, user_id: UserId) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.clear_dialog_state(user_id).await
    }

    async fn create_promotion(&self, new: NewPromotion) -> Result<Promotion> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_promotion(new).await
    }

    async fn update_promotion(&self, id: PromotionId, name: &str, value: &str) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_promotion(id, name, value).await
    }

    async fn delete_promotion(&self, id: PromotionId) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_promotion(id).await
    }

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_promotion(id).await
    }

    async fn list_promotions(&self) -> Result<Vec<Promotion>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_promotions().await
    }

    async fn insert_claim_if_absent(&self, user_id: UserId) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_claim_if_absent(user_id).await
    }

    async fn random_active_promotion(&self) -> Result<Promotion> {
        tokio::time::sleep(self.delay).await;
        self.inner.random_active_promotion().await
    }
}
