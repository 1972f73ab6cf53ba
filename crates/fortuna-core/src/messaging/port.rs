use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::types::{MemberStatus, Sendable},
    Result,
};

/// Cross-messenger outbound port.
///
/// Telegram is the only implementation today. Every call site reaches the
/// platform through [`crate::messaging::gateway::OutboundGateway`], which
/// wraps an implementation of this trait behind the shared rate limiter.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send(&self, chat_id: ChatId, item: Sendable) -> Result<MessageRef>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    async fn chat_member_status(&self, chat_id: ChatId, user_id: UserId) -> Result<MemberStatus>;
}
