use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tracing::warn;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::{
        port::MessagingPort,
        types::{MemberStatus, Sendable},
    },
    ratelimit::RateLimiter,
    Result,
};

/// The sole egress path: a [`MessagingPort`] decorator that takes a token
/// from the shared [`RateLimiter`] before every platform call.
///
/// Calls are made at most once. A transport failure is returned to the
/// caller and never retried, so a user never receives the same message twice.
pub struct OutboundGateway {
    inner: Arc<dyn MessagingPort>,
    limiter: Arc<RateLimiter>,
    stats: GatewayStats,
}

#[derive(Debug, Default)]
struct GatewayStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    throttled: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GatewaySnapshot {
    pub delivered: u64,
    pub failed: u64,
    pub throttled: u64,
}

impl OutboundGateway {
    pub fn new(inner: Arc<dyn MessagingPort>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            inner,
            limiter,
            stats: GatewayStats::default(),
        }
    }

    pub fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            throttled: self.stats.throttled.load(Ordering::Relaxed),
        }
    }

    async fn wait(&self) -> Result<()> {
        self.limiter.wait().await.inspect_err(|_| {
            self.stats.throttled.fetch_add(1, Ordering::Relaxed);
        })
    }

    fn record<T>(&self, res: Result<T>) -> Result<T> {
        let counter = if res.is_ok() {
            &self.stats.delivered
        } else {
            &self.stats.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        res
    }

    /// Best-effort send: failures are logged and swallowed.
    pub async fn deliver(&self, chat_id: ChatId, item: Sendable) -> Option<MessageRef> {
        let kind = item.kind();
        match self.send(chat_id, item).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!(chat_id = chat_id.0, kind, error = %e, "outbound send failed");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for OutboundGateway {
    async fn send(&self, chat_id: ChatId, item: Sendable) -> Result<MessageRef> {
        self.wait().await?;
        self.record(self.inner.send(chat_id, item).await)
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.wait().await?;
        self.record(self.inner.answer_callback_query(callback_id, text).await)
    }

    async fn chat_member_status(&self, chat_id: ChatId, user_id: UserId) -> Result<MemberStatus> {
        self.wait().await?;
        self.record(self.inner.chat_member_status(chat_id, user_id).await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        errors::Error,
        ratelimit::RateLimitConfig,
        testing::RecordingMessenger,
    };

    fn gateway(messenger: Arc<RecordingMessenger>, cfg: RateLimitConfig) -> OutboundGateway {
        OutboundGateway::new(messenger, Arc::new(RateLimiter::new(cfg)))
    }

    #[tokio::test]
    async fn send_passes_through_once() {
        let messenger = Arc::new(RecordingMessenger::default());
        let gw = gateway(messenger.clone(), RateLimitConfig::default());

        gw.send(ChatId(7), Sendable::text("hi")).await.unwrap();

        assert_eq!(messenger.texts_to(ChatId(7)), vec!["hi".to_string()]);
        assert_eq!(gw.snapshot().delivered, 1);
    }

    #[tokio::test]
    async fn transport_failure_is_returned_not_retried() {
        let messenger = Arc::new(RecordingMessenger::default());
        messenger.fail_sends(true);
        let gw = gateway(messenger.clone(), RateLimitConfig::default());

        let err = gw.send(ChatId(7), Sendable::text("hi")).await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert_eq!(messenger.send_attempts(), 1);
        assert_eq!(gw.snapshot().failed, 1);

        // deliver() swallows the same failure.
        assert!(gw.deliver(ChatId(7), Sendable::text("again")).await.is_none());
        assert_eq!(messenger.send_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_limiter_rejects_before_calling_platform() {
        let messenger = Arc::new(RecordingMessenger::default());
        let gw = gateway(
            messenger.clone(),
            RateLimitConfig {
                rate_per_sec: 0.1,
                burst: 1,
                max_wait: Duration::from_secs(5),
            },
        );

        gw.send(ChatId(1), Sendable::dice()).await.unwrap();
        let err = gw.answer_callback_query("cb", None).await.unwrap_err();

        assert!(matches!(err, Error::RateLimited(_)));
        assert_eq!(messenger.send_attempts(), 1);
        assert!(messenger.acknowledged().is_empty());
        assert_eq!(gw.snapshot().throttled, 1);
    }
}
