use std::{sync::Arc, time::Duration};

use teloxide::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fortuna_core::{
    config::Config,
    dispatch::{self, WorkerPool},
    messaging::{gateway::OutboundGateway, port::MessagingPort},
    ratelimit::RateLimiter,
    router::{EventRouter, RouterSettings},
    store::Store,
};

use crate::{
    commands,
    intake::{self, PollConfig},
    TelegramMessenger,
};

/// Events buffered between the poller and the dispatcher.
const INTAKE_BUFFER: usize = 256;

/// Build a bot whose HTTP timeout outlasts the long-poll timeout.
pub fn build_bot(token: &str, poll_timeout: Duration) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(poll_timeout + Duration::from_secs(10))
        .build()?;
    Ok(Bot::with_client(token, client))
}

/// Run the bot until `shutdown` fires: poll updates, dispatch them through
/// the worker pool, then drain.
pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<dyn Store>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let bot = build_bot(&cfg.telegram_token, cfg.poll_timeout)?;
    run_with_bot(bot, cfg, store, shutdown).await
}

async fn run_with_bot(
    bot: Bot,
    cfg: Arc<Config>,
    store: Arc<dyn Store>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    // A rejected token never recovers; fail before spawning anything.
    let me = bot
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("getMe failed, check TELEGRAM_APITOKEN: {e}"))?;
    info!(username = %me.username(), "fortuna started");

    commands::register(&bot, cfg.admin_id).await;

    // One limiter for every outbound call.
    let limiter = Arc::new(RateLimiter::new(cfg.rate_limit_config()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let gateway = Arc::new(OutboundGateway::new(messenger, limiter));

    let router = Arc::new(EventRouter::new(
        RouterSettings::from_config(&cfg),
        store,
        gateway.clone(),
    ));
    let pool = WorkerPool::spawn(cfg.dispatch_config(), router);

    let (tx, rx) = mpsc::channel(INTAKE_BUFFER);
    let poller = tokio::spawn(intake::poll_updates(
        bot,
        PollConfig {
            timeout: cfg.poll_timeout,
            ..PollConfig::default()
        },
        tx,
        shutdown.clone(),
    ));

    let stats = dispatch::run(rx, pool, shutdown.clone()).await;

    // The source may have closed on its own; make sure the poller stops too.
    shutdown.cancel();
    if let Err(e) = poller.await {
        warn!(error = %e, "update poller task failed");
    }

    let sent = gateway.snapshot();
    info!(
        accepted = stats.accepted,
        dropped = stats.dropped,
        panicked = stats.panicked,
        timed_out = stats.timed_out,
        delivered = sent.delivered,
        failed = sent.failed,
        throttled = sent.throttled,
        "fortuna stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use fortuna_core::store::memory::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn unreachable_api_is_fatal_at_startup() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("TELEGRAM_APITOKEN", "0:invalid"), ("ADMIN_ID", "1")]);
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        let bot = build_bot(&cfg.telegram_token, Duration::from_secs(1))
            .unwrap()
            .set_api_url("http://127.0.0.1:1/".parse().unwrap());

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            run_with_bot(
                bot,
                Arc::new(cfg),
                Arc::new(MemoryStore::new()),
                CancellationToken::new(),
            ),
        )
        .await
        .expect("startup must not hang");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("getMe"));
    }
}
