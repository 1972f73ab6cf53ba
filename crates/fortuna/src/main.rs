use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fortuna_core::{
    config::Config,
    store::{memory::MemoryStore, Store},
};

async fn open_store(cfg: &Config) -> Result<Arc<dyn Store>, fortuna_core::Error> {
    if cfg.database.is_memory() {
        warn!("DATABASE_URL=memory: claims and promotions will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = fortuna_postgres::create_pool(&cfg.database)
        .await
        .map_err(|e| fortuna_core::Error::Store(format!("database unreachable: {e}")))?;
    fortuna_postgres::run_migrations(&pool)
        .await
        .map_err(|e| fortuna_core::Error::Store(format!("migrations failed: {e}")))?;
    Ok(Arc::new(fortuna_postgres::PgStore::new(pool)))
}

/// Cancel `token` on Ctrl-C or SIGTERM.
fn watch_signals(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut term =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "cannot listen for SIGTERM");
                        let _ = ctrl_c.await;
                        token.cancel();
                        return;
                    }
                };
            tokio::select! {
                _ = ctrl_c => info!("interrupt received"),
                _ = term.recv() => info!("SIGTERM received"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("interrupt received");
        }

        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), fortuna_core::Error> {
    fortuna_core::logging::init("fortuna")?;

    let cfg = Arc::new(Config::load()?);
    info!(
        admin_id = cfg.admin_id.0,
        workers = cfg.workers,
        queue_capacity = cfg.queue_capacity,
        subscription_gate = cfg.subscription.is_some(),
        "configuration loaded"
    );

    let store = open_store(&cfg).await?;

    let shutdown = CancellationToken::new();
    watch_signals(shutdown.clone());

    fortuna_telegram::polling::run_polling(cfg, store, shutdown)
        .await
        .map_err(|e| fortuna_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
