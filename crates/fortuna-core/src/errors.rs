use std::time::Duration;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the dispatch
/// core can handle failures consistently (user-facing message vs logged).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("no active promotions")]
    NoPromotions,

    #[error("rate limiter wait would exceed {0:?}")]
    RateLimited(Duration),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(&'static str),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
