use std::{env, fs, path::Path, time::Duration};

use crate::{
    dispatch::DispatchConfig,
    domain::{ChatId, UserId},
    errors::Error,
    messaging::types::PhotoSource,
    ratelimit::RateLimitConfig,
    Result,
};

/// Slower than one call per 100 s is treated as a misconfiguration.
const MIN_RATE_LIMIT_RPS: f64 = 0.01;

/// Where the draw requires membership before handing out a promotion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub chat_id: ChatId,
    pub link: String,
}

/// Postgres connection settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    /// `DATABASE_URL=memory` selects the in-process store.
    pub fn is_memory(&self) -> bool {
        self.url == "memory" || self.url.starts_with("memory:")
    }
}

/// Typed configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub admin_id: UserId,
    pub poll_timeout: Duration,

    // Presentation
    pub shop_url: Option<String>,
    pub subscription: Option<Subscription>,
    pub start_photo: Option<PhotoSource>,
    pub reveal_delay: Duration,
    pub followup_delay: Duration,

    // Storage
    pub database: DatabaseConfig,

    // Dispatch
    pub workers: usize,
    pub queue_capacity: usize,
    pub event_budget: Duration,

    // Outbound rate limiting
    pub rate_limit_rps: f64,
    pub rate_limit_burst: u32,
    pub rate_limit_wait: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build a config from any key lookup. `load` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).and_then(non_empty);

        // Required env vars
        let telegram_token = var("TELEGRAM_APITOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_APITOKEN environment variable is required".to_string())
        })?;
        let admin_raw = var("ADMIN_ID").ok_or_else(|| {
            Error::Config("ADMIN_ID environment variable is required".to_string())
        })?;
        let admin_id = admin_raw
            .trim()
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| Error::Config(format!("ADMIN_ID is not a numeric user id: {admin_raw}")))?;

        let shop_url = var("SHOP_URL");

        // SUB_CHANNEL_ID=0 or absent disables the gate
        let subscription = parse_i64(var("SUB_CHANNEL_ID"))
            .filter(|id| *id != 0)
            .map(|id| Subscription {
                chat_id: ChatId(id),
                link: var("SUB_CHANNEL_LINK").unwrap_or_default(),
            });

        let start_photo = var("START_PHOTO").map(|raw| PhotoSource::parse(raw.trim()));

        let database = DatabaseConfig {
            url: var("DATABASE_URL").unwrap_or_else(|| postgres_url_from_parts(&var)),
            max_connections: parse_u32(var("DB_MAX_CONNECTIONS")).unwrap_or(50),
            min_connections: parse_u32(var("DB_MIN_CONNECTIONS")).unwrap_or(5),
            max_lifetime: Duration::from_secs(
                parse_u64(var("DB_MAX_LIFETIME_SECS")).unwrap_or(3600),
            ),
        };
        if database.min_connections > database.max_connections {
            return Err(Error::Config(format!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                database.min_connections, database.max_connections
            )));
        }

        let workers = parse_usize(var("WORKER_COUNT")).unwrap_or(64).max(1);
        let queue_capacity = parse_usize(var("QUEUE_CAPACITY")).unwrap_or(4096).max(1);
        let event_budget = Duration::from_millis(parse_u64(var("EVENT_BUDGET_MS")).unwrap_or(8000));

        let rate_limit_rps = var("RATE_LIMIT_RPS")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(28.0);
        if !rate_limit_rps.is_finite()
            || rate_limit_rps < 0.0
            || (rate_limit_rps > 0.0 && rate_limit_rps < MIN_RATE_LIMIT_RPS)
        {
            return Err(Error::Config(format!(
                "RATE_LIMIT_RPS must be 0 (disabled) or a finite value of at least {MIN_RATE_LIMIT_RPS}, got {rate_limit_rps}"
            )));
        }
        let rate_limit_burst = parse_u32(var("RATE_LIMIT_BURST")).unwrap_or(28);
        let rate_limit_wait =
            Duration::from_millis(parse_u64(var("RATE_LIMIT_WAIT_MS")).unwrap_or(5000));

        let poll_timeout = Duration::from_secs(parse_u64(var("POLL_TIMEOUT_SECS")).unwrap_or(60));
        let reveal_delay = Duration::from_millis(parse_u64(var("REVEAL_DELAY_MS")).unwrap_or(2000));
        let followup_delay =
            Duration::from_millis(parse_u64(var("FOLLOWUP_DELAY_MS")).unwrap_or(1000));

        Ok(Self {
            telegram_token,
            admin_id,
            poll_timeout,
            shop_url,
            subscription,
            start_photo,
            reveal_delay,
            followup_delay,
            database,
            workers,
            queue_capacity,
            event_budget,
            rate_limit_rps,
            rate_limit_burst,
            rate_limit_wait,
        })
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            event_budget: self.event_budget,
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            rate_per_sec: self.rate_limit_rps,
            burst: self.rate_limit_burst,
            max_wait: self.rate_limit_wait,
        }
    }
}

fn postgres_url_from_parts(var: &dyn Fn(&str) -> Option<String>) -> String {
    let host = var("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = var("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string());
    let user = var("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string());
    let password = var("POSTGRES_PASSWORD").unwrap_or_default();
    let db = var("POSTGRES_DB").unwrap_or_else(|| "postgres".to_string());
    format!("postgres://{user}:{password}@{host}:{port}/{db}")
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_u32(v: Option<String>) -> Option<u32> {
    v.and_then(|s| s.trim().parse::<u32>().ok())
}

fn parse_usize(v: Option<String>) -> Option<usize> {
    v.and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_i64(v: Option<String>) -> Option<i64> {
    v.and_then(|s| s.trim().parse::<i64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
