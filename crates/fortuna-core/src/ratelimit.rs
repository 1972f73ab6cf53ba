//! Global token-bucket limiter for outbound platform calls.
//!
//! One instance is constructed at startup and shared (via `Arc`) by every
//! outbound call site. Telegram enforces a global ceiling of roughly 30 calls
//! per second per bot, so the defaults stay slightly under it.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    /// Steady refill rate. Zero or negative disables limiting.
    pub rate_per_sec: f64,
    /// Bucket capacity (burst allowance).
    pub burst: u32,
    /// Longest a caller may wait for a token before giving up.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 28.0,
            burst: 28,
            max_wait: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    /// May go negative: negative tokens are reservations already handed out.
    tokens: f64,
    last_update: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_update = now;
    }

    /// Reserve one token and return how long the caller must sleep before
    /// using it. A reservation that would take longer than `max_wait` is not
    /// taken.
    fn reserve(&mut self, now: Instant, cfg: &RateLimitConfig, max_wait: Duration) -> Result<Duration> {
        let burst = f64::from(cfg.burst.max(1));
        self.refill(now, cfg.rate_per_sec, burst);

        let remaining = self.tokens - 1.0;
        let wait = if remaining >= 0.0 {
            Duration::ZERO
        } else {
            // A vanishing rate overflows Duration; treat it as "too long".
            Duration::try_from_secs_f64(-remaining / cfg.rate_per_sec)
                .map_err(|_| Error::RateLimited(max_wait))?
        };

        if wait > max_wait {
            return Err(Error::RateLimited(max_wait));
        }

        self.tokens = remaining;
        Ok(wait)
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    cfg: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            cfg,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(cfg.burst.max(1)),
                last_update: Instant::now(),
            }),
        }
    }

    fn enabled(&self) -> bool {
        self.cfg.rate_per_sec > 0.0
    }

    /// Block until a token is available, bounded by the configured wait.
    pub async fn wait(&self) -> Result<()> {
        self.wait_at_most(self.cfg.max_wait).await
    }

    /// Block until a token is available, or fail with [`Error::RateLimited`]
    /// when that would take longer than `max_wait`.
    ///
    /// Dropping the returned future while it sleeps forfeits the reserved
    /// token.
    pub async fn wait_at_most(&self, max_wait: Duration) -> Result<()> {
        if !self.enabled() {
            return Ok(());
        }

        let wait = {
            let mut bucket = self.bucket.lock().await;
            bucket.reserve(Instant::now(), &self.cfg, max_wait)?
        };

        if wait > Duration::ZERO {
            sleep(wait).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn limiter(rate: f64, burst: u32, max_wait_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            rate_per_sec: rate,
            burst,
            max_wait: Duration::from_millis(max_wait_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_immediate_then_steady_rate_applies() {
        let rl = limiter(1.0, 3, 5_000);
        let start = Instant::now();

        for _ in 0..3 {
            rl.wait().await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(10));

        rl.wait().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_beyond_timeout_fails_without_consuming() {
        let rl = limiter(1.0, 1, 500);

        rl.wait().await.unwrap();
        let err = rl.wait().await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));

        // The failed attempt did not take the next token.
        tokio::time::advance(Duration::from_millis(1_000)).await;
        let start = Instant::now();
        rl.wait().await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_ceiling() {
        let rl = Arc::new(limiter(10.0, 1, 5_000));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let rl = rl.clone();
            handles.push(tokio::spawn(async move { rl.wait().await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // First token is free; the other nine arrive at 10/s.
        assert!(start.elapsed() >= Duration::from_millis(890));
    }

    #[tokio::test(start_paused = true)]
    async fn vanishing_rate_rejects_instead_of_overflowing() {
        let rl = limiter(1e-20, 1, 5_000);

        rl.wait().await.unwrap();
        let err = rl.wait().await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_disables_limiting() {
        let rl = limiter(0.0, 1, 0);
        for _ in 0..100 {
            rl.wait().await.unwrap();
        }
    }
}
