//! Request Throttle
//!
//! Token bucket shared by every backend call the subsystem makes, so the
//! demo identity never bursts past the platform's per-identity quota.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::config::ThrottleConfig;

/// Token bucket
#[derive(Debug)]
struct TokenBucket {
    /// Available tokens
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
    /// Maximum tokens (burst capacity)
    max_tokens: f64,
    /// Refill rate (tokens per second)
    refill_rate: f64,
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens as f64,
            last_refill: Instant::now(),
            max_tokens: max_tokens as f64,
            refill_rate,
        }
    }

    /// Try to consume a token, returns true if successful
    fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Time until the next token is available
    fn retry_after(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// Shared request throttle
#[derive(Debug)]
pub struct Throttle {
    bucket: Option<Mutex<TokenBucket>>,
    /// Number of acquisitions that had to wait
    waits: AtomicU64,
}

impl Throttle {
    pub fn new(config: &ThrottleConfig) -> Self {
        let bucket = (config.enabled && config.requests_per_second > 0.0).then(|| {
            Mutex::new(TokenBucket::new(
                config.burst.max(1),
                config.requests_per_second,
            ))
        });
        Self {
            bucket,
            waits: AtomicU64::new(0),
        }
    }

    /// A throttle that never waits
    pub fn unlimited() -> Self {
        Self::new(&ThrottleConfig::disabled())
    }

    pub fn is_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Wait until a token is available, then take it
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        let mut waited = false;
        loop {
            let wait = {
                let mut bucket = bucket.lock().await;
                if bucket.try_consume() {
                    break;
                }
                bucket.retry_after()
            };
            if !waited {
                waited = true;
                self.waits.fetch_add(1, Ordering::Relaxed);
            }
            trace!(wait_ms = wait.as_millis() as u64, "Throttle bucket empty");
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of acquisitions that had to wait so far
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }
}

/// Fixed pacing pause; zero returns immediately
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
