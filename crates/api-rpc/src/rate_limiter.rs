//! Rate Limiter (Token Bucket Algorithm)
//!
//! Caps request rate on the RPC surface. Time comes from the injected
//! `TimeProvider` so refill is testable without sleeping.

use hookline_core::port::TimeProvider;
use std::sync::{Arc, Mutex};

struct Bucket {
    tokens: f64,
    last_refill_ms: i64,
}

/// Token bucket rate limiter
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
    time_provider: Arc<dyn TimeProvider>,
}

impl RateLimiter {
    /// # Arguments
    /// * `max_tokens` - Maximum burst size
    /// * `refill_rate` - Tokens added per second
    ///
    /// # Example
    /// Allow 100 requests/sec with burst of 200:
    /// `RateLimiter::new(200, 100, time_provider)`
    pub fn new(max_tokens: u32, refill_rate: u32, time_provider: Arc<dyn TimeProvider>) -> Self {
        let now = time_provider.now_millis();
        Self {
            bucket: Mutex::new(Bucket {
                tokens: max_tokens as f64,
                last_refill_ms: now,
            }),
            max_tokens,
            refill_rate,
            time_provider,
        }
    }

    /// Consume one token. Returns false if rate limited.
    pub fn check(&self) -> bool {
        let now = self.time_provider.now_millis();
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let elapsed_ms = now.saturating_sub(bucket.last_refill_ms).max(0);
        let refill = elapsed_ms as f64 * self.refill_rate as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + refill).min(self.max_tokens as f64);
        bucket.last_refill_ms = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available
    pub fn remaining(&self) -> u32 {
        match self.bucket.lock() {
            Ok(bucket) => bucket.tokens as u32,
            Err(poisoned) => poisoned.into_inner().tokens as u32,
        }
    }
}
