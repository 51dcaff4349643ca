//! Keyed token-bucket rate limiting for outbound conversion calls.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Token-bucket limiter keyed by caller. A full bucket holds `capacity`
/// points and refills completely over one `window`.
pub struct RateLimiter {
    buckets: HashMap<String, TokenBucket>,
    capacity: u32,
    refill_per_sec: f64,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        let secs = window.as_secs_f64();
        let refill_per_sec = if secs > 0.0 { capacity as f64 / secs } else { 0.0 };
        Self::with_refill(capacity, refill_per_sec)
    }

    /// - `capacity`: max burst points
    /// - `refill_per_sec`: steady-state rate
    pub fn with_refill(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            buckets: HashMap::new(),
            capacity,
            refill_per_sec,
        }
    }

    /// Consume one point. Returns false when the caller is limited.
    pub fn check(&mut self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&mut self, key: &str, now: Instant) -> bool {
        let capacity = self.capacity as f64;
        let bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: capacity,
                last_refill: now,
            });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(capacity);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
