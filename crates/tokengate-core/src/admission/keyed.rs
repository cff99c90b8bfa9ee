use std::sync::Arc;

use dashmap::DashMap;

use super::bucket::TokenBucket;
use super::Admission;
use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;

/// One independent [`TokenBucket`] per client key.
///
/// Buckets are created on first sight of a key and kept for the lifetime of
/// the registry. Nothing is evicted, so keys must come from a bounded space
/// such as client addresses.
#[derive(Debug)]
pub struct KeyedAdmission {
    limiters: DashMap<String, Arc<TokenBucket>>,
    rate: f64,
    burst: u32,
    clock: Arc<dyn Clock>,
}

impl KeyedAdmission {
    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        Self::with_clock(rate, Arc::new(SystemClock))
    }

    /// Builds a registry whose buckets refill at `rate` permits per second.
    ///
    /// Burst capacity is `rate` truncated to a whole number, so any rate
    /// below 1 produces buckets that reject every request.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidRate`] if `rate` is negative, NaN or infinite.
    pub fn with_clock(rate: f64, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::InvalidRate(rate));
        }
        // Float to int `as` saturates, so huge rates cap at u32::MAX.
        let burst = rate.trunc() as u32;

        Ok(Self {
            limiters: DashMap::new(),
            rate,
            burst,
            clock,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Returns the bucket for `key`, creating it if this is the first request.
    ///
    /// Creation goes through the map's entry API, which holds the shard lock,
    /// so racing callers for a new key all receive the same bucket.
    fn limiter(&self, key: &str) -> Arc<TokenBucket> {
        if let Some(existing) = self.limiters.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self.limiters.entry(key.to_string()).or_insert_with(|| {
            Arc::new(TokenBucket::new(self.rate, self.burst, self.clock.now()))
        });
        Arc::clone(entry.value())
    }
}

impl Admission for KeyedAdmission {
    fn admit(&self, key: &str) -> bool {
        // The shard lock is released before the bucket is consulted, so busy
        // keys never serialize traffic for unrelated keys.
        let limiter = self.limiter(key);
        limiter.try_acquire(self.clock.now())
    }

    fn tracked_keys(&self) -> usize {
        self.limiters.len()
    }
}
