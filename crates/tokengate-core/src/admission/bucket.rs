use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A token bucket rate limiter.
///
/// Holds up to `capacity` permits and refills continuously at `rate` permits
/// per second. Each [`try_acquire`](TokenBucket::try_acquire) consumes one
/// whole permit; fractional refill carries over between calls.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Duration,
}

impl TokenBucket {
    /// Creates a full bucket. `now` is the clock reading refill starts from.
    pub fn new(rate: f64, capacity: u32, now: Duration) -> Self {
        let capacity = f64::from(capacity);
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// Refills for the time since the last call, then tries to take one permit.
    pub fn try_acquire(&self, now: Duration) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // A clock that steps backwards refills nothing and keeps the later mark.
        let elapsed = now.saturating_sub(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = state.last_refill.max(now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Permits available at `now`, without consuming any.
    pub fn available(&self, now: Duration) -> f64 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now.saturating_sub(state.last_refill).as_secs_f64();
        (state.tokens + elapsed * self.rate).min(self.capacity)
    }
}
