//! Per-key admission control.
//!
//! Each caller key (normally a client address) gets its own token bucket.
//! A rejected request is an expected outcome, not an error.

pub mod bucket;
pub mod keyed;

pub use bucket::TokenBucket;
pub use keyed::KeyedAdmission;

/// Decides whether a unit of work from `key` may proceed.
pub trait Admission: Send + Sync {
    /// Returns `true` and consumes a permit if one is available for `key`.
    fn admit(&self, key: &str) -> bool;

    /// Number of distinct keys currently holding admission state.
    fn tracked_keys(&self) -> usize;
}
