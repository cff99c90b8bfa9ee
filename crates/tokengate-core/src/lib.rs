//! tokengate core library — token issuance and admission control.
//!
//! `tokengate-core` holds the two pieces of logic the HTTP service is built
//! around. It performs no I/O and never logs; failures are returned as typed
//! errors and the caller decides how to report them.
//!
//! # Modules
//!
//! - [`token`] — [`TokenAuthority`] contract and the HMAC-signed [`HmacAuthority`].
//! - [`admission`] — [`Admission`] contract, [`TokenBucket`] and the per-key [`KeyedAdmission`] registry.
//! - [`clock`] — Injectable time source ([`Clock`], [`SystemClock`], [`ManualClock`]).
//! - [`error`] — [`ConfigError`] for construction and [`TokenError`] for token operations.

pub mod admission;
pub mod clock;
pub mod error;
pub mod token;

pub use admission::{Admission, KeyedAdmission, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, TokenError, TokenResult};
pub use token::{Claims, HmacAuthority, TokenAuthority, TOKEN_LIFETIME};
