//! Error types for `tokengate-core`.
//!
//! Construction problems surface as [`ConfigError`] and are fatal to startup.
//! Token operations return [`TokenResult<T>`], an alias for
//! `Result<T, TokenError>`. Admission has no error type: a rejected request
//! is an ordinary `false`.

/// A component could not be built from the values it was given.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The signing secret is empty.
    #[error("signing secret must not be empty")]
    EmptySecret,

    /// The issuer identity is empty or whitespace.
    #[error("issuer must not be empty")]
    EmptyIssuer,

    /// The rate limit is negative, NaN or infinite.
    #[error("rate limit must be a finite, non-negative number (got {0})")]
    InvalidRate(f64),
}

/// Failure while issuing or verifying a bearer token.
///
/// Every verification variant is reported to clients as one generic outcome;
/// the variant itself is kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Signing the claims failed.
    #[error("failed to issue token: {0}")]
    Issuance(String),

    /// The token is not a three-segment base64url string with JSON parts.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The header names an algorithm outside the HMAC family.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not match the header and claims.
    #[error("signature is invalid")]
    InvalidSignature,

    /// The input still carries an authorization scheme such as `Bearer`.
    #[error("token should not carry the '{0}' scheme prefix")]
    InvalidFormat(String),

    /// The token is past its expiry time.
    #[error("token has expired")]
    Expired,

    /// The token was issued by a different authority.
    #[error("unexpected issuer: {0}")]
    IssuerMismatch(String),
}

impl TokenError {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Issuance(_) => "issuance",
            TokenError::Malformed(_) => "malformed",
            TokenError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::InvalidFormat(_) => "invalid_format",
            TokenError::Expired => "expired",
            TokenError::IssuerMismatch(_) => "issuer_mismatch",
        }
    }
}

/// Convenience alias used by the token module.
pub type TokenResult<T> = Result<T, TokenError>;
