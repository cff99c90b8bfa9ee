//! HMAC-signed bearer tokens carrying a single subject claim.
//!
//! Tokens use the compact JWT form: three base64url segments (header, claims,
//! signature) joined by periods. They are never stored; a token is valid when
//! its signature checks out under the authority's secret, it names this
//! authority as issuer, and the current time has not passed `exp`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, TokenError, TokenResult};

/// Fixed lifetime of every issued token.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Algorithms a presented token may declare. Issuance always uses HS256.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims embedded in every token. Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user identifier being asserted.
    pub sub: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// Issues and verifies bearer tokens.
pub trait TokenAuthority: Send + Sync {
    /// Signs a new token for `subject`.
    ///
    /// The subject is not checked for emptiness here; callers that need a
    /// non-empty identifier must enforce it themselves.
    fn issue(&self, subject: &str) -> TokenResult<String>;

    /// Checks a bare encoded token and returns its claims.
    ///
    /// Any authorization scheme (`Bearer ...`) must already be stripped.
    fn verify(&self, token: &str) -> TokenResult<Claims>;
}

/// [`TokenAuthority`] backed by a shared HMAC secret.
///
/// Immutable after construction, so a single instance can be shared across
/// request handlers without locking.
pub struct HmacAuthority {
    issuer: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl HmacAuthority {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_clock(secret, issuer, Arc::new(SystemClock))
    }

    /// Builds an authority that reads the current time from `clock`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptySecret`] if `secret` is empty.
    /// - [`ConfigError::EmptyIssuer`] if `issuer` is empty or whitespace.
    pub fn with_clock(
        secret: &[u8],
        issuer: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(ConfigError::EmptyIssuer);
        }

        // Expiry and issuer are checked by hand against the injected clock
        // and the exact issuer string; jsonwebtoken only verifies signatures.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Ok(Self {
            issuer,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock,
        })
    }
}

impl fmt::Debug for HmacAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacAuthority")
            .field("issuer", &self.issuer)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority for HmacAuthority {
    fn issue(&self, subject: &str) -> TokenResult<String> {
        let issued_at = self.clock.now().as_secs();
        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME.as_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Issuance(e.to_string()))
    }

    fn verify(&self, token: &str) -> TokenResult<Claims> {
        if let Some(scheme) = scheme_prefix(token) {
            return Err(TokenError::InvalidFormat(scheme.to_string()));
        }

        let header = header_segment(token)?;
        let alg = declared_algorithm(header)?;
        match alg.parse::<Algorithm>() {
            Ok(parsed) if HMAC_ALGORITHMS.contains(&parsed) => {}
            _ => return Err(TokenError::UnsupportedAlgorithm(alg)),
        }

        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(from_jwt_error)?
            .claims;

        if claims.iss != self.issuer {
            return Err(TokenError::IssuerMismatch(claims.iss));
        }
        if self.clock.now().as_secs() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// Returns the leading scheme word of inputs like `"Bearer abc.def.ghi"`.
fn scheme_prefix(token: &str) -> Option<&str> {
    let (scheme, _) = token.split_once(char::is_whitespace)?;
    (!scheme.is_empty() && !scheme.contains('.')).then_some(scheme)
}

/// Checks the three-segment shape and returns the header segment.
fn header_segment(token: &str) -> TokenResult<&str> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed(
            "invalid number of segments".to_string(),
        ));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::Malformed("empty segment".to_string()));
    }
    Ok(segments[0])
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Reads `alg` without restricting it to names jsonwebtoken knows, so that
/// `none` and other foreign values are reported as unsupported.
fn declared_algorithm(segment: &str) -> TokenResult<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("header is not base64url: {e}")))?;
    let header: RawHeader = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("header is not valid JSON: {e}")))?;
    Ok(header.alg)
}

fn from_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenError::UnsupportedAlgorithm(err.to_string())
        }
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}
