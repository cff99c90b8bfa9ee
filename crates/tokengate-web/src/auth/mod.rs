pub mod middleware;

use tokengate_core::TokenError;

use crate::error::AppError;

/// Collapses every verification failure into one client-facing outcome,
/// keeping the specific kind in the logs.
pub fn verification_failed(err: TokenError) -> AppError {
    tracing::debug!(kind = err.kind(), error = %err, "token verification failed");
    AppError::Auth("Invalid or expired token".to_string())
}
