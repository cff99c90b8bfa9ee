use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use tokengate_core::Claims;

use crate::error::AppError;
use crate::state::AppState;

/// Claims of a caller that presented a valid `Authorization: Bearer` token.
pub struct AuthUser {
    pub claims: Claims,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

        // The token authority only accepts bare tokens.
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

        let claims = state
            .tokens
            .verify(token.trim())
            .map_err(super::verification_failed)?;

        Ok(AuthUser { claims })
    }
}
