use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::auth::middleware::AuthUser;
use crate::auth::verification_failed;
use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

pub async fn issue_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if body.user_id.is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }

    let token = state
        .tokens
        .issue(&body.user_id)
        .map_err(|e| AppError::Internal(format!("failed to generate token: {e}")))?;

    tracing::debug!(user_id = %body.user_id, "token issued");
    Ok(Json(TokenResponse { token }))
}

pub async fn verify_token(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<ClaimsResponse>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let claims = state.tokens.verify(&body.token).map_err(verification_failed)?;
    Ok(Json(claims.into()))
}

pub async fn whoami(user: AuthUser) -> Json<ClaimsResponse> {
    Json(user.claims.into())
}
