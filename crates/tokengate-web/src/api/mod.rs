mod token_handlers;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::middleware::rate_limit::rate_limit;
use crate::state::AppState;

/// All routes, each behind the per-IP admission check.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/token", post(token_handlers::issue_token))
        .route("/token/verify", post(token_handlers::verify_token))
        .route("/me", get(token_handlers::whoami))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}
