mod api;
mod auth;
mod config;
mod dto;
mod error;
mod logging;
mod middleware;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, Method};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    logging::init(&config)?;

    tracing::info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "tokengate loading"
    );
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    let state = AppState::from_config(config)?;
    let config = state.config.clone();
    tracing::info!(
        rate_limit = config.rate_limit.requests_per_second,
        trust_proxy_headers = config.rate_limit.trust_proxy_headers,
        "configured rate limit"
    );

    // CORS: token endpoints are called from other origins with JSON bodies
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = api::router(state)
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone(), config.shutdown_grace()));

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let (Some(cert), Some(key)) = (&config.tls.cert_path, &config.tls.key_path) {
        let rustls_config = RustlsConfig::from_pem_file(cert, key).await?;
        tracing::info!("tokengate listening on https://{}", config.bind_addr);
        axum_server::bind_rustls(config.bind_addr, rustls_config)
            .handle(handle)
            .serve(service)
            .await?;
    } else {
        tracing::info!("tokengate listening on http://{}", config.bind_addr);
        axum_server::bind(config.bind_addr)
            .handle(handle)
            .serve(service)
            .await?;
    }

    tracing::info!("the server has been turned off gracefully");
    Ok(())
}

/// Waits for SIGINT/SIGTERM, then stops accepting connections and gives
/// in-flight requests `grace` to finish.
async fn shutdown_on_signal(handle: Handle, grace: Duration) {
    shutdown_signal().await;
    tracing::info!(
        grace_secs = grace.as_secs(),
        "shutdown signal received, shutting down gracefully"
    );
    handle.graceful_shutdown(Some(grace));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
