//! Per-IP admission in front of every route.
//!
//! The client key is the peer address from connect-info. Behind a trusted
//! reverse proxy (`rate_limit.trust_proxy_headers`) it is the address
//! `tower_governor`'s `SmartIpKeyExtractor` resolves instead:
//! `X-Forwarded-For`, `X-Real-IP` and `Forwarded` first, then the peer.

use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tower_governor::key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor};
use tower_governor::GovernorError;

use crate::error::AppError;
use crate::state::AppState;

fn client_ip(req: &Request, trust_proxy_headers: bool) -> Result<IpAddr, GovernorError> {
    if trust_proxy_headers {
        SmartIpKeyExtractor.extract(req)
    } else {
        PeerIpKeyExtractor.extract(req)
    }
}

pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_ip(&req, state.config.rate_limit.trust_proxy_headers)
        .map_err(|e| AppError::Internal(format!("unable to determine client address: {e:?}")))?
        .to_string();

    if !state.admission.admit(&client) {
        tracing::debug!(
            %client,
            tracked_keys = state.admission.tracked_keys(),
            "rate limit exceeded"
        );
        return Err(AppError::TooManyRequests);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tokengate_core::{KeyedAdmission, ManualClock};
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServerConfig;
    use crate::test_support::{app_state_with_config, real_authority, send};

    fn app(admission: KeyedAdmission, trust_proxy_headers: bool) -> Router {
        let mut config = ServerConfig::default();
        config.rate_limit.trust_proxy_headers = trust_proxy_headers;
        let state = app_state_with_config(config, real_authority(), Arc::new(admission));
        Router::new()
            .route("/test", get(|| async { axum::Json(serde_json::json!({ "message": "success" })) }))
            .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit))
            .with_state(state)
    }

    fn limited(rate: f64) -> (Router, Arc<ManualClock>) {
        limited_behind_proxy(rate, false)
    }

    fn limited_behind_proxy(rate: f64, trust_proxy_headers: bool) -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000)));
        let admission = KeyedAdmission::with_clock(rate, clock.clone()).unwrap();
        (app(admission, trust_proxy_headers), clock)
    }

    fn peer(ip: &str) -> SocketAddr {
        SocketAddr::new(ip.parse().unwrap(), 4000)
    }

    fn get_from(ip: &str) -> Request<Body> {
        get_via(ip, &[])
    }

    fn get_via(ip: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/test");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(peer(ip)));
        req
    }

    #[tokio::test]
    async fn third_request_in_burst_is_rejected() {
        let (app, _clock) = limited(2.0);

        assert_eq!(send(&app, get_from("127.0.0.1")).await.0, StatusCode::OK);
        assert_eq!(send(&app, get_from("127.0.0.1")).await.0, StatusCode::OK);

        let (status, body) = send(&app, get_from("127.0.0.1")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "rate limit exceeded");
    }

    #[tokio::test]
    async fn requests_pass_again_after_refill() {
        let (app, clock) = limited(1.0);

        assert_eq!(send(&app, get_from("127.0.0.1")).await.0, StatusCode::OK);
        assert_eq!(
            send(&app, get_from("127.0.0.1")).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );

        clock.advance(Duration::from_secs(1));
        assert_eq!(send(&app, get_from("127.0.0.1")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn clients_are_limited_independently() {
        let (app, _clock) = limited(1.0);

        assert_eq!(send(&app, get_from("10.0.0.1")).await.0, StatusCode::OK);
        assert_eq!(
            send(&app, get_from("10.0.0.1")).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(send(&app, get_from("10.0.0.2")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn spoofed_proxy_headers_do_not_reset_the_bucket() {
        let (app, _clock) = limited(1.0);

        let first = get_via("192.0.2.1", &[("x-real-ip", "198.51.100.1")]);
        let second = get_via(
            "192.0.2.1",
            &[("x-real-ip", "198.51.100.2"), ("x-forwarded-for", "198.51.100.3")],
        );

        assert_eq!(send(&app, first).await.0, StatusCode::OK);
        assert_eq!(send(&app, second).await.0, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn forwarded_for_header_identifies_client_behind_trusted_proxy() {
        let (app, _clock) = limited_behind_proxy(1.0, true);
        let forwarded = || get_via("10.0.0.1", &[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);

        assert_eq!(send(&app, forwarded()).await.0, StatusCode::OK);
        assert_eq!(send(&app, forwarded()).await.0, StatusCode::TOO_MANY_REQUESTS);
        // Same proxy hop, different forwarded client.
        let other = get_via("10.0.0.1", &[("x-real-ip", "203.0.113.8")]);
        assert_eq!(send(&app, other).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn trusted_proxy_falls_back_to_peer_address() {
        let (app, _clock) = limited_behind_proxy(1.0, true);

        assert_eq!(send(&app, get_from("192.0.2.1")).await.0, StatusCode::OK);
        assert_eq!(
            send(&app, get_from("192.0.2.1")).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn unknown_client_address_is_an_internal_error() {
        let (app, _clock) = limited(5.0);
        let req = Request::builder()
            .uri("/test")
            .header("x-real-ip", "198.51.100.1")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn zero_rate_rejects_everything() {
        let (app, clock) = limited(0.0);
        assert_eq!(
            send(&app, get_from("127.0.0.1")).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        clock.advance(Duration::from_secs(60));
        assert_eq!(
            send(&app, get_from("127.0.0.1")).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_never_exceed_burst() {
        let (app, _clock) = limited(2.0);

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move { app.oneshot(get_from("127.0.0.1")).await.unwrap().status() })
            })
            .collect();

        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                StatusCode::OK => ok += 1,
                StatusCode::TOO_MANY_REQUESTS => rejected += 1,
                other => panic!("unexpected status {other}"),
            }
        }
        assert_eq!(ok, 2);
        assert_eq!(rejected, 3);
    }
}
