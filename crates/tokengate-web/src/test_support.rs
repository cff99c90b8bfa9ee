//! Shared fixtures for router tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use tokengate_core::{Admission, Claims, HmacAuthority, TokenAuthority, TokenError, TokenResult};
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::state::AppState;

pub const CLIENT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40_000);

pub fn app_state(tokens: Arc<dyn TokenAuthority>, admission: Arc<dyn Admission>) -> AppState {
    app_state_with_config(ServerConfig::default(), tokens, admission)
}

pub fn app_state_with_config(
    config: ServerConfig,
    tokens: Arc<dyn TokenAuthority>,
    admission: Arc<dyn Admission>,
) -> AppState {
    AppState {
        config: Arc::new(config),
        tokens,
        admission,
    }
}

/// Attaches the peer address axum would record for a real connection.
pub fn from_peer(mut req: Request<Body>, peer: SocketAddr) -> Request<Body> {
    req.extensions_mut().insert(ConnectInfo(peer));
    req
}

pub fn real_authority() -> Arc<HmacAuthority> {
    Arc::new(HmacAuthority::new(b"secret", "userName").expect("authority"))
}

pub struct AllowAll;

impl Admission for AllowAll {
    fn admit(&self, _key: &str) -> bool {
        true
    }

    fn tracked_keys(&self) -> usize {
        0
    }
}

/// Authority with a canned issuance result that counts its calls.
pub struct FakeAuthority {
    issue_result: TokenResult<String>,
    verify_result: TokenResult<Claims>,
    issued: AtomicUsize,
}

impl FakeAuthority {
    pub fn issuing(token: &str) -> Self {
        Self {
            issue_result: Ok(token.to_string()),
            verify_result: Err(TokenError::InvalidSignature),
            issued: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            issue_result: Err(TokenError::Issuance("signer unavailable".to_string())),
            verify_result: Err(TokenError::InvalidSignature),
            issued: AtomicUsize::new(0),
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl TokenAuthority for FakeAuthority {
    fn issue(&self, _subject: &str) -> TokenResult<String> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        self.issue_result.clone()
    }

    fn verify(&self, _token: &str) -> TokenResult<Claims> {
        self.verify_result.clone()
    }
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    from_peer(req, CLIENT_ADDR)
}

/// Runs one request and returns the status plus the JSON body (`Null` if empty).
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}
