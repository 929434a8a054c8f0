//! In-process server and transport shared by the client integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::Router;
use bytes::Bytes;
use http::{Request, Response};
use tower::ServiceExt;

use peerauth_client::{HttpTransport, TransportError};
use peerauth_crypto::{Identity, ManualClock, PeerId};
use peerauth_server::{authenticated, AuthenticatedHandler, ServerAuthenticator};

pub const NOW: u64 = 1_700_000_000;

/// Drives an axum `Router` directly and counts what it is sent.
pub struct RouterTransport {
    app: Router,
    pub requests: AtomicUsize,
    pub signed_responses: AtomicUsize,
    pub bearer_requests: AtomicUsize,
    /// Added before every signed-response request reaches the router.
    pub handshake_delay: Option<Duration>,
}

impl RouterTransport {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            requests: AtomicUsize::new(0),
            signed_responses: AtomicUsize::new(0),
            bearer_requests: AtomicUsize::new(0),
            handshake_delay: None,
        }
    }

    pub fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = Some(delay);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn signed_responses(&self) -> usize {
        self.signed_responses.load(Ordering::SeqCst)
    }

    pub fn bearer_requests(&self) -> usize {
        self.bearer_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for RouterTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let authorization = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if authorization.contains("bearer-token=") {
            self.bearer_requests.fetch_add(1, Ordering::SeqCst);
        } else if authorization.contains("client-public-key=") {
            self.signed_responses.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.handshake_delay {
                tokio::time::sleep(delay).await;
            }
        }

        let response = self
            .app
            .clone()
            .oneshot(request.map(Body::from))
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let (parts, body) = response.into_parts();
        let body = to_bytes(body, usize::MAX)
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Response::from_parts(parts, body))
    }
}

/// Transport whose every request fails.
pub struct FailingTransport;

#[async_trait]
impl HttpTransport for FailingTransport {
    async fn send(&self, _request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        Err(TransportError::Http("connection refused".into()))
    }
}

pub struct TestServer {
    pub identity: Arc<Identity>,
    pub clock: Arc<ManualClock>,
    pub app: Router,
}

/// Server with challenge ttl 60s and token ttl 3600s serving `/resource`,
/// which echoes the authenticated peer id.
pub fn test_server() -> TestServer {
    test_server_with(|auth| auth)
}

pub fn test_server_with(configure: impl FnOnce(ServerAuthenticator) -> ServerAuthenticator) -> TestServer {
    test_server_serving(configure, |peer: PeerId, _req: axum::http::Request<Body>| async move {
        peer.to_hex().into_response()
    })
}

/// Same as [`test_server_with`], with `handler` answering authenticated
/// requests to `/resource`.
pub fn test_server_serving<H: AuthenticatedHandler>(
    configure: impl FnOnce(ServerAuthenticator) -> ServerAuthenticator,
    handler: H,
) -> TestServer {
    let identity = Arc::new(Identity::generate());
    let clock = Arc::new(ManualClock::new(NOW));
    let auth = ServerAuthenticator::new(Arc::clone(&identity))
        .with_challenge_ttl(60)
        .with_token_ttl(3600)
        .with_clock(clock.clone());
    let auth = Arc::new(configure(auth));

    let app = Router::new().route("/resource", authenticated(auth, handler));

    TestServer { identity, clock, app }
}

pub fn get(url: &str) -> Request<Bytes> {
    Request::builder().uri(url).body(Bytes::new()).unwrap()
}
