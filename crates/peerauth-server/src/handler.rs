//! The continuation invoked once a request is authenticated, and the axum
//! glue that puts a [`ServerAuthenticator`] in front of it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::routing::{any, MethodRouter};

use peerauth_crypto::PeerId;

use crate::authenticator::ServerAuthenticator;

/// Next step after authentication. Called exactly once per authenticated
/// request with the verified client peer id.
#[async_trait]
pub trait AuthenticatedHandler: Send + Sync + 'static {
    async fn call(&self, peer: PeerId, request: Request<Body>) -> Response;
}

#[async_trait]
impl<F, Fut> AuthenticatedHandler for F
where
    F: Fn(PeerId, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn call(&self, peer: PeerId, request: Request<Body>) -> Response {
        (self)(peer, request).await
    }
}

/// Route that authenticates every method and hands successful requests to
/// `handler`.
pub fn authenticated<S, H>(auth: Arc<ServerAuthenticator>, handler: H) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
    H: AuthenticatedHandler,
{
    let handler = Arc::new(handler);
    any(move |request: Request<Body>| {
        let auth = Arc::clone(&auth);
        let handler = Arc::clone(&handler);
        async move { auth.handle(request, handler.as_ref()).await }
    })
}
