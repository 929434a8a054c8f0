//! The HTTP layer underneath the authenticator.
//!
//! Requests and responses are fully buffered `http` types, so the same
//! request can be replayed with different credentials.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        (**self).send(request).await
    }
}

/// Transport backed by a rustls reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let request = reqwest::Request::try_from(request)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let resp = self.client.execute(request).await.map_err(map_reqwest_error)?;

        let status = resp.status();
        let version = resp.version();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(map_reqwest_error)?;

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.version_mut() = version;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e.to_string())
    }
}

/// Copy of `request` with the same method, target, headers and body.
/// Extensions are not carried over.
pub fn clone_request(request: &Request<Bytes>) -> Request<Bytes> {
    let mut copy = Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http::Method;

    #[test]
    fn clone_keeps_method_target_headers_and_body() {
        let original = Request::builder()
            .method(Method::POST)
            .uri("https://example.com/upload?x=1")
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        let copy = clone_request(&original);
        assert_eq!(copy.method(), Method::POST);
        assert_eq!(copy.uri(), original.uri());
        assert_eq!(copy.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(copy.body(), original.body());
    }

    #[test]
    fn reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Some(Duration::from_secs(5))).is_ok());
    }
}
