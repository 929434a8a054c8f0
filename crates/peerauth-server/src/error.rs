//! Server-side authentication failures and how they map onto HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("malformed credential: {0}")]
    Malformed(String),
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("challenge expired")]
    ChallengeExpired,
    #[error("token expired")]
    TokenExpired,
    #[error("client peer id does not match its public key")]
    IdentityMismatch,
    #[error("hostname not accepted: {0}")]
    HostnameRejected(String),
    #[error("an encrypted connection is required")]
    TlsRequired,
}

impl AuthError {
    /// Terminal failures get no fresh challenge; retrying cannot fix them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthError::Malformed(_) | AuthError::HostnameRejected(_) | AuthError::TlsRequired
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Malformed(_) => StatusCode::BAD_REQUEST,
            AuthError::HostnameRejected(_) | AuthError::TlsRequired => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "malformed",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::ChallengeExpired => "challenge_expired",
            AuthError::TokenExpired => "token_expired",
            AuthError::IdentityMismatch => "identity_mismatch",
            AuthError::HostnameRejected(_) => "hostname_rejected",
            AuthError::TlsRequired => "tls_required",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
