use http::StatusCode;
use thiserror::Error;

use peerauth_crypto::PeerId;
use peerauth_proto::{AuthParamsError, OriginError};

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Passed through unchanged from the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request has no usable origin: {0}")]
    Origin(#[from] OriginError),

    #[error("malformed server challenge: {0}")]
    Malformed(String),

    #[error("server challenge signature invalid")]
    SignatureInvalid,

    #[error("server peer id {claimed} does not match its public key (derives {derived})")]
    IdentityMismatch { claimed: PeerId, derived: PeerId },

    #[error("server {0} refused by peer verifier")]
    UnexpectedPeer(PeerId),

    #[error("server answered {status} without a PeerID challenge")]
    NoChallenge { status: StatusCode },

    #[error("server rejected the signed response ({status}): {message}")]
    AuthenticationRejected { status: StatusCode, message: String },
}

impl From<AuthParamsError> for ClientError {
    fn from(e: AuthParamsError) -> Self {
        ClientError::Malformed(e.to_string())
    }
}
