#![forbid(unsafe_code)]

//! Client side of peer-id HTTP authentication.

pub mod authenticator;
pub mod cache;
pub mod config;
pub mod error;
pub mod transport;

pub use authenticator::{AuthenticatedResponse, ClientAuthenticator, PeerVerifier};
pub use cache::{CachedToken, TokenCache};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
