#![forbid(unsafe_code)]

//! Server side of peer-id HTTP authentication.
//!
//! [`ServerAuthenticator`] judges requests and wraps an
//! [`AuthenticatedHandler`]; [`WellKnownRegistry`] backs the discovery
//! endpoint; [`PeerAuthServer`] puts both behind an axum listener.

pub mod api;
pub mod authenticator;
pub mod config;
pub mod error;
pub mod handler;
pub mod hostname;
pub mod metrics;
pub mod registry;
pub mod server;

#[cfg(test)]
mod proptests;

pub use authenticator::{AuthOutcome, SecureConnection, ServerAuthenticator};
pub use config::{ConfigError, ServerConfig};
pub use error::AuthError;
pub use handler::{authenticated, AuthenticatedHandler};
pub use hostname::{allow_any, allow_list, HostnamePredicate};
pub use metrics::AuthMetrics;
pub use registry::WellKnownRegistry;
pub use server::PeerAuthServer;
