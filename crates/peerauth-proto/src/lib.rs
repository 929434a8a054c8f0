#![forbid(unsafe_code)]

//! Wire vocabulary shared by the peerauth client and server.
//!
//! Nothing in this crate performs cryptography. It defines how keys, auth
//! parameters, origins and discovery metadata look on the wire so that both
//! sides agree byte-for-byte on what gets signed.

pub mod auth_params;
pub mod metadata;
pub mod origin;
pub mod v1;

#[cfg(test)]
mod proptests;

pub use auth_params::{AuthParams, AuthParamsError, AUTH_SCHEME};
pub use metadata::{ProtocolMap, ProtocolMetadata};
pub use origin::{Origin, OriginError};

/// Fixed discovery path advertising which protocols a server speaks.
pub const WELL_KNOWN_PROTOCOLS_PATH: &str = "/.well-known/peerauth/protocols";

/// Protocol identifier of the peer-id authentication handshake itself.
pub const PEER_ID_AUTH_PROTOCOL: &str = "/http-peer-id-auth/1.0.0";

/// Auth-param names used in `WWW-Authenticate`, `Authorization` and
/// `Authentication-Info` headers.
pub mod params {
    // server -> client challenge
    pub const CHALLENGE_NONCE: &str = "challenge-nonce";
    pub const ISSUER_PEER_ID: &str = "issuer-peer-id";
    pub const ISSUED_AT: &str = "issued-at";
    pub const TTL: &str = "ttl";
    pub const SIGNATURE: &str = "signature";
    pub const PUBLIC_KEY: &str = "public-key";
    pub const HOSTNAME: &str = "hostname";

    // client -> server signed response
    pub const NONCE: &str = "nonce";
    pub const CHALLENGE_SIGNATURE: &str = "challenge-signature";
    pub const CLIENT_PUBLIC_KEY: &str = "client-public-key";
    pub const CLIENT_PEER_ID: &str = "client-peer-id";

    // bearer credential
    pub const BEARER_TOKEN: &str = "bearer-token";

    // server -> client success
    pub const ISSUED_TOKEN: &str = "issued-token";
}
