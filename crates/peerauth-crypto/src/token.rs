//! Stateless bearer tokens.
//!
//! A token names the authenticated peer, the origin it was issued for, and
//! its validity window, all under the server's signature. The server looks
//! nothing up to accept one. Tokens are never revoked; they simply expire.
//!
//! Wire form: base64url(JSON) with the signature inside.

use serde::{Deserialize, Serialize};

use peerauth_proto::Origin;

use crate::identity::{verify_signature, Identity, PeerId, PublicKey};
use crate::transcript::{domains, tags, Transcript};
use crate::utils::{b64_decode, b64_decode_array, b64_encode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired at {expired_at}")]
    Expired { expired_at: u64 },
    #[error("token signature invalid")]
    SignatureInvalid,
    #[error("token issued for a different origin")]
    OriginMismatch,
    #[error("malformed token: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub peer_id: PeerId,
    pub origin: String,
    pub issued_at: u64,
    pub ttl: u64,
    pub signature: [u8; 64],
}

#[derive(Serialize, Deserialize)]
struct TokenWire {
    peer: String,
    origin: String,
    iat: u64,
    ttl: u64,
    sig: String,
}

impl BearerToken {
    /// Digest signed by the server: H(peer || origin || issued_at || ttl).
    pub fn signing_input(peer_id: &PeerId, origin: &str, issued_at: u64, ttl: u64) -> [u8; 32] {
        let mut t = Transcript::new(domains::TOKEN);
        t.append_bytes(tags::PEER, peer_id.as_bytes());
        t.append_str(tags::ORIGIN, origin);
        t.append_u64(tags::ISSUED_AT, issued_at);
        t.append_u64(tags::TTL, ttl);
        t.finalize()
    }

    pub fn expires_at(&self) -> u64 {
        self.issued_at.saturating_add(self.ttl)
    }

    pub fn is_expired(&self, now_unix: u64) -> bool {
        now_unix > self.expires_at()
    }

    /// Signature first, then origin binding, then expiry.
    pub fn verify(&self, server_key: &PublicKey, origin: &Origin, now_unix: u64) -> Result<(), TokenError> {
        let digest = Self::signing_input(&self.peer_id, &self.origin, self.issued_at, self.ttl);
        if !verify_signature(server_key, &digest, &self.signature) {
            return Err(TokenError::SignatureInvalid);
        }
        if self.origin != origin.as_str() {
            return Err(TokenError::OriginMismatch);
        }
        if self.is_expired(now_unix) {
            return Err(TokenError::Expired {
                expired_at: self.expires_at(),
            });
        }
        Ok(())
    }

    pub fn encode(&self) -> String {
        let wire = TokenWire {
            peer: self.peer_id.to_hex(),
            origin: self.origin.clone(),
            iat: self.issued_at,
            ttl: self.ttl,
            sig: b64_encode(&self.signature),
        };
        // serializing a struct of strings and integers cannot fail
        let json = serde_json::to_vec(&wire).unwrap_or_default();
        b64_encode(&json)
    }

    pub fn decode(encoded: &str) -> Result<Self, TokenError> {
        let json = b64_decode(encoded.trim()).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let wire: TokenWire =
            serde_json::from_slice(&json).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let peer_id = wire
            .peer
            .parse::<PeerId>()
            .map_err(|e| TokenError::Malformed(format!("peer: {}", e)))?;
        let signature = b64_decode_array(&wire.sig)
            .ok_or_else(|| TokenError::Malformed("sig must be 64 bytes".to_string()))?;
        Ok(Self {
            peer_id,
            origin: wire.origin,
            issued_at: wire.iat,
            ttl: wire.ttl,
            signature,
        })
    }
}

/// Mint a token for `peer_id`, valid at `origin` for `ttl` seconds.
pub fn issue_token(server: &Identity, peer_id: PeerId, origin: &Origin, ttl: u64, now_unix: u64) -> BearerToken {
    let digest = BearerToken::signing_input(&peer_id, origin.as_str(), now_unix, ttl);
    BearerToken {
        peer_id,
        origin: origin.as_str().to_string(),
        issued_at: now_unix,
        ttl,
        signature: server.sign(&digest),
    }
}

pub fn verify_token(
    encoded: &str,
    server_key: &PublicKey,
    origin: &Origin,
    now_unix: u64,
) -> Result<BearerToken, TokenError> {
    let token = BearerToken::decode(encoded)?;
    token.verify(server_key, origin, now_unix)?;
    Ok(token)
}
