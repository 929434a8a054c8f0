//! Self-verifying server challenges.
//!
//! A challenge carries its own proof of origin (the issuer's signature) and
//! its own expiry. Whoever holds the issuer's public key can validate it, so
//! the issuing server keeps no record of the nonces it handed out.

use rand_core::{OsRng, RngCore};

use peerauth_proto::{params, AuthParams, AuthParamsError};

use crate::identity::{verify_signature, Identity, PeerId, PublicKey};
use crate::transcript::{domains, tags, Transcript};
use crate::utils::{b64_decode_array, b64_encode};

pub const NONCE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("challenge expired at {expired_at}")]
    Expired { expired_at: u64 },
    #[error("challenge signature invalid")]
    SignatureInvalid,
    #[error("malformed challenge: {0}")]
    Malformed(String),
}

impl From<AuthParamsError> for ChallengeError {
    fn from(e: AuthParamsError) -> Self {
        ChallengeError::Malformed(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub nonce: [u8; NONCE_LEN],
    pub issuer: PeerId,
    pub issued_at: u64,
    pub ttl: u64,
    pub signature: [u8; 64],
}

impl Challenge {
    /// Digest signed by the issuer: H(nonce || issuer || issued_at || ttl).
    pub fn signing_input(nonce: &[u8; NONCE_LEN], issuer: &PeerId, issued_at: u64, ttl: u64) -> [u8; 32] {
        let mut t = Transcript::new(domains::CHALLENGE);
        t.append_bytes(tags::NONCE, nonce);
        t.append_bytes(tags::ISSUER, issuer.as_bytes());
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

    /// Check the issuer signature, that `issuer_key` is the claimed issuer,
    /// and expiry, in that order.
    pub fn verify(&self, issuer_key: &PublicKey, now_unix: u64) -> Result<(), ChallengeError> {
        if !issuer_key.peer_id().ct_eq(&self.issuer) {
            return Err(ChallengeError::SignatureInvalid);
        }
        let digest = Self::signing_input(&self.nonce, &self.issuer, self.issued_at, self.ttl);
        if !verify_signature(issuer_key, &digest, &self.signature) {
            return Err(ChallengeError::SignatureInvalid);
        }
        if self.is_expired(now_unix) {
            return Err(ChallengeError::Expired {
                expired_at: self.expires_at(),
            });
        }
        Ok(())
    }

    /// Header form sent by the server in `WWW-Authenticate`.
    pub fn to_params(&self) -> AuthParams {
        let mut p = AuthParams::new();
        p.insert(params::CHALLENGE_NONCE, b64_encode(&self.nonce))
            .insert(params::ISSUER_PEER_ID, self.issuer.to_hex())
            .insert(params::ISSUED_AT, self.issued_at.to_string())
            .insert(params::TTL, self.ttl.to_string())
            .insert(params::SIGNATURE, b64_encode(&self.signature));
        p
    }

    pub fn from_params(p: &AuthParams) -> Result<Self, ChallengeError> {
        Self::from_named_params(p, params::CHALLENGE_NONCE, params::SIGNATURE)
    }

    /// Echo form carried back inside a signed response.
    pub fn write_echo_params(&self, p: &mut AuthParams) {
        p.insert(params::NONCE, b64_encode(&self.nonce))
            .insert(params::ISSUER_PEER_ID, self.issuer.to_hex())
            .insert(params::ISSUED_AT, self.issued_at.to_string())
            .insert(params::TTL, self.ttl.to_string())
            .insert(params::CHALLENGE_SIGNATURE, b64_encode(&self.signature));
    }

    pub fn from_echo_params(p: &AuthParams) -> Result<Self, ChallengeError> {
        Self::from_named_params(p, params::NONCE, params::CHALLENGE_SIGNATURE)
    }

    fn from_named_params(
        p: &AuthParams,
        nonce_key: &'static str,
        signature_key: &'static str,
    ) -> Result<Self, ChallengeError> {
        let nonce = b64_decode_array(p.require(nonce_key)?)
            .ok_or_else(|| ChallengeError::Malformed(format!("{} must be {} bytes", nonce_key, NONCE_LEN)))?;
        let issuer = p
            .require(params::ISSUER_PEER_ID)?
            .parse::<PeerId>()
            .map_err(|e| ChallengeError::Malformed(format!("{}: {}", params::ISSUER_PEER_ID, e)))?;
        let issued_at = parse_u64(p.require(params::ISSUED_AT)?, params::ISSUED_AT)?;
        let ttl = parse_u64(p.require(params::TTL)?, params::TTL)?;
        let signature = b64_decode_array(p.require(signature_key)?)
            .ok_or_else(|| ChallengeError::Malformed(format!("{} must be 64 bytes", signature_key)))?;

        Ok(Self {
            nonce,
            issuer,
            issued_at,
            ttl,
            signature,
        })
    }

    /// Transport-safe string form (the `WWW-Authenticate` challenge params).
    pub fn encode(&self) -> String {
        self.to_params().encode()
    }

    pub fn decode(encoded: &str) -> Result<Self, ChallengeError> {
        Self::from_params(&AuthParams::parse(encoded)?)
    }
}

fn parse_u64(value: &str, field: &'static str) -> Result<u64, ChallengeError> {
    value
        .parse()
        .map_err(|_| ChallengeError::Malformed(format!("{} is not an integer", field)))
}

/// Issue a fresh challenge with a random nonce, stamped `now_unix`.
pub fn issue_challenge(issuer: &Identity, ttl: u64, now_unix: u64) -> Challenge {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let issuer_id = issuer.peer_id();
    let digest = Challenge::signing_input(&nonce, &issuer_id, now_unix, ttl);
    Challenge {
        nonce,
        issuer: issuer_id,
        issued_at: now_unix,
        ttl,
        signature: issuer.sign(&digest),
    }
}

/// Decode and verify an encoded challenge against the issuer's key.
pub fn verify_challenge(
    encoded: &str,
    issuer_key: &PublicKey,
    now_unix: u64,
) -> Result<Challenge, ChallengeError> {
    let challenge = Challenge::decode(encoded)?;
    challenge.verify(issuer_key, now_unix)?;
    Ok(challenge)
}
