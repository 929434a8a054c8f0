//! Client answer to a server challenge.
//!
//! The client signs (nonce, issuer, origin, client peer id) and echoes the
//! full challenge so the server can re-verify it without remembering it.

use peerauth_proto::{params, AuthParams, AuthParamsError, Origin};

use crate::challenge::{Challenge, ChallengeError};
use crate::identity::{verify_signature, Identity, PeerId, PublicKey};
use crate::transcript::{domains, tags, Transcript};
use crate::utils::{b64_decode_array, b64_encode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("malformed signed response: {0}")]
    Malformed(String),
    #[error("client peer id {claimed} does not match public key (derives {derived})")]
    IdentityMismatch { claimed: PeerId, derived: PeerId },
    #[error("client signature invalid")]
    SignatureInvalid,
}

impl From<AuthParamsError> for ResponseError {
    fn from(e: AuthParamsError) -> Self {
        ResponseError::Malformed(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedResponse {
    pub challenge: Challenge,
    pub client_key: PublicKey,
    pub client_peer_id: PeerId,
    pub signature: [u8; 64],
}

impl SignedResponse {
    /// Digest signed by the client: H(nonce || issuer || origin || client).
    pub fn signing_input(challenge: &Challenge, origin: &Origin, client_peer_id: &PeerId) -> [u8; 32] {
        let mut t = Transcript::new(domains::RESPONSE);
        t.append_bytes(tags::NONCE, &challenge.nonce);
        t.append_bytes(tags::ISSUER, challenge.issuer.as_bytes());
        t.append_str(tags::ORIGIN, origin.as_str());
        t.append_bytes(tags::PEER, client_peer_id.as_bytes());
        t.finalize()
    }

    pub fn sign(client: &Identity, challenge: Challenge, origin: &Origin) -> Self {
        let client_peer_id = client.peer_id();
        let digest = Self::signing_input(&challenge, origin, &client_peer_id);
        Self {
            signature: client.sign(&digest),
            challenge,
            client_key: client.public_key(),
            client_peer_id,
        }
    }

    /// Check that the claimed peer id derives from the supplied key, then the
    /// client signature over `origin`. The embedded challenge is verified
    /// separately against the server's own key.
    pub fn verify(&self, origin: &Origin) -> Result<(), ResponseError> {
        let derived = self.client_key.peer_id();
        if !derived.ct_eq(&self.client_peer_id) {
            return Err(ResponseError::IdentityMismatch {
                claimed: self.client_peer_id,
                derived,
            });
        }
        let digest = Self::signing_input(&self.challenge, origin, &self.client_peer_id);
        if !verify_signature(&self.client_key, &digest, &self.signature) {
            return Err(ResponseError::SignatureInvalid);
        }
        Ok(())
    }

    /// `Authorization` header form.
    pub fn to_params(&self) -> AuthParams {
        let mut p = AuthParams::new();
        self.challenge.write_echo_params(&mut p);
        p.insert(params::CLIENT_PUBLIC_KEY, self.client_key.to_base64())
            .insert(params::CLIENT_PEER_ID, self.client_peer_id.to_hex())
            .insert(params::SIGNATURE, b64_encode(&self.signature));
        p
    }

    pub fn from_params(p: &AuthParams) -> Result<Self, ResponseError> {
        let challenge = Challenge::from_echo_params(p).map_err(|e| match e {
            ChallengeError::Malformed(m) => ResponseError::Malformed(m),
            other => ResponseError::Malformed(other.to_string()),
        })?;
        let client_key = PublicKey::from_base64(p.require(params::CLIENT_PUBLIC_KEY)?)
            .map_err(|e| ResponseError::Malformed(format!("{}: {}", params::CLIENT_PUBLIC_KEY, e)))?;
        let client_peer_id = p
            .require(params::CLIENT_PEER_ID)?
            .parse::<PeerId>()
            .map_err(|e| ResponseError::Malformed(format!("{}: {}", params::CLIENT_PEER_ID, e)))?;
        let signature = b64_decode_array(p.require(params::SIGNATURE)?)
            .ok_or_else(|| ResponseError::Malformed(format!("{} must be 64 bytes", params::SIGNATURE)))?;

        Ok(Self {
            challenge,
            client_key,
            client_peer_id,
            signature,
        })
    }

    /// Whether a parsed credential looks like a signed response at all.
    pub fn is_present(p: &AuthParams) -> bool {
        p.contains(params::NONCE) || p.contains(params::CLIENT_PUBLIC_KEY)
    }
}
