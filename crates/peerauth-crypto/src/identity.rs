//! Node identity: Ed25519 key pairs and the PeerIds derived from them.
//!
//! A PeerId is a pure function of the public key. It is never stored apart
//! from, or invented independently of, a key.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use peerauth_proto::v1::{KeyTypeV1, PublicKeyV1};

use crate::hash::derive_peer_id;
use crate::utils::{b64_decode, b64_encode, constant_time_compare};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(i32),
    #[error("invalid encoding: {0}")]
    Encoding(String),
}

/// Stable node identifier: SHA-256 of the protobuf-encoded public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; 32]);

impl PeerId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Constant-time equality, for comparing a claimed id against a derived one.
    pub fn ct_eq(&self, other: &PeerId) -> bool {
        constant_time_compare(&self.0, &other.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &self.to_hex()[..16])
    }
}

impl FromStr for PeerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| IdentityError::Encoding(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidKeyLength {
                expected: 32,
                got: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

/// A peer's Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_ed25519_bytes(bytes: &[u8; 32]) -> Result<Self, IdentityError> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| IdentityError::InvalidPublicKey)
    }

    pub fn to_ed25519_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Protobuf encoding; the PeerId is derived from exactly these bytes.
    pub fn to_protobuf(&self) -> Vec<u8> {
        PublicKeyV1::ed25519(self.0.to_bytes()).to_bytes()
    }

    pub fn from_protobuf(bytes: &[u8]) -> Result<Self, IdentityError> {
        let msg = PublicKeyV1::from_bytes(bytes)
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;
        if msg.key_type != i32::from(KeyTypeV1::Ed25519) {
            return Err(IdentityError::UnsupportedKeyType(msg.key_type));
        }
        let key: [u8; 32] =
            msg.key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdentityError::InvalidKeyLength {
                    expected: 32,
                    got: msg.key_bytes.len(),
                })?;
        Self::from_ed25519_bytes(&key)
    }

    /// base64url (no padding) of the protobuf encoding, as carried in headers.
    pub fn to_base64(&self) -> String {
        b64_encode(&self.to_protobuf())
    }

    pub fn from_base64(s: &str) -> Result<Self, IdentityError> {
        let bytes = b64_decode(s).map_err(|e| IdentityError::Encoding(e.to_string()))?;
        Self::from_protobuf(&bytes)
    }

    pub fn peer_id(&self) -> PeerId {
        peer_id_of(self)
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        verify_signature(self, message, signature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0.to_bytes()))
    }
}

/// A node's own key pair. Key material is zeroized on drop and never
/// serialized by this crate.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    #[zeroize(skip)] // SigningKey zeroizes itself
    sign_key: SigningKey,
}

impl Identity {
    pub fn generate() -> Self {
        Self {
            sign_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// From a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            sign_key: SigningKey::from_bytes(seed),
        }
    }

    /// From a hex-encoded 32-byte seed, as found in configuration.
    pub fn from_hex(seed_hex: &str) -> Result<Self, IdentityError> {
        let mut bytes =
            hex::decode(seed_hex.trim()).map_err(|e| IdentityError::Encoding(e.to_string()))?;
        let seed: Result<[u8; 32], _> = bytes.as_slice().try_into();
        let got = bytes.len();
        bytes.zeroize();
        let mut seed = seed.map_err(|_| IdentityError::InvalidKeyLength { expected: 32, got })?;
        let identity = Self::from_seed(&seed);
        seed.zeroize();
        Ok(identity)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.sign_key.verifying_key())
    }

    pub fn peer_id(&self) -> PeerId {
        peer_id_of(&self.public_key())
    }

    /// Ed25519 signature, 64 bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let signature: Signature = self.sign_key.sign(message);
        signature.to_bytes()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("peer_id", &self.peer_id())
            .finish_non_exhaustive()
    }
}

pub fn peer_id_of(public_key: &PublicKey) -> PeerId {
    PeerId(derive_peer_id(&public_key.to_protobuf()))
}

/// Verify an Ed25519 signature. Any malformed input is simply `false`.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let sig = Signature::from_bytes(&sig_bytes);
    public_key.0.verify_strict(message, &sig).is_ok()
}
