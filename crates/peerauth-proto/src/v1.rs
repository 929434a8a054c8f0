//! Protobuf messages.
//!
//! Public keys are carried as a protobuf `PublicKeyV1`; the PeerId is the
//! digest of exactly these encoded bytes, so the encoding must stay stable.

use prost::Message;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum KeyTypeV1 {
    Unspecified = 0,
    Ed25519 = 1,
}

#[derive(Clone, PartialEq, Message)]
pub struct PublicKeyV1 {
    #[prost(enumeration = "KeyTypeV1", tag = "1")]
    pub key_type: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub key_bytes: Vec<u8>,
}

impl PublicKeyV1 {
    pub fn ed25519(key_bytes: [u8; 32]) -> Self {
        Self {
            key_type: KeyTypeV1::Ed25519.into(),
            key_bytes: key_bytes.to_vec(),
        }
    }

    /// Canonical protobuf bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_key_encoding_is_stable() {
        let key = PublicKeyV1::ed25519([7u8; 32]);
        let bytes = key.to_bytes();
        // field 1 varint, field 2 length-delimited
        assert_eq!(&bytes[..4], &[0x08, 0x01, 0x12, 0x20]);
        assert_eq!(bytes.len(), 36);
        assert_eq!(PublicKeyV1::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn key_type_accessor_reads_enum() {
        let key = PublicKeyV1::ed25519([1u8; 32]);
        assert_eq!(key.key_type(), KeyTypeV1::Ed25519);
    }
}
