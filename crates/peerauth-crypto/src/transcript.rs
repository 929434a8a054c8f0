//! Canonical signing input.
//!
//! Every signed structure is serialized as a domain-separated list of
//! (tag, len, bytes) records and hashed. Client and server must produce the
//! same bytes for the same logical tuple, so nothing here may depend on
//! field ordering in memory or on a text encoding.

use bytes::{BufMut, BytesMut};
use sha2::{Digest, Sha256};

/// Domain separators, one per signed structure.
pub mod domains {
    pub const CHALLENGE: &str = "peerauth_challenge_v1";
    pub const RESPONSE: &str = "peerauth_response_v1";
    pub const TOKEN: &str = "peerauth_token_v1";
}

/// Field tags.
pub mod tags {
    pub const DOMAIN: u32 = 0;
    pub const NONCE: u32 = 1;
    pub const ISSUER: u32 = 2;
    pub const ISSUED_AT: u32 = 3;
    pub const TTL: u32 = 4;
    pub const ORIGIN: u32 = 5;
    pub const PEER: u32 = 6;
}

#[derive(Clone, Debug, Default)]
pub struct Transcript {
    buf: BytesMut,
}

impl Transcript {
    pub fn new(domain: &'static str) -> Self {
        let mut t = Self {
            buf: BytesMut::with_capacity(128),
        };
        t.append_str(tags::DOMAIN, domain);
        t
    }

    pub fn append_bytes(&mut self, tag: u32, data: &[u8]) -> &mut Self {
        // tag (u32 be) + len (u32 be) + data
        self.buf.put_u32(tag);
        self.buf.put_u32(data.len() as u32);
        self.buf.extend_from_slice(data);
        self
    }

    pub fn append_u64(&mut self, tag: u32, v: u64) -> &mut Self {
        self.buf.put_u32(tag);
        self.buf.put_u32(8);
        self.buf.put_u64(v);
        self
    }

    pub fn append_str(&mut self, tag: u32, s: &str) -> &mut Self {
        self.append_bytes(tag, s.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// SHA-256 of the transcript; this digest is what gets signed.
    pub fn finalize(self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.buf);
        hasher.finalize().into()
    }
}
