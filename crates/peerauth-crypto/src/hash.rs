use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// PeerId derivation: id = sha256(protobuf-encoded public key).
pub fn derive_peer_id(encoded_public_key: &[u8]) -> [u8; 32] {
    sha256(encoded_public_key)
}
