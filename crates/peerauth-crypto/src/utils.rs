//! Encoding and comparison helpers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use constant_time_eq::constant_time_eq;

/// Compare two byte slices in constant time.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

/// base64url without padding; every binary value in a header uses this.
pub fn b64_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn b64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(s.trim_end_matches('='))
}

/// Decode base64url into a fixed-size array.
pub fn b64_decode_array<const N: usize>(s: &str) -> Option<[u8; N]> {
    b64_decode(s).ok()?.as_slice().try_into().ok()
}
