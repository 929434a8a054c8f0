#![forbid(unsafe_code)]

pub mod hash;
pub mod transcript;
pub mod identity;
pub mod clock;
pub mod utils;

pub mod challenge;
pub mod response;
pub mod token;

#[cfg(test)]
mod proptests;

pub use challenge::{issue_challenge, verify_challenge, Challenge, ChallengeError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{peer_id_of, verify_signature, Identity, IdentityError, PeerId, PublicKey};
pub use response::{ResponseError, SignedResponse};
pub use token::{issue_token, verify_token, BearerToken, TokenError};
