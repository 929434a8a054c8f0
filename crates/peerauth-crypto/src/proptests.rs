use proptest::prelude::*;

use peerauth_proto::Origin;

use crate::challenge::{issue_challenge, verify_challenge, Challenge, ChallengeError};
use crate::identity::Identity;
use crate::response::SignedResponse;
use crate::token::{issue_token, verify_token, BearerToken, TokenError};
use crate::transcript::Transcript;

fn origin() -> Origin {
    Origin::new("peer.example", Some(8443), true).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn transcript_is_deterministic(
        tag1 in any::<u32>(),
        data1 in any::<Vec<u8>>(),
        tag2 in any::<u32>(),
        value in any::<u64>(),
    ) {
        let mut a = Transcript::new("test");
        a.append_bytes(tag1, &data1).append_u64(tag2, value);
        let mut b = Transcript::new("test");
        b.append_bytes(tag1, &data1).append_u64(tag2, value);
        prop_assert_eq!(a.finalize(), b.finalize());
    }

    // A challenge is valid exactly through issued_at + ttl.
    #[test]
    fn challenge_expiry_boundary(
        seed in any::<[u8; 32]>(),
        issued_at in 0u64..1u64 << 40,
        ttl in 0u64..100_000,
        elapsed in 0u64..200_000,
    ) {
        let server = Identity::from_seed(&seed);
        let encoded = issue_challenge(&server, ttl, issued_at).encode();
        let result = verify_challenge(&encoded, &server.public_key(), issued_at + elapsed);
        if elapsed <= ttl {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result, Err(ChallengeError::Expired { expired_at: issued_at + ttl }));
        }
    }

    #[test]
    fn challenge_encoding_preserves_fields(seed in any::<[u8; 32]>(), ttl in any::<u64>(), now in any::<u64>()) {
        let challenge = issue_challenge(&Identity::from_seed(&seed), ttl, now);
        prop_assert_eq!(Challenge::decode(&challenge.encode()).unwrap(), challenge);
    }

    // Changing any signed token field without re-signing is detected.
    #[test]
    fn token_is_tamper_evident(
        seed in any::<[u8; 32]>(),
        client_seed in any::<[u8; 32]>(),
        other_seed in any::<[u8; 32]>(),
        now in 0u64..1u64 << 40,
        ttl in 1u64..100_000,
        delta in 1u64..1_000,
        which in 0usize..3,
    ) {
        prop_assume!(client_seed != other_seed);
        let server = Identity::from_seed(&seed);
        let mut token = issue_token(&server, Identity::from_seed(&client_seed).peer_id(), &origin(), ttl, now);
        match which {
            0 => token.peer_id = Identity::from_seed(&other_seed).peer_id(),
            1 => token.issued_at += delta,
            _ => token.ttl += delta,
        }
        prop_assert_eq!(
            verify_token(&token.encode(), &server.public_key(), &origin(), now),
            Err(TokenError::SignatureInvalid)
        );
    }

    // Encoding neither changes fields nor the verification outcome.
    #[test]
    fn token_encoding_preserves_verdict(
        seed in any::<[u8; 32]>(),
        now in 0u64..1u64 << 40,
        ttl in 0u64..100_000,
        elapsed in 0u64..200_000,
    ) {
        let server = Identity::from_seed(&seed);
        let token = issue_token(&server, Identity::generate().peer_id(), &origin(), ttl, now);
        let decoded = BearerToken::decode(&token.encode()).unwrap();
        prop_assert_eq!(&decoded, &token);
        prop_assert_eq!(
            decoded.verify(&server.public_key(), &origin(), now + elapsed),
            token.verify(&server.public_key(), &origin(), now + elapsed)
        );
    }

    #[test]
    fn signed_response_verifies_only_for_its_origin(
        server_seed in any::<[u8; 32]>(),
        client_seed in any::<[u8; 32]>(),
        port in 1u16..,
    ) {
        let challenge = issue_challenge(&Identity::from_seed(&server_seed), 60, 1_000);
        let response = SignedResponse::sign(&Identity::from_seed(&client_seed), challenge, &origin());
        prop_assert!(response.verify(&origin()).is_ok());

        let other = Origin::new("peer.example", Some(port), true).unwrap();
        prop_assume!(other != origin());
        prop_assert!(response.verify(&other).is_err());
    }
}
