use proptest::prelude::*;

use crate::auth_params::AuthParams;
use crate::origin::Origin;
use crate::v1::PublicKeyV1;

prop_compose! {
    fn any_params()(
        entries in prop::collection::vec(("[a-z][a-z-]{0,15}", "[A-Za-z0-9_\\-\\.:\"\\\\ ]{0,40}"), 0..8)
    ) -> AuthParams {
        let mut params = AuthParams::new();
        for (k, v) in entries {
            params.insert(&k, v);
        }
        params
    }
}

proptest! {
    // Whatever we encode, we parse back to the same ordered parameters.
    #[test]
    fn auth_params_parse_inverts_encode(params in any_params()) {
        let parsed = AuthParams::parse(&params.encode()).unwrap();
        prop_assert_eq!(parsed, params);
    }

    // Parsing arbitrary input never panics.
    #[test]
    fn auth_params_parse_is_total(input in ".{0,128}") {
        let _ = AuthParams::parse(&input);
    }

    #[test]
    fn origin_is_lowercase_and_port_stable(
        host in "[A-Za-z][A-Za-z0-9]{0,10}(\\.[A-Za-z]{2,5})?",
        port in prop::option::of(1u16..),
        secure in any::<bool>(),
    ) {
        let origin = Origin::new(&host, port, secure).unwrap();
        prop_assert_eq!(origin.host(), host.to_ascii_lowercase());

        let header = match port {
            Some(p) => format!("{}:{}", host, p),
            None => host.clone(),
        };
        prop_assert_eq!(Origin::from_host_header(&header, secure).unwrap(), origin);
    }

    #[test]
    fn public_key_encoding_round_trips(key in any::<[u8; 32]>()) {
        let encoded = PublicKeyV1::ed25519(key).to_bytes();
        let decoded = PublicKeyV1::from_bytes(&encoded).unwrap();
        prop_assert_eq!(decoded.key_bytes, key.to_vec());
    }
}
