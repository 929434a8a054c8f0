use proptest::prelude::*;

use peerauth_proto::Origin;

use crate::hostname::allow_list;

fn origin(host: &str, port: Option<u16>) -> Origin {
    Origin::new(host, port, false).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // `*.suffix` admits every subdomain but never the apex or a host that
    // merely ends with the same characters.
    #[test]
    fn wildcard_only_matches_subdomains(
        label in "[a-z][a-z0-9-]{0,10}",
        suffix in "[a-z][a-z0-9]{0,8}\\.[a-z]{2,4}",
        port in proptest::option::of(1024u16..),
    ) {
        let allowed = allow_list([format!("*.{}", suffix)]);
        let subdomain = format!("{}.{}", label, suffix);
        let lookalike = format!("{}{}", label, suffix);
        prop_assert!(allowed(&origin(&subdomain, port)));
        prop_assert!(!allowed(&origin(&suffix, port)));
        prop_assert!(!allowed(&origin(&lookalike, port)));
    }

    #[test]
    fn exact_host_matches_any_port_and_case(
        host in "[a-z][a-z0-9]{0,10}\\.[a-z]{2,4}",
        port in proptest::option::of(1024u16..),
    ) {
        let allowed = allow_list([host.to_ascii_uppercase()]);
        prop_assert!(allowed(&origin(&host, port)));
        let prefixed = format!("x{}", host);
        prop_assert!(!allowed(&origin(&prefixed, port)));
    }

    #[test]
    fn host_with_port_pins_the_port(
        host in "[a-z][a-z0-9]{0,10}",
        port in 1024u16..u16::MAX,
    ) {
        let allowed = allow_list([format!("{}:{}", host, port)]);
        prop_assert!(allowed(&origin(&host, Some(port))));
        prop_assert!(!allowed(&origin(&host, Some(port + 1))));
    }
}
