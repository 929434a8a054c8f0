//! Hostname binding predicates.
//!
//! The authenticator consults a predicate over the request's declared origin
//! before doing anything else. It is injected, so deployments and tests can
//! swap it without touching the handshake.

use std::sync::Arc;

use peerauth_proto::Origin;

pub type HostnamePredicate = Arc<dyn Fn(&Origin) -> bool + Send + Sync>;

/// Accept every origin. Suitable for tests and single-tenant deployments.
pub fn allow_any() -> HostnamePredicate {
    Arc::new(|_| true)
}

/// Accept origins matching any of `patterns`.
///
/// A pattern is either an exact host (`api.example.com`), an exact origin
/// with port (`localhost:8080`), or a wildcard `*.example.com` that matches
/// any subdomain but not the apex. An empty list accepts everything.
pub fn allow_list<I, S>(patterns: I) -> HostnamePredicate
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let patterns: Vec<String> = patterns
        .into_iter()
        .map(|p| p.as_ref().trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return allow_any();
    }
    Arc::new(move |origin: &Origin| patterns.iter().any(|p| matches(p, origin)))
}

fn matches(pattern: &str, origin: &Origin) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        let host = origin.host();
        return host.len() > suffix.len() + 1
            && host.ends_with(suffix)
            && host.as_bytes()[host.len() - suffix.len() - 1] == b'.';
    }
    pattern == origin.as_str() || pattern == origin.host()
}
