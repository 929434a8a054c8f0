//! Server half of the handshake.
//!
//! Each request is judged on its own headers. A request without a usable
//! credential gets a fresh challenge; a signed response to one of our
//! challenges gets a bearer token; a valid bearer token goes straight
//! through. Nothing is remembered between requests: challenges and tokens
//! prove themselves by signature and timestamp.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{ACCESS_CONTROL_EXPOSE_HEADERS, AUTHORIZATION, HOST, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use peerauth_crypto::{
    issue_challenge, issue_token, verify_token, Challenge, ChallengeError, Clock, Identity, PeerId,
    ResponseError, SignedResponse, SystemClock, TokenError,
};
use peerauth_proto::{params, AuthParams, AuthParamsError, Origin};

use crate::error::AuthError;
use crate::handler::AuthenticatedHandler;
use crate::hostname::{allow_any, HostnamePredicate};
use crate::metrics::AuthMetrics;

pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 60;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// `Authentication-Info` is not among the `http` crate's named headers.
pub static AUTHENTICATION_INFO: HeaderName = HeaderName::from_static("authentication-info");

static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Request extension set by a TLS-terminating layer in front of the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureConnection;

/// Result of judging one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Invoke the next handler as `peer`. `issued_token` is set when this
    /// request completed a handshake.
    Authenticated {
        peer: PeerId,
        issued_token: Option<String>,
    },
    /// Answer 401 with `challenge`. `reason` is why a presented credential
    /// was refused, `None` when there was none.
    ChallengeRequired {
        challenge: Challenge,
        origin: Origin,
        reason: Option<AuthError>,
    },
    /// Terminal failure, no challenge offered.
    Rejected(AuthError),
}

pub struct ServerAuthenticator {
    identity: Arc<Identity>,
    challenge_ttl: u64,
    token_ttl: u64,
    hostname_predicate: HostnamePredicate,
    require_tls: bool,
    trust_forwarded_proto: bool,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<AuthMetrics>>,
}

impl ServerAuthenticator {
    pub fn new(identity: Arc<Identity>) -> Self {
        Self {
            identity,
            challenge_ttl: DEFAULT_CHALLENGE_TTL_SECS,
            token_ttl: DEFAULT_TOKEN_TTL_SECS,
            hostname_predicate: allow_any(),
            require_tls: false,
            trust_forwarded_proto: false,
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }

    pub fn with_challenge_ttl(mut self, secs: u64) -> Self {
        self.challenge_ttl = secs;
        self
    }

    pub fn with_token_ttl(mut self, secs: u64) -> Self {
        self.token_ttl = secs;
        self
    }

    pub fn with_hostname_predicate(mut self, predicate: HostnamePredicate) -> Self {
        self.hostname_predicate = predicate;
        self
    }

    /// Reject plaintext requests before issuing any challenge.
    pub fn require_tls(mut self, required: bool) -> Self {
        self.require_tls = required;
        self
    }

    /// Treat `X-Forwarded-Proto: https` as proof of an encrypted channel.
    /// Only enable behind a proxy that sets the header itself.
    pub fn trust_forwarded_proto(mut self, trust: bool) -> Self {
        self.trust_forwarded_proto = trust;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn peer_id(&self) -> PeerId {
        self.identity.peer_id()
    }

    /// Judge a request from its head alone.
    pub fn authenticate(&self, parts: &Parts) -> AuthOutcome {
        let secure = self.is_secure(parts);
        if self.require_tls && !secure {
            return self.reject(AuthError::TlsRequired);
        }

        let origin = match request_origin(parts, secure) {
            Ok(origin) => origin,
            Err(e) => return self.reject(e),
        };
        if !(self.hostname_predicate)(&origin) {
            return self.reject(AuthError::HostnameRejected(origin.to_string()));
        }

        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return self.challenge(origin, None);
        };
        let Ok(header) = header.to_str() else {
            return self.reject(AuthError::Malformed("authorization header is not visible ASCII".into()));
        };
        let credential = match AuthParams::parse(header) {
            Ok(p) if !p.is_empty() => p,
            // Someone else's scheme, or a bare `PeerID`: not a credential we know.
            Ok(_) | Err(AuthParamsError::WrongScheme(_)) => return self.challenge(origin, None),
            Err(e) => return self.reject(AuthError::Malformed(e.to_string())),
        };

        let now = self.clock.now_unix();
        if let Some(token) = credential.get(params::BEARER_TOKEN) {
            return self.accept_bearer(token, origin, now);
        }
        if SignedResponse::is_present(&credential) {
            return self.accept_signed_response(&credential, origin, now);
        }
        self.reject(AuthError::Malformed("no recognized PeerID credential".into()))
    }

    /// Authenticate `request` and, on success, pass it to `next` exactly once.
    pub async fn handle<H>(&self, request: Request<Body>, next: &H) -> Response
    where
        H: AuthenticatedHandler + ?Sized,
    {
        let (parts, body) = request.into_parts();
        match self.authenticate(&parts) {
            AuthOutcome::Authenticated { peer, issued_token } => {
                let mut response = next.call(peer, Request::from_parts(parts, body)).await;
                if let Some(token) = issued_token {
                    let mut info = AuthParams::new();
                    info.insert(params::ISSUED_TOKEN, token)
                        .insert(params::CLIENT_PEER_ID, peer.to_hex());
                    if let Ok(value) = HeaderValue::from_str(&info.encode()) {
                        let headers = response.headers_mut();
                        headers.insert(AUTHENTICATION_INFO.clone(), value);
                        headers.insert(
                            ACCESS_CONTROL_EXPOSE_HEADERS,
                            HeaderValue::from_static("authentication-info, www-authenticate"),
                        );
                    }
                }
                response
            }
            AuthOutcome::ChallengeRequired {
                challenge,
                origin,
                reason,
            } => self.challenge_response(&challenge, &origin, reason.as_ref()),
            AuthOutcome::Rejected(err) => err.into_response(),
        }
    }

    /// The 401 carrying `challenge`, our public key and the hostname hint.
    pub fn challenge_response(&self, challenge: &Challenge, origin: &Origin, reason: Option<&AuthError>) -> Response {
        let mut header = challenge.to_params();
        header
            .insert(params::PUBLIC_KEY, self.identity.public_key().to_base64())
            .insert(params::HOSTNAME, origin.as_str());

        let body = match reason {
            Some(reason) => format!("authentication required: {}", reason),
            None => "authentication required".to_string(),
        };
        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        match HeaderValue::from_str(&header.encode()) {
            Ok(value) => {
                let headers = response.headers_mut();
                headers.insert(WWW_AUTHENTICATE, value);
                headers.insert(
                    ACCESS_CONTROL_EXPOSE_HEADERS,
                    HeaderValue::from_static("www-authenticate"),
                );
            }
            // only reachable with a hostname that is not a valid header value
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        }
        response
    }

    fn is_secure(&self, parts: &Parts) -> bool {
        if parts.extensions.get::<SecureConnection>().is_some() {
            return true;
        }
        if parts.uri.scheme_str().is_some_and(|s| s.eq_ignore_ascii_case("https")) {
            return true;
        }
        self.trust_forwarded_proto
            && parts
                .headers
                .get(&X_FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("https"))
    }

    fn accept_bearer(&self, token: &str, origin: Origin, now: u64) -> AuthOutcome {
        match verify_token(token, &self.identity.public_key(), &origin, now) {
            Ok(token) => {
                self.record(|m| m.bearer_tokens_accepted.inc());
                debug!(peer = %token.peer_id, origin = %origin, "bearer token accepted");
                AuthOutcome::Authenticated {
                    peer: token.peer_id,
                    issued_token: None,
                }
            }
            Err(TokenError::Malformed(e)) => self.reject(AuthError::Malformed(e)),
            Err(e) => {
                let reason = match e {
                    TokenError::Expired { .. } => AuthError::TokenExpired,
                    _ => AuthError::SignatureInvalid,
                };
                debug!(origin = %origin, error = %e, "bearer token refused, re-challenging");
                self.fail(origin, reason)
            }
        }
    }

    fn accept_signed_response(&self, credential: &AuthParams, origin: Origin, now: u64) -> AuthOutcome {
        let response = match SignedResponse::from_params(credential) {
            Ok(response) => response,
            Err(e) => return self.reject(AuthError::Malformed(e.to_string())),
        };

        if let Err(e) = response.challenge.verify(&self.identity.public_key(), now) {
            let reason = match e {
                ChallengeError::Expired { .. } => AuthError::ChallengeExpired,
                ChallengeError::SignatureInvalid => AuthError::SignatureInvalid,
                ChallengeError::Malformed(m) => return self.reject(AuthError::Malformed(m)),
            };
            return self.fail(origin, reason);
        }

        if let Err(e) = response.verify(&origin) {
            let reason = match e {
                ResponseError::IdentityMismatch { .. } => AuthError::IdentityMismatch,
                ResponseError::SignatureInvalid => AuthError::SignatureInvalid,
                ResponseError::Malformed(m) => return self.reject(AuthError::Malformed(m)),
            };
            return self.fail(origin, reason);
        }

        let peer = response.client_peer_id;
        let token = issue_token(&self.identity, peer, &origin, self.token_ttl, now);
        self.record(|m| m.handshakes_completed.inc());
        info!(peer = %peer, origin = %origin, expires_at = token.expires_at(), "peer authenticated");
        AuthOutcome::Authenticated {
            peer,
            issued_token: Some(token.encode()),
        }
    }

    fn challenge(&self, origin: Origin, reason: Option<AuthError>) -> AuthOutcome {
        let challenge = issue_challenge(&self.identity, self.challenge_ttl, self.clock.now_unix());
        self.record(|m| m.challenges_issued.inc());
        debug!(origin = %origin, "issuing challenge");
        AuthOutcome::ChallengeRequired {
            challenge,
            origin,
            reason,
        }
    }

    /// A presented credential failed verification: answer with a new challenge.
    fn fail(&self, origin: Origin, reason: AuthError) -> AuthOutcome {
        self.record(|m| m.auth_failures.inc());
        warn!(origin = %origin, reason = reason.kind(), "credential rejected");
        self.challenge(origin, Some(reason))
    }

    fn reject(&self, err: AuthError) -> AuthOutcome {
        self.record(|m| m.rejected_requests.inc());
        warn!(reason = err.kind(), error = %err, "request rejected");
        AuthOutcome::Rejected(err)
    }

    fn record(&self, f: impl FnOnce(&AuthMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

/// The origin a request was addressed to: `Host` header first, then the
/// request target's authority.
pub fn request_origin(parts: &Parts, secure: bool) -> Result<Origin, AuthError> {
    match parts.headers.get(HOST) {
        Some(host) => {
            let host = host
                .to_str()
                .map_err(|_| AuthError::Malformed("host header is not visible ASCII".into()))?;
            Origin::from_host_header(host, secure).map_err(|e| AuthError::Malformed(e.to_string()))
        }
        None => Origin::from_uri(&parts.uri).map_err(|e| AuthError::Malformed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hostname::allow_list;
    use peerauth_crypto::{issue_token, ManualClock};

    const NOW: u64 = 1_700_000_000;

    struct Fixture {
        server: Arc<Identity>,
        clock: Arc<ManualClock>,
        auth: ServerAuthenticator,
    }

    fn fixture() -> Fixture {
        let server = Arc::new(Identity::generate());
        let clock = Arc::new(ManualClock::new(NOW));
        let auth = ServerAuthenticator::new(Arc::clone(&server)).with_clock(clock.clone());
        Fixture { server, clock, auth }
    }

    fn parts(authorization: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/auth").header(HOST, "example.com");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn origin() -> Origin {
        Origin::new("example.com", None, false).unwrap()
    }

    fn challenge_of(outcome: AuthOutcome) -> (Challenge, Option<AuthError>) {
        match outcome {
            AuthOutcome::ChallengeRequired { challenge, reason, .. } => (challenge, reason),
            other => panic!("expected challenge, got {:?}", other),
        }
    }

    fn signed(client: &Identity, challenge: Challenge) -> String {
        SignedResponse::sign(client, challenge, &origin()).to_params().encode()
    }

    #[test]
    fn no_credential_gets_challenge() {
        let f = fixture();
        let (challenge, reason) = challenge_of(f.auth.authenticate(&parts(None)));
        assert_eq!(reason, None);
        assert_eq!(challenge.issuer, f.server.peer_id());
        assert_eq!(challenge.ttl, DEFAULT_CHALLENGE_TTL_SECS);
        assert!(challenge.verify(&f.server.public_key(), NOW).is_ok());
    }

    #[test]
    fn foreign_scheme_gets_challenge() {
        let f = fixture();
        let (_, reason) = challenge_of(f.auth.authenticate(&parts(Some("Basic dXNlcjpwYXNz".into()))));
        assert_eq!(reason, None);
    }

    #[test]
    fn valid_response_issues_token() {
        let f = fixture();
        let client = Identity::generate();
        let (challenge, _) = challenge_of(f.auth.authenticate(&parts(None)));
        match f.auth.authenticate(&parts(Some(signed(&client, challenge)))) {
            AuthOutcome::Authenticated { peer, issued_token } => {
                assert_eq!(peer, client.peer_id());
                let token = verify_token(&issued_token.unwrap(), &f.server.public_key(), &origin(), NOW).unwrap();
                assert_eq!(token.peer_id, client.peer_id());
                assert_eq!(token.ttl, DEFAULT_TOKEN_TTL_SECS);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn bearer_token_passes_without_new_token() {
        let f = fixture();
        let client = Identity::generate();
        let token = issue_token(&f.server, client.peer_id(), &origin(), 3600, NOW).encode();
        let header = format!("PeerID bearer-token=\"{}\"", token);
        match f.auth.authenticate(&parts(Some(header))) {
            AuthOutcome::Authenticated { peer, issued_token } => {
                assert_eq!(peer, client.peer_id());
                assert!(issued_token.is_none());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn expired_token_falls_back_to_challenge() {
        let f = fixture();
        let token = issue_token(&f.server, Identity::generate().peer_id(), &origin(), 3600, NOW).encode();
        f.clock.advance(3601);
        let header = format!("PeerID bearer-token=\"{}\"", token);
        let (_, reason) = challenge_of(f.auth.authenticate(&parts(Some(header))));
        assert_eq!(reason, Some(AuthError::TokenExpired));
    }

    #[test]
    fn token_from_other_server_falls_back_to_challenge() {
        let f = fixture();
        let other = Identity::generate();
        let token = issue_token(&other, Identity::generate().peer_id(), &origin(), 3600, NOW).encode();
        let header = format!("PeerID bearer-token=\"{}\"", token);
        let (_, reason) = challenge_of(f.auth.authenticate(&parts(Some(header))));
        assert_eq!(reason, Some(AuthError::SignatureInvalid));
    }

    #[test]
    fn expired_challenge_gets_fresh_one() {
        let f = fixture();
        let (stale, _) = challenge_of(f.auth.authenticate(&parts(None)));
        f.clock.advance(61);
        let (fresh, reason) =
            challenge_of(f.auth.authenticate(&parts(Some(signed(&Identity::generate(), stale.clone())))));
        assert_eq!(reason, Some(AuthError::ChallengeExpired));
        assert_ne!(fresh.nonce, stale.nonce);
        assert_eq!(fresh.issued_at, NOW + 61);
    }

    #[test]
    fn challenge_from_other_server_is_refused() {
        let f = fixture();
        let foreign = issue_challenge(&Identity::generate(), 60, NOW);
        let (_, reason) = challenge_of(f.auth.authenticate(&parts(Some(signed(&Identity::generate(), foreign)))));
        assert_eq!(reason, Some(AuthError::SignatureInvalid));
    }

    #[test]
    fn claimed_key_must_match_signer() {
        let f = fixture();
        let signer = Identity::generate();
        let claimed = Identity::generate();
        let (challenge, _) = challenge_of(f.auth.authenticate(&parts(None)));

        let mut response = SignedResponse::sign(&signer, challenge.clone(), &origin());
        response.client_key = claimed.public_key();
        let (_, reason) = challenge_of(f.auth.authenticate(&parts(Some(response.to_params().encode()))));
        assert_eq!(reason, Some(AuthError::IdentityMismatch));

        response.client_peer_id = claimed.peer_id();
        let (_, reason) = challenge_of(f.auth.authenticate(&parts(Some(response.to_params().encode()))));
        assert_eq!(reason, Some(AuthError::SignatureInvalid));
    }

    #[test]
    fn response_signed_for_other_origin_is_refused() {
        let f = fixture();
        let client = Identity::generate();
        let (challenge, _) = challenge_of(f.auth.authenticate(&parts(None)));
        let elsewhere = Origin::new("other.example", None, false).unwrap();
        let header = SignedResponse::sign(&client, challenge, &elsewhere).to_params().encode();
        let (_, reason) = challenge_of(f.auth.authenticate(&parts(Some(header))));
        assert_eq!(reason, Some(AuthError::SignatureInvalid));
    }

    #[test]
    fn garbage_credential_is_malformed() {
        let f = fixture();
        for header in ["PeerID bearer-token", "PeerID nonce=\"!!\"", "PeerID foo=\"bar\""] {
            match f.auth.authenticate(&parts(Some(header.to_string()))) {
                AuthOutcome::Rejected(AuthError::Malformed(_)) => {}
                other => panic!("{}: expected malformed, got {:?}", header, other),
            }
        }
    }

    #[test]
    fn hostname_predicate_rejects_without_challenge() {
        let f = fixture();
        let auth = f.auth.with_hostname_predicate(allow_list(["api.example.org"]));
        assert!(matches!(
            auth.authenticate(&parts(None)),
            AuthOutcome::Rejected(AuthError::HostnameRejected(_))
        ));
    }

    #[test]
    fn require_tls_checks_before_challenging() {
        let f = fixture();
        let auth = f.auth.require_tls(true);
        assert!(matches!(
            auth.authenticate(&parts(None)),
            AuthOutcome::Rejected(AuthError::TlsRequired)
        ));

        let mut secure = parts(None);
        secure.extensions.insert(SecureConnection);
        assert!(matches!(
            auth.authenticate(&secure),
            AuthOutcome::ChallengeRequired { .. }
        ));
    }

    #[test]
    fn forwarded_proto_only_when_trusted() {
        let f = fixture();
        let mut forwarded = parts(None);
        forwarded
            .headers
            .insert(&X_FORWARDED_PROTO, HeaderValue::from_static("https"));

        let auth = f.auth.require_tls(true);
        assert!(matches!(auth.authenticate(&forwarded), AuthOutcome::Rejected(_)));
        let auth = auth.trust_forwarded_proto(true);
        assert!(matches!(
            auth.authenticate(&forwarded),
            AuthOutcome::ChallengeRequired { .. }
        ));
    }

    #[test]
    fn origin_prefers_host_header() {
        let (parts, _) = Request::builder()
            .uri("http://internal:8080/auth")
            .header(HOST, "Example.COM:443")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_origin(&parts, true).unwrap().as_str(), "example.com");

        let (parts, _) = Request::builder()
            .uri("http://internal:8080/auth")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_origin(&parts, false).unwrap().as_str(), "internal:8080");
    }
}
