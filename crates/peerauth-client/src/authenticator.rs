//! Client half of the handshake.
//!
//! `authenticated_request` tries a cached bearer token first. Without one, or
//! when the server refuses it, the caller takes the origin's slot lock and
//! runs at most one handshake: obtain a challenge (from the refusal, or by
//! sending the request bare), verify the server's identity, sign, resend,
//! and cache the issued token. Only a 401 carrying a `PeerID` challenge is a
//! refusal; every other response belongs to the caller.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use tracing::{debug, info, warn};

use peerauth_crypto::{
    verify_token, Challenge, ChallengeError, Clock, Identity, PeerId, PublicKey, SignedResponse, SystemClock,
};
use peerauth_proto::{params, AuthParams, Origin, AUTH_SCHEME};

use crate::cache::{CachedToken, TokenCache, TokenSlot};
use crate::error::ClientError;
use crate::transport::{clone_request, HttpTransport, TransportError};

static AUTHENTICATION_INFO: HeaderName = HeaderName::from_static("authentication-info");

pub type PeerVerifier = Arc<dyn Fn(&PeerId) -> bool + Send + Sync>;

/// Final response together with the server identity it was verified against.
#[derive(Debug)]
pub struct AuthenticatedResponse {
    pub server: PeerId,
    pub response: Response<Bytes>,
}

pub struct ClientAuthenticator<T> {
    identity: Arc<Identity>,
    transport: T,
    cache: TokenCache,
    clock: Arc<dyn Clock>,
    peer_verifier: Option<PeerVerifier>,
}

impl<T: HttpTransport> ClientAuthenticator<T> {
    pub fn new(identity: Arc<Identity>, transport: T) -> Self {
        Self {
            identity,
            transport,
            cache: TokenCache::default(),
            clock: Arc::new(SystemClock),
            peer_verifier: None,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.cache = TokenCache::new(capacity);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Only complete handshakes with servers the verifier accepts.
    pub fn with_peer_verifier(mut self, verifier: PeerVerifier) -> Self {
        self.peer_verifier = Some(verifier);
        self
    }

    pub fn peer_id(&self) -> PeerId {
        self.identity.peer_id()
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub async fn authenticated_request(&self, request: Request<Bytes>) -> Result<AuthenticatedResponse, ClientError> {
        let origin = Origin::from_uri(request.uri())?;
        let slot = self.cache.slot(&origin);

        // A response counts as a refusal only when it carries a fresh
        // challenge; any other status belongs to the downstream handler.
        let mut refused = None;
        let mut challenge = None;
        if let Some(cached) = self.fresh_token(&slot).await {
            let response = self.transport.send(with_bearer(&request, &cached.token)?).await?;
            match peer_id_challenge(&response).transpose()? {
                None => {
                    return Ok(AuthenticatedResponse {
                        server: cached.server,
                        response,
                    })
                }
                Some(params) => {
                    debug!(origin = %origin, "cached token refused");
                    refused = Some(cached.token);
                    challenge = Some(params);
                }
            }
        }

        // Held until this call's handshake is over, so concurrent callers
        // for the same origin wait for its token instead of starting their own.
        let mut guard = slot.lock().await;
        if refused.is_some() && guard.as_ref().map(|c| &c.token) == refused.as_ref() {
            *guard = None;
        }

        let now = self.clock.now_unix();
        if let Some(cached) = guard.clone().filter(|c| c.is_fresh(now)) {
            // Refreshed by another task while we waited.
            let response = self.transport.send(with_bearer(&request, &cached.token)?).await?;
            match peer_id_challenge(&response).transpose()? {
                None => {
                    return Ok(AuthenticatedResponse {
                        server: cached.server,
                        response,
                    })
                }
                Some(params) => {
                    *guard = None;
                    challenge = Some(params);
                }
            }
        }

        let (response, token) = self.handshake(&origin, &request, challenge).await?;
        if let Some(token) = token {
            *guard = Some(token);
        }
        Ok(response)
    }

    async fn fresh_token(&self, slot: &TokenSlot) -> Option<CachedToken> {
        let now = self.clock.now_unix();
        slot.lock().await.clone().filter(|c| c.is_fresh(now))
    }

    /// One full challenge/response exchange, starting from `challenge` when a
    /// refused bearer request already delivered one. Returns the token to
    /// cache, if the server issued a valid one.
    async fn handshake(
        &self,
        origin: &Origin,
        request: &Request<Bytes>,
        challenge: Option<AuthParams>,
    ) -> Result<(AuthenticatedResponse, Option<CachedToken>), ClientError> {
        let challenge_params = match challenge {
            Some(params) => params,
            None => {
                let first = self.transport.send(clone_request(request)).await?;
                peer_id_challenge(&first).ok_or(ClientError::NoChallenge {
                    status: first.status(),
                })??
            }
        };

        let challenge = Challenge::from_params(&challenge_params).map_err(|e| ClientError::Malformed(e.to_string()))?;
        let server_key = PublicKey::from_base64(challenge_params.require(params::PUBLIC_KEY)?)
            .map_err(|e| ClientError::Malformed(format!("{}: {}", params::PUBLIC_KEY, e)))?;

        let server = server_key.peer_id();
        if !server.ct_eq(&challenge.issuer) {
            return Err(ClientError::IdentityMismatch {
                claimed: challenge.issuer,
                derived: server,
            });
        }
        match challenge.verify(&server_key, self.clock.now_unix()) {
            // Freshness is the server's call; it judges against its own clock.
            Ok(()) | Err(ChallengeError::Expired { .. }) => {}
            Err(_) => return Err(ClientError::SignatureInvalid),
        }
        if let Some(verifier) = &self.peer_verifier {
            if !verifier(&server) {
                return Err(ClientError::UnexpectedPeer(server));
            }
        }
        debug!(origin = %origin, server = %server, "server challenge verified, signing");

        let credential = SignedResponse::sign(&self.identity, challenge, origin).to_params().encode();
        let response = self.transport.send(with_authorization(request, &credential)?).await?;

        if peer_id_challenge(&response).is_some() {
            return Err(ClientError::AuthenticationRejected {
                status: response.status(),
                message: String::from_utf8_lossy(response.body()).into_owned(),
            });
        }

        let token = self.issued_token(&response, &server_key, origin);
        match &token {
            Some(t) => info!(origin = %origin, server = %server, expires_at = t.expires_at, "authenticated"),
            None => debug!(origin = %origin, status = %response.status(), "no token issued"),
        }
        Ok((AuthenticatedResponse { server, response }, token))
    }

    fn issued_token(&self, response: &Response<Bytes>, server_key: &PublicKey, origin: &Origin) -> Option<CachedToken> {
        let header = response.headers().get(&AUTHENTICATION_INFO)?.to_str().ok()?;
        let info = AuthParams::parse(header).ok()?;
        let encoded = info.get(params::ISSUED_TOKEN)?;
        match verify_token(encoded, server_key, origin, self.clock.now_unix()) {
            Ok(token) => Some(CachedToken {
                token: encoded.to_string(),
                server: server_key.peer_id(),
                expires_at: token.expires_at(),
            }),
            Err(e) => {
                warn!(origin = %origin, error = %e, "ignoring issued token");
                None
            }
        }
    }
}

/// The parsed `PeerID` challenge of a 401, if it carries one.
fn peer_id_challenge(response: &Response<Bytes>) -> Option<Result<AuthParams, ClientError>> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return None;
    }
    response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| is_peer_id_scheme(v))
        .map(|v| AuthParams::parse(v).map_err(ClientError::from))
}

/// Whether the header's scheme token is exactly `PeerID`.
fn is_peer_id_scheme(value: &str) -> bool {
    let value = value.trim_start();
    let scheme = value.split(|c: char| c.is_ascii_whitespace()).next().unwrap_or_default();
    scheme.eq_ignore_ascii_case(AUTH_SCHEME)
}

fn with_authorization(request: &Request<Bytes>, value: &str) -> Result<Request<Bytes>, TransportError> {
    let value = HeaderValue::from_str(value).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    let mut request = clone_request(request);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

fn with_bearer(request: &Request<Bytes>, token: &str) -> Result<Request<Bytes>, TransportError> {
    let mut p = AuthParams::new();
    p.insert(params::BEARER_TOKEN, token);
    with_authorization(request, &p.encode())
}
