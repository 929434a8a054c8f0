//! Origin normalization.
//!
//! Client and server must sign and verify over the same origin string, so
//! both derive it here: lowercase `host[:port]` with the scheme's default
//! port elided.

use std::fmt;

use http::uri::{Authority, Uri};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("request has no host")]
    MissingHost,
    #[error("invalid authority: {0}")]
    InvalidAuthority(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Normalized `host[:port]` a request was addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(String);

impl Origin {
    /// Build from parts. `secure` selects which default port is elided.
    pub fn new(host: &str, port: Option<u16>, secure: bool) -> Result<Self, OriginError> {
        if host.is_empty() {
            return Err(OriginError::MissingHost);
        }
        let host = host.to_ascii_lowercase();
        let default_port = if secure { 443 } else { 80 };
        Ok(match port {
            Some(port) if port != default_port => Self(format!("{}:{}", host, port)),
            _ => Self(host),
        })
    }

    /// Origin of an absolute request URI (`http://` or `https://`).
    pub fn from_uri(uri: &Uri) -> Result<Self, OriginError> {
        let secure = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("https") => true,
            Some(s) if s.eq_ignore_ascii_case("http") => false,
            Some(other) => return Err(OriginError::UnsupportedScheme(other.to_string())),
            None => false,
        };
        let authority = uri.authority().ok_or(OriginError::MissingHost)?;
        Self::from_authority(authority, secure)
    }

    /// Origin from a `Host` header value.
    pub fn from_host_header(value: &str, secure: bool) -> Result<Self, OriginError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(OriginError::MissingHost);
        }
        let authority: Authority = value
            .parse()
            .map_err(|_| OriginError::InvalidAuthority(value.to_string()))?;
        Self::from_authority(&authority, secure)
    }

    fn from_authority(authority: &Authority, secure: bool) -> Result<Self, OriginError> {
        if authority.as_str().contains('@') {
            return Err(OriginError::InvalidAuthority(authority.to_string()));
        }
        Self::new(authority.host(), authority.port_u16(), secure)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host part without any port.
    pub fn host(&self) -> &str {
        match self.0.rfind(':') {
            // keep bracketed IPv6 literals intact
            Some(idx) if !self.0[idx..].contains(']') => &self.0[..idx],
            _ => &self.0,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Origin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
