//! `PeerID` authentication scheme parameters.
//!
//! Headers look like `PeerID key="value", other="value"`. Parameter order is
//! preserved on encode; lookups are by exact (lowercase) name.

use std::fmt;

/// Scheme token carried before the auth-params.
pub const AUTH_SCHEME: &str = "PeerID";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthParamsError {
    #[error("header is empty")]
    Empty,
    #[error("unsupported auth scheme: {0}")]
    WrongScheme(String),
    #[error("malformed auth-params: {0}")]
    Syntax(&'static str),
    #[error("duplicate auth-param: {0}")]
    Duplicate(String),
    #[error("missing auth-param: {0}")]
    Missing(&'static str),
}

/// Ordered list of `key="value"` pairs under the `PeerID` scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthParams {
    params: Vec<(String, String)>,
}

impl AuthParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any previous value in place.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Like [`get`](Self::get) but a missing key is an error.
    pub fn require(&self, key: &'static str) -> Result<&str, AuthParamsError> {
        self.get(key).ok_or(AuthParamsError::Missing(key))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as a full header value including the scheme token.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a full header value. The scheme is matched case-insensitively.
    pub fn parse(header: &str) -> Result<Self, AuthParamsError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(AuthParamsError::Empty);
        }

        let (scheme, rest) = match header.find(|c: char| c.is_ascii_whitespace()) {
            Some(idx) => (&header[..idx], &header[idx..]),
            None => (header, ""),
        };
        if !scheme.eq_ignore_ascii_case(AUTH_SCHEME) {
            return Err(AuthParamsError::WrongScheme(scheme.to_string()));
        }

        let mut out = AuthParams::new();
        let mut chars = rest.chars().peekable();

        loop {
            skip_separators(&mut chars);
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(&c) = chars.peek() {
                if c == '=' || c == ',' || c.is_ascii_whitespace() {
                    break;
                }
                key.push(c.to_ascii_lowercase());
                chars.next();
            }
            if key.is_empty() {
                return Err(AuthParamsError::Syntax("empty parameter name"));
            }

            skip_whitespace(&mut chars);
            if chars.next() != Some('=') {
                return Err(AuthParamsError::Syntax("expected '=' after parameter name"));
            }
            skip_whitespace(&mut chars);

            let value = if chars.peek() == Some(&'"') {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => return Err(AuthParamsError::Syntax("dangling escape")),
                        },
                        Some(c) => value.push(c),
                        None => return Err(AuthParamsError::Syntax("unterminated quoted value")),
                    }
                }
                value
            } else {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' || c.is_ascii_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value
            };

            if out.contains(&key) {
                return Err(AuthParamsError::Duplicate(key));
            }
            out.params.push((key, value));

            skip_whitespace(&mut chars);
            match chars.peek() {
                None | Some(',') => {}
                Some(_) => return Err(AuthParamsError::Syntax("expected ',' between parameters")),
            }
        }

        Ok(out)
    }
}

impl fmt::Display for AuthParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(AUTH_SCHEME)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{}=\"", key)?;
            for c in value.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{}", c)?;
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
        chars.next();
    }
}

fn skip_separators(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars
        .peek()
        .is_some_and(|c| *c == ',' || c.is_ascii_whitespace())
    {
        chars.next();
    }
}
