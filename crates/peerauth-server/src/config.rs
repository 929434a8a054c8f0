//! Configuration management

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use peerauth_crypto::Identity;
use peerauth_proto::ProtocolMetadata;

use crate::authenticator::{DEFAULT_CHALLENGE_TTL_SECS, DEFAULT_TOKEN_TTL_SECS};
use crate::hostname::{allow_list, HostnamePredicate};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Extra protocol advertised at the discovery path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub optional: bool,
}

impl ProtocolEntry {
    pub fn metadata(&self) -> ProtocolMetadata {
        ProtocolMetadata::new(self.path.clone()).optional(self.optional)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    /// Hex Ed25519 seed. Unset means a fresh identity on every start.
    pub private_key_hex: Option<String>,

    pub challenge_ttl_secs: u64,
    pub token_ttl_secs: u64,

    pub require_tls: bool,
    pub trust_forwarded_proto: bool,
    /// Exact hosts, `host:port` origins or `*.suffix` wildcards. Empty accepts any.
    pub allowed_hostnames: Vec<String>,

    pub protected_path: String,
    pub protocols: Vec<ProtocolEntry>,

    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            private_key_hex: None,
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            require_tls: false,
            trust_forwarded_proto: false,
            allowed_hostnames: Vec::new(),
            protected_path: "/auth".to_string(),
            protocols: Vec::new(),
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Load from the TOML file named by `PEERAUTH_CONFIG` (if any), apply
    /// `PEERAUTH_*` environment overrides, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("PEERAUTH_CONFIG") {
            Ok(path) => Self::from_toml(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = std::env::var("PEERAUTH_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid bind_addr: {}", e)))?;
        }

        if let Ok(key) = std::env::var("PEERAUTH_PRIVATE_KEY") {
            self.private_key_hex = Some(key);
        }

        if let Ok(ttl) = std::env::var("PEERAUTH_CHALLENGE_TTL_SECS") {
            self.challenge_ttl_secs = parse_env("PEERAUTH_CHALLENGE_TTL_SECS", &ttl)?;
        }

        if let Ok(ttl) = std::env::var("PEERAUTH_TOKEN_TTL_SECS") {
            self.token_ttl_secs = parse_env("PEERAUTH_TOKEN_TTL_SECS", &ttl)?;
        }

        if let Ok(flag) = std::env::var("PEERAUTH_REQUIRE_TLS") {
            self.require_tls = parse_env("PEERAUTH_REQUIRE_TLS", &flag)?;
        }

        if let Ok(flag) = std::env::var("PEERAUTH_TRUST_FORWARDED_PROTO") {
            self.trust_forwarded_proto = parse_env("PEERAUTH_TRUST_FORWARDED_PROTO", &flag)?;
        }

        if let Ok(hosts) = std::env::var("PEERAUTH_ALLOWED_HOSTNAMES") {
            self.allowed_hostnames = hosts
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(path) = std::env::var("PEERAUTH_PROTECTED_PATH") {
            self.protected_path = path;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.challenge_ttl_secs == 0 {
            return Err(ConfigError::Invalid("challenge_ttl_secs must be > 0".to_string()));
        }

        if self.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("token_ttl_secs must be > 0".to_string()));
        }

        if !self.protected_path.starts_with('/') {
            return Err(ConfigError::Invalid("protected_path must start with '/'".to_string()));
        }

        for entry in &self.protocols {
            if entry.id.is_empty() || !entry.path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "protocol entry {:?} needs an id and an absolute path",
                    entry.id
                )));
            }
        }

        if let Some(key) = &self.private_key_hex {
            Identity::from_hex(key)
                .map_err(|e| ConfigError::Invalid(format!("private_key_hex: {}", e)))?;
        }

        Ok(())
    }

    /// The server identity, or an ephemeral one when no key is configured.
    pub fn identity(&self) -> Result<Identity, ConfigError> {
        match &self.private_key_hex {
            Some(key) => Identity::from_hex(key)
                .map_err(|e| ConfigError::Invalid(format!("private_key_hex: {}", e))),
            None => {
                let identity = Identity::generate();
                warn!(
                    peer_id = %identity.peer_id(),
                    "no private key configured, using an ephemeral identity; issued tokens will not survive a restart"
                );
                Ok(identity)
            }
        }
    }

    pub fn hostname_predicate(&self) -> HostnamePredicate {
        allow_list(&self.allowed_hostnames)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))
}
