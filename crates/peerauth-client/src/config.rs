//! Client configuration, read from `PEERAUTH_CLIENT_*` environment variables.

use std::num::NonZeroUsize;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use peerauth_crypto::Identity;

use crate::cache::DEFAULT_CACHE_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hex Ed25519 seed. Unset means an ephemeral identity.
    pub private_key_hex: Option<String>,
    pub token_cache_capacity: usize,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            private_key_hex: None,
            token_cache_capacity: DEFAULT_CACHE_CAPACITY,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("PEERAUTH_CLIENT_KEY") {
            config.private_key_hex = Some(key);
        }

        if let Ok(cap) = std::env::var("PEERAUTH_CLIENT_CACHE_CAPACITY") {
            config.token_cache_capacity = cap
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("PEERAUTH_CLIENT_CACHE_CAPACITY: {}", e)))?;
        }

        if let Ok(secs) = std::env::var("PEERAUTH_CLIENT_TIMEOUT_SECS") {
            config.request_timeout_secs = secs
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("PEERAUTH_CLIENT_TIMEOUT_SECS: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_cache_capacity == 0 {
            return Err(ConfigError::Invalid("token_cache_capacity must be > 0".to_string()));
        }
        if let Some(key) = &self.private_key_hex {
            Identity::from_hex(key).map_err(|e| ConfigError::Invalid(format!("private key: {}", e)))?;
        }
        Ok(())
    }

    pub fn identity(&self) -> Result<Identity, ConfigError> {
        match &self.private_key_hex {
            Some(key) => Identity::from_hex(key).map_err(|e| ConfigError::Invalid(format!("private key: {}", e))),
            None => {
                let identity = Identity::generate();
                warn!(peer_id = %identity.peer_id(), "no client key configured, using an ephemeral identity");
                Ok(identity)
            }
        }
    }

    pub fn cache_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.token_cache_capacity)
            .ok_or_else(|| ConfigError::Invalid("token_cache_capacity must be > 0".to_string()))
    }

    /// `None` when the timeout is disabled (0).
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
