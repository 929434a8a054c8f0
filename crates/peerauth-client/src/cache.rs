//! Per-origin bearer token cache.
//!
//! Each origin owns a slot guarded by an async mutex. Whoever holds the
//! slot lock is the only task allowed to run a handshake for that origin;
//! concurrent callers wait on the lock and then find the fresh token. A slot
//! is only written after a handshake has fully succeeded, so a cancelled
//! handshake leaves it untouched.
//!
//! Expiry is checked lazily on read. The LRU bound caps how many origins
//! are remembered.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tokio::sync::Mutex as AsyncMutex;

use peerauth_crypto::PeerId;
use peerauth_proto::Origin;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    /// Server that issued the token, verified during the handshake.
    pub server: PeerId,
    pub expires_at: u64,
}

impl CachedToken {
    pub fn is_fresh(&self, now_unix: u64) -> bool {
        now_unix <= self.expires_at
    }
}

pub type TokenSlot = Arc<AsyncMutex<Option<CachedToken>>>;

pub struct TokenCache {
    slots: Mutex<LruCache<Origin, TokenSlot>>,
}

impl TokenCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The slot for `origin`, created empty on first use.
    pub fn slot(&self, origin: &Origin) -> TokenSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.get_or_insert(origin.clone(), TokenSlot::default))
    }

    /// Current token for `origin`, fresh or not. Waits for any handshake in
    /// flight for that origin.
    pub async fn get(&self, origin: &Origin) -> Option<CachedToken> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.get(origin).cloned()
        }?;
        let token = slot.lock().await.clone();
        token
    }

    pub async fn remove(&self, origin: &Origin) -> Option<CachedToken> {
        let slot = self.slots.lock().unwrap_or_else(|e| e.into_inner()).pop(origin)?;
        let token = slot.lock().await.take();
        token
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}
