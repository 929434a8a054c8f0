//! Well-known protocol registry.
//!
//! Filled at startup, then shared read-only behind an `Arc`. Serving it is
//! the discovery endpoint's only job.

use peerauth_proto::{ProtocolMap, ProtocolMetadata};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct WellKnownRegistry {
    protocols: ProtocolMap,
}

impl WellKnownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise `protocol_id` at `metadata.path`. Registering the same id
    /// again replaces the metadata but keeps its position.
    pub fn register(&mut self, protocol_id: impl Into<String>, metadata: ProtocolMetadata) -> &mut Self {
        let protocol_id = protocol_id.into();
        debug!(protocol = %protocol_id, path = %metadata.path, "registering protocol");
        self.protocols.insert(protocol_id, metadata);
        self
    }

    pub fn resolve(&self) -> &ProtocolMap {
        &self.protocols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_reflects_registrations_in_order() {
        let mut registry = WellKnownRegistry::new();
        registry
            .register("b/1", ProtocolMetadata::new("/b"))
            .register("a/1", ProtocolMetadata::new("/a"));
        let ids: Vec<_> = registry.resolve().iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, ["b/1", "a/1"]);
    }

    #[test]
    fn last_write_wins() {
        let mut registry = WellKnownRegistry::new();
        registry
            .register("auth/1", ProtocolMetadata::new("/old"))
            .register("other/1", ProtocolMetadata::new("/other"))
            .register("auth/1", ProtocolMetadata::new("/auth").optional(true));
        let map = registry.resolve();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("auth/1"), Some(&ProtocolMetadata::new("/auth").optional(true)));
        assert_eq!(map.iter().next().map(|(id, _)| id), Some("auth/1"));
    }

    #[test]
    fn serializes_as_plain_mapping() {
        let mut registry = WellKnownRegistry::new();
        registry.register("auth/1", ProtocolMetadata::new("/auth"));
        let json = serde_json::to_value(registry.resolve()).unwrap();
        assert_eq!(json, serde_json::json!({ "auth/1": { "path": "/auth" } }));
    }
}
