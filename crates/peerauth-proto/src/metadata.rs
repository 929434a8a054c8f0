//! Discovery metadata served at the well-known protocols path.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Where a protocol is mounted on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMetadata {
    pub path: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl ProtocolMetadata {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            optional: false,
        }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

/// Insertion-ordered `protocolId -> metadata` mapping.
///
/// Serializes as a JSON object whose keys appear in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolMap {
    entries: Vec<(String, ProtocolMetadata)>,
}

impl ProtocolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn insert(&mut self, protocol_id: impl Into<String>, metadata: ProtocolMetadata) {
        let protocol_id = protocol_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == protocol_id) {
            Some(entry) => entry.1 = metadata,
            None => self.entries.push((protocol_id, metadata)),
        }
    }

    pub fn get(&self, protocol_id: &str) -> Option<&ProtocolMetadata> {
        self.entries
            .iter()
            .find(|(id, _)| id == protocol_id)
            .map(|(_, m)| m)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProtocolMetadata)> {
        self.entries.iter().map(|(id, m)| (id.as_str(), m))
    }
}

impl Serialize for ProtocolMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, metadata) in &self.entries {
            map.serialize_entry(id, metadata)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProtocolMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = ProtocolMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of protocol id to protocol metadata")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = ProtocolMap::new();
                while let Some((id, metadata)) = access.next_entry::<String, ProtocolMetadata>()? {
                    out.insert(id, metadata);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_insertion_order() {
        let mut map = ProtocolMap::new();
        map.insert("/z/1", ProtocolMetadata::new("/z"));
        map.insert("/a/1", ProtocolMetadata::new("/a").optional(true));

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"/z/1":{"path":"/z"},"/a/1":{"path":"/a","optional":true}}"#
        );
    }

    #[test]
    fn replacement_keeps_position() {
        let mut map = ProtocolMap::new();
        map.insert("first", ProtocolMetadata::new("/1"));
        map.insert("second", ProtocolMetadata::new("/2"));
        map.insert("first", ProtocolMetadata::new("/one"));

        let ids: Vec<_> = map.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(map.get("first").unwrap().path, "/one");
    }

    #[test]
    fn deserializes_missing_optional_as_false() {
        let map: ProtocolMap = serde_json::from_str(r#"{"auth/1":{"path":"/auth"}}"#).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("auth/1"), Some(&ProtocolMetadata::new("/auth")));
    }
}
