//! Object records and index containers, and their bincode encoding.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Transaction identifier.
pub type Tid = u64;

/// One persisted object, stored under `object-<oid>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Oid the record was stored under
    pub zoid: String,
    /// Transaction that wrote it (unset if the writer had no tid yet)
    pub tid: Option<Tid>,
    /// Local name of the object inside its parent or owner
    pub id: String,
    /// Opaque state snapshot produced by the writer
    pub state: Vec<u8>,
}

impl ObjectRecord {
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        decode(bytes)
    }
}

/// Value stored under an index key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    /// Ordered sequence, grown by appending.
    Sequence(Vec<String>),
    /// Local name -> oid, in first-insertion order.
    Mapping(IndexMap<String, String>),
}

impl Container {
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        decode(bytes)
    }

    /// Number of elements or entries.
    pub fn len(&self) -> usize {
        match self {
            Container::Sequence(items) => items.len(),
            Container::Mapping(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapping keys, or sequence elements, in stored order.
    pub fn names(&self) -> Vec<String> {
        match self {
            Container::Sequence(items) => items.clone(),
            Container::Mapping(entries) => entries.keys().cloned().collect(),
        }
    }

    /// Value for `name` if this is a mapping that holds it.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Container::Sequence(_) => None,
            Container::Mapping(entries) => entries.get(name).map(String::as_str),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Container::Sequence(items) => items.iter().any(|i| i == name),
            Container::Mapping(entries) => entries.contains_key(name),
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StorageError::Encode(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| StorageError::Decode(e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_encoding() {
        let record = ObjectRecord {
            zoid: "a".into(),
            tid: Some(7),
            id: "child-a".into(),
            state: vec![1, 2, 3, 255],
        };
        let bytes = record.encode().unwrap();
        assert_eq!(ObjectRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = ObjectRecord::decode(b"\xff").unwrap_err();
        assert!(matches!(err, StorageError::Decode(_)));
    }

    #[test]
    fn test_mapping_keeps_insertion_order() {
        let mut entries = IndexMap::new();
        entries.insert("zeta".to_string(), "z".to_string());
        entries.insert("alpha".to_string(), "a".to_string());
        entries.insert("mid".to_string(), "m".to_string());
        let container = Container::Mapping(entries);

        let decoded = Container::decode(&container.encode().unwrap()).unwrap();
        assert_eq!(decoded.names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(decoded.get("alpha"), Some("a"));
        assert_eq!(decoded.len(), 3);
    }

    #[test]
    fn test_sequence_lookups() {
        let container = Container::Sequence(vec!["a".into(), "b".into()]);
        assert!(container.contains("b"));
        assert!(!container.contains("c"));
        assert_eq!(container.get("a"), None);
        assert!(!container.is_empty());
    }
}
