//! Key namespace.
//!
//! Every entity lives in the default column family under a fixed ASCII
//! prefix. The layout is part of the on-disk format:
//!
//! | Entity                  | Key                     |
//! |-------------------------|-------------------------|
//! | Object record           | `object-<oid>`          |
//! | Child index (parent)    | `keys-<parent oid>`     |
//! | Annotation index (owner)| `of-<owner oid>`        |
//! | Transaction counter     | `__counter_id`          |
//!
//! Oids are UTF-8 encoded after the prefix.

use std::fmt;

use crate::error::StorageError;

pub const OBJECT_PREFIX: &str = "object-";
pub const CHILDREN_PREFIX: &str = "keys-";
pub const ANNOTATIONS_PREFIX: &str = "of-";
pub const TID_COUNTER_KEY: &str = "__counter_id";

/// Prefixes an oid may not start with.
const RESERVED_PREFIXES: &[&str] = &[
    OBJECT_PREFIX,
    CHILDREN_PREFIX,
    ANNOTATIONS_PREFIX,
    "__counter_",
];

/// Validated object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    /// Validate an oid supplied by the caller.
    ///
    /// Rejects the empty string and anything starting with a reserved prefix.
    pub fn parse(raw: impl Into<String>) -> Result<Self, StorageError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(StorageError::InvalidOid {
                oid: raw,
                reason: "oid must not be empty",
            });
        }
        if RESERVED_PREFIXES.iter().any(|p| raw.starts_with(p)) {
            return Err(StorageError::InvalidOid {
                oid: raw,
                reason: "oid starts with a reserved key prefix",
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which per-object index a lookup goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Parent/child containment (`keys-`).
    Children,
    /// Owner/annotation relation (`of-`).
    Annotations,
}

impl IndexKind {
    /// Human-readable name used in errors and logs.
    pub fn label(self) -> &'static str {
        match self {
            IndexKind::Children => "child",
            IndexKind::Annotations => "annotation",
        }
    }

    pub fn key(self, owner: &Oid) -> StorageKey {
        match self {
            IndexKind::Children => StorageKey::Children(owner.clone()),
            IndexKind::Annotations => StorageKey::Annotations(owner.clone()),
        }
    }
}

/// A fully addressed engine key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKey {
    Object(Oid),
    Children(Oid),
    Annotations(Oid),
    TidCounter,
}

impl StorageKey {
    /// Encode to the raw engine key.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (prefix, oid) = match self {
            StorageKey::Object(oid) => (OBJECT_PREFIX, oid.as_str()),
            StorageKey::Children(oid) => (CHILDREN_PREFIX, oid.as_str()),
            StorageKey::Annotations(oid) => (ANNOTATIONS_PREFIX, oid.as_str()),
            StorageKey::TidCounter => return TID_COUNTER_KEY.as_bytes().to_vec(),
        };
        let mut key = Vec::with_capacity(prefix.len() + oid.len());
        key.extend_from_slice(prefix.as_bytes());
        key.extend_from_slice(oid.as_bytes());
        key
    }

    /// Decode a raw engine key. Returns `None` for keys outside the namespace.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw == TID_COUNTER_KEY.as_bytes() {
            return Some(StorageKey::TidCounter);
        }
        let text = std::str::from_utf8(raw).ok()?;
        if let Some(oid) = text.strip_prefix(OBJECT_PREFIX) {
            return Oid::parse(oid).ok().map(StorageKey::Object);
        }
        if let Some(oid) = text.strip_prefix(CHILDREN_PREFIX) {
            return Oid::parse(oid).ok().map(StorageKey::Children);
        }
        if let Some(oid) = text.strip_prefix(ANNOTATIONS_PREFIX) {
            return Oid::parse(oid).ok().map(StorageKey::Annotations);
        }
        None
    }
}
