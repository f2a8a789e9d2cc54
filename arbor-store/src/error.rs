//! Error type shared by every layer of the store.

use thiserror::Error;

/// Storage errors.
///
/// Engine failures are carried as-is in [`StorageError::Engine`]; nothing in
/// this crate retries them.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object record exists for the oid.
    #[error("Object not found: {oid}")]
    NotFound { oid: String },

    /// A child or annotation index has no entry for `id`.
    ///
    /// Raised both when the index itself is absent and when it lacks the id.
    #[error("No {index} entry '{id}' under {owner}")]
    EntryNotFound {
        index: &'static str,
        owner: String,
        id: String,
    },

    /// The operation is not provided by this store.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The oid is empty or collides with a reserved key prefix.
    #[error("Invalid oid '{oid}': {reason}")]
    InvalidOid { oid: String, reason: &'static str },

    /// A write was attempted on a store opened read-only.
    #[error("Store is read-only")]
    ReadOnly,

    /// RocksDB internal error
    #[error("Database error: {0}")]
    Engine(#[from] rocksdb::Error),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Encode(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Decode(String),

    /// The transaction counter holds something other than decimal ASCII.
    #[error("Transaction counter corrupt: {0}")]
    CounterCorrupt(String),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A blocking engine task panicked or was cancelled.
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    /// Returns `true` for the "record or entry is absent" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::EntryNotFound { .. }
        )
    }
}
