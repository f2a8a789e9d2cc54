//! Collaborators supplied by the hosting runtime.

use crate::adapter::RocksStorage;
use crate::error::StorageError;
use crate::storage::Tid;

/// Per-transaction state the adapter reads and writes.
///
/// The tid is assigned lazily by [`RocksStorage::get_next_tid`] and then
/// cached for the rest of the transaction.
#[derive(Default)]
pub struct Transaction {
    pub(crate) tid: Option<Tid>,
    pub(crate) db_txn: Option<RocksStorage>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a transaction whose id was already allocated.
    pub fn with_tid(tid: Tid) -> Self {
        Self {
            tid: Some(tid),
            db_txn: None,
        }
    }

    pub fn tid(&self) -> Option<Tid> {
        self.tid
    }

    /// Whether an adapter is currently bound via `get_txn`.
    pub fn is_bound(&self) -> bool {
        self.db_txn.is_some()
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("tid", &self.tid)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Serializer for one object being stored.
pub trait Writer: Send + Sync {
    /// Snapshot of the object's persisted state.
    fn serialize(&self) -> Result<Vec<u8>, StorageError>;

    /// Local name inside the parent or owner.
    fn id(&self) -> &str;

    /// Owner oid when the object is an annotation.
    fn of(&self) -> Option<&str> {
        None
    }

    /// Parent oid when the object is a contained child.
    fn parent_id(&self) -> Option<&str> {
        None
    }

    /// Partition hint. Logged, otherwise unused.
    fn part(&self) -> Option<u32> {
        None
    }
}

/// [`Writer`] over an already-serialized state blob.
#[derive(Debug, Clone)]
pub struct ObjectWriter {
    id: String,
    state: Vec<u8>,
    of: Option<String>,
    parent_id: Option<String>,
    part: Option<u32>,
}

impl ObjectWriter {
    pub fn new(id: impl Into<String>, state: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            state: state.into(),
            of: None,
            parent_id: None,
            part: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_of(mut self, owner: impl Into<String>) -> Self {
        self.of = Some(owner.into());
        self
    }

    pub fn with_part(mut self, part: u32) -> Self {
        self.part = Some(part);
        self
    }
}

impl Writer for ObjectWriter {
    fn serialize(&self) -> Result<Vec<u8>, StorageError> {
        Ok(self.state.clone())
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn of(&self) -> Option<&str> {
        self.of.as_deref()
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn part(&self) -> Option<u32> {
        self.part
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_is_unset() {
        let txn = Transaction::new();
        assert_eq!(txn.tid(), None);
        assert!(!txn.is_bound());
        assert_eq!(Transaction::with_tid(9).tid(), Some(9));
    }

    #[test]
    fn test_object_writer_fields() {
        let writer = ObjectWriter::new("doc", b"payload".to_vec())
            .with_parent("folder")
            .with_part(3);
        assert_eq!(writer.id(), "doc");
        assert_eq!(writer.parent_id(), Some("folder"));
        assert_eq!(writer.of(), None);
        assert_eq!(writer.part(), Some(3));
        assert_eq!(writer.serialize().unwrap(), b"payload");
    }
}
