//! Transaction-id counter.

use rocksdb::WriteOptions;
use std::sync::Mutex;

use super::keys::StorageKey;
use super::merge::{parse_counter, MergeRequest};
use super::record::Tid;
use super::rocks::Db;
use crate::error::StorageError;

/// Process-wide transaction-id counter stored under `__counter_id`.
///
/// [`increment_and_read`](TidCounter::increment_and_read) is a merge of
/// `Increment(1)` followed by a read of the same key. The two engine calls
/// are serialized by a mutex, so ids are unique and strictly increasing for
/// every caller sharing this counter. Nothing serializes against another
/// process opening the same directory (e.g. a secondary instance); such a
/// writer could interleave between the merge and the read and the two sides
/// would then observe the same id.
pub struct TidCounter {
    key: Vec<u8>,
    issue: Mutex<()>,
}

impl Default for TidCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TidCounter {
    pub fn new() -> Self {
        Self {
            key: StorageKey::TidCounter.to_bytes(),
            issue: Mutex::new(()),
        }
    }

    /// Bump the counter by one and return the new value.
    pub fn increment_and_read(
        &self,
        db: &Db,
        write_opts: &WriteOptions,
    ) -> Result<Tid, StorageError> {
        // guard holds no data, a poisoned lock is still usable
        let _guard = self.issue.lock().unwrap_or_else(|e| e.into_inner());

        db.merge_opt(&self.key, MergeRequest::Increment(1).encode()?, write_opts)?;
        match db.get(&self.key)? {
            Some(bytes) => parse_counter(&bytes),
            None => Err(StorageError::CounterCorrupt(
                "counter missing right after increment".into(),
            )),
        }
    }

    /// Last issued value, or `None` on a fresh store.
    pub fn current(&self, db: &Db) -> Result<Option<Tid>, StorageError> {
        db.get(&self.key)?.map(|bytes| parse_counter(&bytes)).transpose()
    }
}
