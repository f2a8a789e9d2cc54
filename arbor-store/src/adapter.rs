//! Storage adapter consumed by the document-database runtime.
//!
//! [`RocksStorage`] is the async face of [`ObjectStore`]. Each operation
//! validates its oids, then runs its engine calls on tokio's blocking pool.
//! There is no staging: stores, deletes and index merges are visible as soon
//! as they return, `commit` only hands back the transaction id and `abort`
//! only unbinds the adapter from the transaction.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::storage::{IndexKind, ObjectRecord, ObjectStore, Oid, Tid};
use crate::txn::{Transaction, Writer};

/// Oid of the database root object.
pub const ROOT_ID: &str = "00000000000000000000000000000000";

struct Shared {
    store: ObjectStore,
    /// Highest tid handed out by `commit`
    last_committed: AtomicU64,
}

/// Async storage adapter over one RocksDB database.
///
/// Cheap to clone; clones share the engine.
#[derive(Clone)]
pub struct RocksStorage {
    inner: Arc<Shared>,
}

impl RocksStorage {
    /// Open the engine described by `config`.
    pub fn new(config: StoreConfig) -> Result<Self, StorageError> {
        let store = ObjectStore::open(config)?;
        Ok(Self {
            inner: Arc::new(Shared {
                store,
                last_committed: AtomicU64::new(0),
            }),
        })
    }

    /// Run a blocking engine operation off the async executor.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&ObjectStore) -> Result<T, StorageError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner.store)).await?
    }

    // ─── Lifecycle ────────────────────────────────────────────────────

    pub async fn initialize(&self) -> Result<(), StorageError> {
        log::info!("Object store ready at {}", self.path().display());
        Ok(())
    }

    pub async fn finalize(&self) -> Result<(), StorageError> {
        log::info!("Finalizing object store at {}", self.path().display());
        Ok(())
    }

    /// Hand out a connection handle. All handles share one engine.
    pub async fn open(&self) -> Result<Self, StorageError> {
        Ok(self.clone())
    }

    /// Release a connection handle; flushes memtables to disk.
    pub async fn close(&self) -> Result<(), StorageError> {
        self.blocking(|store| store.flush()).await
    }

    pub fn read_only(&self) -> bool {
        self.inner.store.is_read_only()
    }

    pub fn path(&self) -> &Path {
        self.inner.store.path()
    }

    // ─── Transactions ─────────────────────────────────────────────────

    /// Allocate the transaction id on first call; later calls return it.
    pub async fn get_next_tid(&self, txn: &mut Transaction) -> Result<Tid, StorageError> {
        if let Some(tid) = txn.tid {
            return Ok(tid);
        }
        let tid = self.blocking(|store| store.next_tid()).await?;
        log::debug!("Issued tid {tid}");
        txn.tid = Some(tid);
        Ok(tid)
    }

    pub async fn start_transaction(&self, txn: &mut Transaction) -> Result<(), StorageError> {
        log::trace!("Starting transaction {:?}", txn.tid);
        Ok(())
    }

    /// Bind this adapter to the transaction unless one is bound already.
    pub fn get_txn<'t>(&self, txn: &'t mut Transaction) -> &'t RocksStorage {
        txn.db_txn.get_or_insert_with(|| self.clone())
    }

    /// Return the transaction's id. Writes are already durable.
    pub async fn commit(&self, txn: &mut Transaction) -> Result<Tid, StorageError> {
        let tid = self.get_next_tid(txn).await?;
        self.inner.last_committed.fetch_max(tid, Ordering::SeqCst);
        Ok(tid)
    }

    /// Unbind the adapter. Nothing already written is rolled back.
    pub async fn abort(&self, txn: &mut Transaction) -> Result<(), StorageError> {
        txn.db_txn = None;
        Ok(())
    }

    /// Highest tid committed through this adapter, 0 if none.
    pub async fn last_transaction(&self) -> Tid {
        self.inner.last_committed.load(Ordering::SeqCst)
    }

    /// Optimistic-conflict detection is not performed; always empty.
    pub async fn get_conflicts(&self, _txn: &Transaction) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }

    // ─── Objects ──────────────────────────────────────────────────────

    pub async fn root(&self) -> Result<ObjectRecord, StorageError> {
        self.load(ROOT_ID).await
    }

    pub async fn load(&self, oid: &str) -> Result<ObjectRecord, StorageError> {
        let oid = Oid::parse(oid)?;
        self.blocking(move |store| store.load(&oid)).await
    }

    /// Persist one object and register it with its owner or parent.
    ///
    /// Writes the record, then merges `{writer.id: oid}` into the
    /// annotation index of `writer.of`, or failing that into the child
    /// index of `writer.parent_id`. Returns `(0, state length)`.
    pub async fn store(
        &self,
        oid: &str,
        _old_serial: Option<Tid>,
        writer: &dyn Writer,
        txn: &Transaction,
    ) -> Result<(u64, usize), StorageError> {
        let oid = Oid::parse(oid)?;
        let link = match (non_empty(writer.of()), non_empty(writer.parent_id())) {
            (Some(owner), _) => Some((IndexKind::Annotations, Oid::parse(owner)?)),
            (None, Some(parent)) => Some((IndexKind::Children, Oid::parse(parent)?)),
            (None, None) => None,
        };

        let state = writer.serialize()?;
        let size = state.len();
        let name = writer.id().to_string();
        log::debug!(
            "Storing {oid} (tid={:?}, part={}, {size} bytes)",
            txn.tid,
            writer.part().unwrap_or(0)
        );

        let record = ObjectRecord {
            zoid: oid.to_string(),
            tid: txn.tid,
            id: name.clone(),
            state,
        };
        self.blocking(move |store| {
            store.put(&oid, &record)?;
            if let Some((kind, owner)) = link {
                store.link(kind, &owner, &name, &oid)?;
            }
            Ok(())
        })
        .await?;

        Ok((0, size))
    }

    /// Remove the object record. Index entries that name it are kept.
    pub async fn delete(&self, _txn: &Transaction, oid: &str) -> Result<(), StorageError> {
        let oid = Oid::parse(oid)?;
        self.blocking(move |store| store.delete(&oid)).await
    }

    // ─── Child index ──────────────────────────────────────────────────

    /// Local names of `oid`'s children, in insertion order.
    pub async fn keys(&self, _txn: &Transaction, oid: &str) -> Result<Vec<String>, StorageError> {
        self.index_names(IndexKind::Children, oid).await
    }

    pub async fn get_child(
        &self,
        _txn: &Transaction,
        parent_id: &str,
        id: &str,
    ) -> Result<ObjectRecord, StorageError> {
        self.resolve(IndexKind::Children, parent_id, id).await
    }

    pub async fn has_key(
        &self,
        _txn: &Transaction,
        parent_id: &str,
        id: &str,
    ) -> Result<bool, StorageError> {
        let parent = Oid::parse(parent_id)?;
        let id = id.to_string();
        self.blocking(move |store| store.index_contains(IndexKind::Children, &parent, &id))
            .await
    }

    pub async fn len(&self, _txn: &Transaction, oid: &str) -> Result<usize, StorageError> {
        let oid = Oid::parse(oid)?;
        self.blocking(move |store| store.index_len(IndexKind::Children, &oid))
            .await
    }

    /// Resolve each id in order; the first failure aborts the batch.
    pub async fn get_children(
        &self,
        txn: &Transaction,
        parent: &str,
        ids: &[String],
    ) -> Result<Vec<ObjectRecord>, StorageError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            items.push(self.get_child(txn, parent, id).await?);
        }
        Ok(items)
    }

    // ─── Annotation index ─────────────────────────────────────────────

    pub async fn get_annotation(
        &self,
        _txn: &Transaction,
        oid: &str,
        id: &str,
    ) -> Result<ObjectRecord, StorageError> {
        self.resolve(IndexKind::Annotations, oid, id).await
    }

    pub async fn get_annotation_keys(
        &self,
        _txn: &Transaction,
        oid: &str,
    ) -> Result<Vec<String>, StorageError> {
        self.index_names(IndexKind::Annotations, oid).await
    }

    // ─── Unsupported ──────────────────────────────────────────────────

    pub async fn items(
        &self,
        _txn: &Transaction,
        _oid: &str,
    ) -> Result<Vec<(String, ObjectRecord)>, StorageError> {
        unsupported("items")
    }

    pub async fn del_blob(&self, _txn: &Transaction, _bid: &str) -> Result<(), StorageError> {
        unsupported("del_blob")
    }

    pub async fn write_blob_chunk(
        &self,
        _txn: &Transaction,
        _bid: &str,
        _oid: &str,
        _chunk_index: u32,
        _data: &[u8],
    ) -> Result<(), StorageError> {
        unsupported("write_blob_chunk")
    }

    pub async fn read_blob_chunk(
        &self,
        _txn: &Transaction,
        _bid: &str,
        _chunk: u32,
    ) -> Result<Vec<u8>, StorageError> {
        unsupported("read_blob_chunk")
    }

    pub async fn get_page_of_keys(
        &self,
        _txn: &Transaction,
        _oid: &str,
        _page: usize,
        _page_size: usize,
    ) -> Result<Vec<String>, StorageError> {
        unsupported("get_page_of_keys")
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    async fn index_names(&self, kind: IndexKind, owner: &str) -> Result<Vec<String>, StorageError> {
        let owner = Oid::parse(owner)?;
        self.blocking(move |store| store.index_names(kind, &owner)).await
    }

    async fn resolve(&self, kind: IndexKind, owner: &str, id: &str) -> Result<ObjectRecord, StorageError> {
        let owner = Oid::parse(owner)?;
        let id = id.to_string();
        self.blocking(move |store| store.resolve(kind, &owner, &id)).await
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn unsupported<T>(op: &'static str) -> Result<T, StorageError> {
    log::warn!("Unsupported storage operation called: {op}");
    Err(StorageError::Unsupported(op))
}
