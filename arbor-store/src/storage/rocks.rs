//! RocksDB-backed object store.
//!
//! Everything lives in the default column family under the prefixes of
//! [`keys`](super::keys). Index maintenance and tid issuance go through the
//! merge operator in [`merge`](super::merge), never through
//! read-modify-write.
//!
//! Every method here is a blocking engine call. Multi-call operations
//! (store = put + index merge) are not atomic as a whole: a crash between
//! the calls can leave an index entry without its object or the reverse.

use rocksdb::{
    BlockBasedOptions, Cache, DBCompressionType, DBWithThreadMode, Options, SingleThreaded,
    WriteOptions,
};
use std::path::Path;

use super::counter::TidCounter;
use super::keys::{IndexKind, Oid, StorageKey};
use super::merge::{full_merge, partial_merge, MergeRequest, MERGE_OPERATOR_NAME};
use super::record::{Container, ObjectRecord, Tid};
use crate::config::StoreConfig;
use crate::error::StorageError;

/// Engine handle type.
pub type Db = DBWithThreadMode<SingleThreaded>;

/// Synchronous object store over one RocksDB database.
pub struct ObjectStore {
    /// RocksDB instance (single-threaded CF mode, shared by reference)
    db: Db,
    /// Store configuration
    config: StoreConfig,
    /// Transaction-id counter
    counter: TidCounter,
}

impl ObjectStore {
    /// Open the store at the configured path.
    ///
    /// Creates the database if missing, unless `read_only` is set.
    pub fn open(config: StoreConfig) -> Result<Self, StorageError> {
        let opts = Self::db_options(&config);

        let db = if config.read_only {
            Db::open_for_read_only(&opts, &config.path, false)?
        } else {
            Db::open(&opts, &config.path)?
        };

        log::info!(
            "Opened object store at {} (read_only={})",
            config.path.display(),
            config.read_only
        );

        Ok(Self {
            db,
            config,
            counter: TidCounter::new(),
        })
    }

    /// Build engine options from the config.
    fn db_options(config: &StoreConfig) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(!config.read_only);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_target_file_size_base(config.target_file_size_base);

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(f64::from(config.bloom_filter_bits), false);
        opts.set_block_based_table_factory(&block_opts);
        opts.set_compression_type(DBCompressionType::Lz4);

        opts.set_merge_operator(MERGE_OPERATOR_NAME, full_merge, partial_merge);
        opts
    }

    fn write_opts(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    fn ensure_writable(&self) -> Result<(), StorageError> {
        if self.config.read_only {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    // ─── Objects ──────────────────────────────────────────────────────

    /// Load an object record.
    pub fn load(&self, oid: &Oid) -> Result<ObjectRecord, StorageError> {
        match self.db.get(StorageKey::Object(oid.clone()).to_bytes())? {
            Some(bytes) => ObjectRecord::decode(&bytes),
            None => Err(StorageError::NotFound {
                oid: oid.to_string(),
            }),
        }
    }

    /// Write an object record, replacing any previous one.
    pub fn put(&self, oid: &Oid, record: &ObjectRecord) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.db.put_opt(
            StorageKey::Object(oid.clone()).to_bytes(),
            record.encode()?,
            &self.write_opts(),
        )?;
        Ok(())
    }

    /// Remove an object record. Index entries pointing at it are left alone.
    pub fn delete(&self, oid: &Oid) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.db
            .delete_opt(StorageKey::Object(oid.clone()).to_bytes(), &self.write_opts())?;
        Ok(())
    }

    // ─── Indexes ──────────────────────────────────────────────────────

    /// Issue a merge against a namespaced key. Only index links go through
    /// here; the tid counter merges under its own lock.
    fn merge(&self, key: &StorageKey, request: &MergeRequest) -> Result<(), StorageError> {
        self.ensure_writable()?;
        self.db
            .merge_opt(key.to_bytes(), request.encode()?, &self.write_opts())?;
        Ok(())
    }

    /// Record `name -> target` in the `kind` index of `owner`.
    pub fn link(
        &self,
        kind: IndexKind,
        owner: &Oid,
        name: &str,
        target: &Oid,
    ) -> Result<(), StorageError> {
        self.merge(
            &kind.key(owner),
            &MergeRequest::map_entry(name, target.as_str()),
        )
    }

    /// Read the whole index container, if it exists.
    pub fn read_index(
        &self,
        kind: IndexKind,
        owner: &Oid,
    ) -> Result<Option<Container>, StorageError> {
        self.db
            .get(kind.key(owner).to_bytes())?
            .map(|bytes| Container::decode(&bytes))
            .transpose()
    }

    /// Local names in the index, in insertion order.
    pub fn index_names(&self, kind: IndexKind, owner: &Oid) -> Result<Vec<String>, StorageError> {
        Ok(self
            .read_index(kind, owner)?
            .map(|c| c.names())
            .unwrap_or_default())
    }

    pub fn index_len(&self, kind: IndexKind, owner: &Oid) -> Result<usize, StorageError> {
        Ok(self.read_index(kind, owner)?.map_or(0, |c| c.len()))
    }

    pub fn index_contains(
        &self,
        kind: IndexKind,
        owner: &Oid,
        name: &str,
    ) -> Result<bool, StorageError> {
        Ok(self
            .read_index(kind, owner)?
            .is_some_and(|c| c.contains(name)))
    }

    /// Resolve `name` through the index and load the record it points at.
    ///
    /// A missing index and a missing entry both give `EntryNotFound`. An
    /// entry whose object was deleted gives `NotFound`.
    pub fn resolve(
        &self,
        kind: IndexKind,
        owner: &Oid,
        name: &str,
    ) -> Result<ObjectRecord, StorageError> {
        let target = self
            .read_index(kind, owner)?
            .and_then(|c| c.get(name).map(str::to_owned))
            .ok_or_else(|| StorageError::EntryNotFound {
                index: kind.label(),
                owner: owner.to_string(),
                id: name.to_string(),
            })?;
        self.load(&Oid::parse(target)?)
    }

    // ─── Transaction ids ──────────────────────────────────────────────

    /// Issue the next transaction id.
    pub fn next_tid(&self) -> Result<Tid, StorageError> {
        self.ensure_writable()?;
        self.counter.increment_and_read(&self.db, &self.write_opts())
    }

    /// Last issued transaction id, if any.
    pub fn current_tid(&self) -> Result<Option<Tid>, StorageError> {
        self.counter.current(&self.db)
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        if self.config.read_only {
            return Ok(());
        }
        self.db.flush()?;
        Ok(())
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    #[cfg(test)]
    fn compact(&self) {
        self.db.compact_range::<&[u8], &[u8]>(None, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn open_temp() -> (TempDir, ObjectStore) {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(StoreConfig::for_testing(dir.path().join("db"))).unwrap();
        (dir, store)
    }

    fn oid(s: &str) -> Oid {
        Oid::parse(s).unwrap()
    }

    fn record(zoid: &str, tid: Tid, state: &[u8]) -> ObjectRecord {
        ObjectRecord {
            zoid: zoid.into(),
            tid: Some(tid),
            id: zoid.into(),
            state: state.to_vec(),
        }
    }

    #[test]
    fn test_store_open_close() {
        let (_dir, store) = open_temp();
        assert!(store.path().exists());
        assert!(!store.is_read_only());
    }

    #[test]
    fn test_put_load_delete() {
        let (_dir, store) = open_temp();
        let a = oid("a");
        store.put(&a, &record("a", 1, b"state")).unwrap();
        assert_eq!(store.load(&a).unwrap().state, b"state");

        store.put(&a, &record("a", 2, b"newer")).unwrap();
        let loaded = store.load(&a).unwrap();
        assert_eq!(loaded.tid, Some(2));
        assert_eq!(loaded.state, b"newer");

        store.delete(&a).unwrap();
        assert!(matches!(store.load(&a), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_counter_three_merges() {
        let (_dir, store) = open_temp();
        assert_eq!(store.current_tid().unwrap(), None);
        for _ in 0..3 {
            store
                .merge(&StorageKey::TidCounter, &MergeRequest::Increment(1))
                .unwrap();
        }
        assert_eq!(store.db.get(b"__counter_id").unwrap().unwrap(), b"3");
        assert_eq!(store.current_tid().unwrap(), Some(3));
    }

    #[test]
    fn test_next_tid_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::for_testing(dir.path().join("db"));
        {
            let store = ObjectStore::open(config.clone()).unwrap();
            assert_eq!(store.next_tid().unwrap(), 1);
            assert_eq!(store.next_tid().unwrap(), 2);
        }
        let store = ObjectStore::open(config).unwrap();
        assert_eq!(store.next_tid().unwrap(), 3);
    }

    #[test]
    fn test_interleaved_sequence_merges() {
        let (_dir, store) = open_temp();
        let key = StorageKey::Children(oid("list"));
        let append = |items: &[&str]| {
            MergeRequest::AppendSequence(items.iter().map(|s| s.to_string()).collect())
        };

        store.merge(&key, &append(&["a1"])).unwrap();
        store.merge(&key, &append(&["b1", "b2"])).unwrap();
        store.flush().unwrap();
        store.merge(&key, &append(&["c1"])).unwrap();
        store.merge(&key, &append(&["a2"])).unwrap();
        store.compact();
        store.merge(&key, &append(&["b3"])).unwrap();
        store.merge(&key, &append(&["c2"])).unwrap();

        let container = store.read_index(IndexKind::Children, &oid("list")).unwrap();
        assert_eq!(
            container,
            Some(Container::Sequence(
                ["a1", "b1", "b2", "c1", "a2", "b3", "c2"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            ))
        );
    }

    #[test]
    fn test_index_link_and_resolve() {
        let (_dir, store) = open_temp();
        let root = oid("root");
        for name in ["a", "b"] {
            store.put(&oid(name), &record(name, 1, name.as_bytes())).unwrap();
            store.link(IndexKind::Children, &root, name, &oid(name)).unwrap();
        }
        store.compact();

        assert_eq!(store.index_names(IndexKind::Children, &root).unwrap(), vec!["a", "b"]);
        assert_eq!(store.index_len(IndexKind::Children, &root).unwrap(), 2);
        assert!(store.index_contains(IndexKind::Children, &root, "b").unwrap());
        assert_eq!(store.resolve(IndexKind::Children, &root, "b").unwrap().zoid, "b");

        // annotation index is a separate key
        assert_eq!(store.index_len(IndexKind::Annotations, &root).unwrap(), 0);
        let err = store.resolve(IndexKind::Annotations, &root, "a").unwrap_err();
        assert!(matches!(err, StorageError::EntryNotFound { index: "annotation", .. }));
    }

    #[test]
    fn test_kind_mismatch_keeps_existing_value() {
        let (_dir, store) = open_temp();
        let key = StorageKey::Annotations(oid("bad"));
        store.merge(&key, &MergeRequest::map_entry("a", "x")).unwrap();
        store
            .merge(&key, &MergeRequest::AppendSequence(vec!["y".into()]))
            .unwrap();
        let container = store.read_index(IndexKind::Annotations, &oid("bad")).unwrap();
        assert_eq!(container.map(|c| c.names()), Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_kind_mismatch_survives_compaction() {
        let (_dir, store) = open_temp();
        let key = StorageKey::Children(oid("bad"));
        store.merge(&key, &MergeRequest::map_entry("a", "x")).unwrap();
        store
            .merge(&key, &MergeRequest::AppendSequence(vec!["y".into()]))
            .unwrap();
        store.merge(&key, &MergeRequest::Increment(1)).unwrap();
        store.flush().unwrap();
        store.compact();

        // the engine keeps accepting writes on unrelated keys
        store.put(&oid("other"), &record("other", 1, b"ok")).unwrap();
        assert_eq!(store.load(&oid("other")).unwrap().state, b"ok");
        store.link(IndexKind::Children, &oid("bad"), "b", &oid("other")).unwrap();
        assert_eq!(store.next_tid().unwrap(), 1);

        assert_eq!(store.index_names(IndexKind::Children, &oid("bad")).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = ObjectStore::open(StoreConfig::for_testing(&path)).unwrap();
            store.put(&oid("a"), &record("a", 1, b"kept")).unwrap();
            store.next_tid().unwrap();
        }

        let config = StoreConfig {
            read_only: true,
            ..StoreConfig::for_testing(&path)
        };
        let store = ObjectStore::open(config).unwrap();
        assert!(store.is_read_only());
        assert_eq!(store.load(&oid("a")).unwrap().state, b"kept");
        assert_eq!(store.current_tid().unwrap(), Some(1));

        assert!(matches!(store.put(&oid("b"), &record("b", 1, b"")), Err(StorageError::ReadOnly)));
        assert!(matches!(store.delete(&oid("a")), Err(StorageError::ReadOnly)));
        assert!(matches!(store.next_tid(), Err(StorageError::ReadOnly)));
        assert!(store.flush().is_ok());
    }
}
