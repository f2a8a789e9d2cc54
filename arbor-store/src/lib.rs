//! # arbor-store — RocksDB persistence for a hierarchical object graph
//!
//! Maps documents, their children and their annotations onto one flat,
//! ordered RocksDB keyspace. Child and annotation indexes, and the
//! transaction-id counter, are maintained through RocksDB merges, so no
//! writer ever does a read-modify-write on a shared key.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   Transaction / Writer   ┌──────────────┐
//! │ Database runtime │ ───────────────────────► │ RocksStorage │ async
//! └──────────────────┘                          └──────┬───────┘
//!                                                      │ spawn_blocking
//!                                                      ▼
//!                                               ┌──────────────┐
//!                                               │ ObjectStore  │ blocking
//!                                               └──────┬───────┘
//!                                                      │ get / put / merge
//!                                                      ▼
//!                                               ┌──────────────┐
//!                                               │ RocksDB      │
//!                                               │ + arbor.merge│
//!                                               └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`adapter`] — async load/store/delete/index/commit surface
//! - [`storage`] — key namespace, record formats, merge operator, engine
//! - [`txn`] — transaction and writer collaborators
//! - [`config`] — engine tuning options
//!
//! ## Example
//!
//! ```no_run
//! use arbor_store::{ObjectWriter, RocksStorage, StoreConfig, Transaction};
//!
//! # async fn run() -> Result<(), arbor_store::StorageError> {
//! let storage = RocksStorage::new(StoreConfig::for_testing("/tmp/arbor"))?;
//! let mut txn = Transaction::new();
//! storage.get_next_tid(&mut txn).await?;
//!
//! let writer = ObjectWriter::new("a", b"state".to_vec()).with_parent("root");
//! storage.store("oid-a", None, &writer, &txn).await?;
//! storage.commit(&mut txn).await?;
//!
//! assert_eq!(storage.keys(&txn, "root").await?, vec!["a"]);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod storage;
pub mod txn;

// Re-exports for convenience
pub use adapter::{RocksStorage, ROOT_ID};
pub use config::StoreConfig;
pub use error::StorageError;
pub use storage::{
    Container, IndexKind, MergeRequest, ObjectRecord, ObjectStore, Oid, StorageKey, Tid,
    TidCounter, MERGE_OPERATOR_NAME,
};
pub use txn::{ObjectWriter, Transaction, Writer};
