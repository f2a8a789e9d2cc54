//! Persistent storage layer for the object graph.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐   put / get / delete   ┌──────────────────────────────┐
//! │ ObjectStore  │ ─────────────────────► │ RocksDB (default CF)         │
//! │ (blocking)   │                        │                              │
//! └──────┬───────┘   merge(MergeRequest)  │ object-<oid>  ObjectRecord   │
//!        │ ─────────────────────────────► │ keys-<oid>    child index    │
//!        │                                │ of-<oid>      annotations    │
//!        ▼                                │ __counter_id  decimal ASCII  │
//! ┌──────────────┐                        └──────────────┬───────────────┘
//! │ TidCounter   │                                       │ on read / compaction
//! └──────────────┘                                       ▼
//!                                         ┌──────────────────────────────┐
//!                                         │ merge operator               │
//!                                         │ Increment / AppendSequence / │
//!                                         │ MergeMapping / Replace       │
//!                                         └──────────────────────────────┘
//! ```

pub mod counter;
pub mod keys;
pub mod merge;
pub mod record;
pub mod rocks;

pub use counter::TidCounter;
pub use keys::{IndexKind, Oid, StorageKey};
pub use merge::{MergeRequest, MERGE_OPERATOR_NAME};
pub use record::{Container, ObjectRecord, Tid};
pub use rocks::{Db, ObjectStore};
