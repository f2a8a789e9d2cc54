//! Engine configuration.
//!
//! The hosting runtime hands over a per-database config block; the fields
//! are forwarded to RocksDB tuning options and have no other meaning here.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::StorageError;

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Open the database read-only; every write fails with `ReadOnly`.
    pub read_only: bool,
    /// Database directory path
    #[serde(alias = "filepath")]
    pub path: PathBuf,
    /// Max open files for RocksDB (default: 300000)
    pub max_open_files: i32,
    /// Memtable size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    /// Memtables kept before stalling writes (default: 3)
    pub max_write_buffer_number: i32,
    /// Target SST file size at level 1 (default: 64MB)
    pub target_file_size_base: u64,
    /// Block cache size in bytes (default: 2GB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// Enable fsync on every write (default: false)
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            path: PathBuf::from("arbor_data"),
            max_open_files: 300_000,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
            target_file_size_base: 64 * 1024 * 1024, // 64MB
            block_cache_size: 2 * 1024 * 1024 * 1024, // 2GB
            bloom_filter_bits: 10,
            sync_writes: false,
        }
    }
}

impl StoreConfig {
    /// Create config for testing (small caches, given directory).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            max_write_buffer_number: 2,
            target_file_size_base: 4 * 1024 * 1024,
            block_cache_size: 8 * 1024 * 1024, // 8MB
            ..Self::default()
        }
    }

    /// Parse a JSON database config block. Missing fields take defaults.
    ///
    /// ```
    /// let config = arbor_store::StoreConfig::from_json(
    ///     r#"{"filepath": "/tmp/db", "read_only": true}"#,
    /// ).unwrap();
    /// assert!(config.read_only);
    /// assert_eq!(config.max_open_files, 300_000);
    /// ```
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::Config(e.to_string()))
    }
}
