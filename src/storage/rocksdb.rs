//! Shared RocksDB storage utilities.
//!
//! Thin layer over a multi-threaded RocksDB instance: tuning presets,
//! big-endian composite keys, bincode values, prefix scans and atomic write
//! batches. Nothing in here knows about forums.

use crate::error::{ForumError, Result};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode, Direction,
    IteratorMode, MultiThreaded, Options, WriteBatch, WriteOptions,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

// =============================================================================
// Configuration
// =============================================================================

/// Tuning for the content database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RocksDbConfig {
    pub max_open_files: i32,
    /// Memtable size in bytes.
    pub write_buffer_size: usize,
    pub max_write_buffers: i32,
    /// Background threads; `None` uses one per CPU.
    pub parallelism: Option<i32>,
    /// fsync every committed batch.
    pub sync_writes: bool,
    pub compress: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            write_buffer_size: 8 << 20,
            max_write_buffers: 2,
            parallelism: None,
            sync_writes: false,
            compress: true,
        }
    }
}

impl RocksDbConfig {
    /// Preset for a long-running forum server: larger memtables, durable commits.
    pub fn for_server() -> Self {
        Self {
            max_open_files: 512,
            write_buffer_size: 64 << 20,
            max_write_buffers: 4,
            sync_writes: true,
            ..Self::default()
        }
    }

    fn options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffers);
        opts.increase_parallelism(self.parallelism.unwrap_or_else(|| num_cpus::get() as i32));
        opts.set_compression_type(if self.compress {
            DBCompressionType::Lz4
        } else {
            DBCompressionType::None
        });
        opts
    }
}

// =============================================================================
// Keys and values
// =============================================================================

/// Encodes a numeric id as 8 big-endian bytes so keys sort numerically.
pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Creates an index key `{prefix}{id}` where `id` is big-endian.
pub fn index_key(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Decodes the trailing 8 big-endian bytes of an index key.
pub fn trailing_id(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    let tail: [u8; 8] = key[start..].try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| ForumError::serialization(format!("Failed to encode record: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| ForumError::serialization(format!("Failed to decode record: {}", e)))
}

// =============================================================================
// Write batches
// =============================================================================

enum BatchOp {
    Put(&'static str, Vec<u8>, Vec<u8>),
    Delete(&'static str, Vec<u8>),
}

/// Writes applied together by [`RocksDbHandle::commit`].
///
/// Column families are resolved at commit time, so a batch can be built
/// without holding the database.
#[derive(Default)]
pub struct BatchWriter {
    ops: Vec<BatchOp>,
}

impl BatchWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a bincode-encoded value.
    pub fn put<T: Serialize>(&mut self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        self.ops.push(BatchOp::Put(cf, key.to_vec(), encode(value)?));
        Ok(())
    }

    /// Queues raw bytes. Index entries use an empty value.
    pub fn put_raw(&mut self, cf: &'static str, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put(cf, key.to_vec(), value.to_vec()));
    }

    pub fn delete(&mut self, cf: &'static str, key: &[u8]) {
        self.ops.push(BatchOp::Delete(cf, key.to_vec()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// =============================================================================
// Database handle
// =============================================================================

/// An open database plus the write options every commit uses.
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    sync_writes: bool,
}

impl RocksDbHandle {
    /// Opens (creating if needed) a database with exactly `column_families`.
    pub fn open(
        db_path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let descriptors = column_families
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &config.options(),
            db_path.as_ref(),
            descriptors,
        )
        .map_err(|e| {
            ForumError::storage(format!("Failed to open {:?}: {}", db_path.as_ref(), e))
        })?;

        debug!(path = ?db_path.as_ref(), cfs = column_families.len(), "storage: database open");
        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.sync_writes,
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ForumError::storage(format!("Unknown column family '{}'", name)))
    }

    /// Writes a single value. Equivalent to a one-entry batch.
    pub fn put<T: Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        let mut batch = BatchWriter::new();
        batch.put(cf, key, value)?;
        self.commit(batch)
    }

    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let bytes = self
            .db
            .get_pinned_cf(&cf, key)
            .map_err(|e| ForumError::storage(format!("Failed to read {}: {}", cf_name, e)))?;
        trace!(cf = cf_name, hit = bytes.is_some(), "storage: get");
        bytes.map(|b| decode(&b)).transpose()
    }

    /// Applies every queued operation in one atomic write.
    pub fn commit(&self, batch: BatchWriter) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let queued = batch.len();
        let mut wb = WriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put(cf, key, value) => wb.put_cf(&self.cf(cf)?, key, value),
                BatchOp::Delete(cf, key) => wb.delete_cf(&self.cf(cf)?, key),
            }
        }
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db
            .write_opt(wb, &opts)
            .map_err(|e| ForumError::storage(format!("Failed to commit batch: {}", e)))?;
        trace!(ops = queued, "storage: batch committed");
        Ok(())
    }

    /// Trailing big-endian ids of every key under `prefix`, in key order.
    pub fn prefix_ids(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<u64>> {
        let cf = self.cf(cf_name)?;
        let mut ids = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _) = item
                .map_err(|e| ForumError::storage(format!("Failed to scan {}: {}", cf_name, e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            ids.extend(trailing_id(&key));
        }
        trace!(cf = cf_name, found = ids.len(), "storage: prefix scan");
        Ok(ids)
    }
}

impl std::fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbHandle")
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}
