//! Storage utilities and abstractions.
//!
//! Backend-level infrastructure shared by the forum stores.
//!
//! ## Modules
//!
//! - `rocksdb`: Generic RocksDB utilities (configuration, handle, batches, key helpers)

pub mod rocksdb;

pub use rocksdb::{id_key, index_key, trailing_id, BatchWriter, RocksDbConfig, RocksDbHandle};
