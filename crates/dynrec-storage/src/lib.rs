//! Dynrec Storage - Embedded key-ordered store
//!
//! This crate provides the storage layer under datasets:
//! - WAL (Write-Ahead Log) with configurable durability
//! - MemTable (in-memory write buffer, one per namespace)
//! - Segments (immutable sorted runs, memory-mapped)
//! - Manifest (namespaces and their segments)
//! - Store (coordinator with isolated namespaces)

pub mod error;
pub mod manifest;
pub mod memtable;
pub mod options;
pub mod segment;
pub mod store;
pub mod wal;

pub use error::{Result, StorageError};
pub use manifest::{Manifest, DEFAULT_NAMESPACE};
pub use memtable::MemTable;
pub use options::{StoreOptions, WriteOptions};
pub use segment::{Segment, SegmentMeta, SegmentWriter};
pub use store::{ColumnFamily, Store, StoreIter};
pub use wal::{WalDurability, WalReader, WalWriter};
