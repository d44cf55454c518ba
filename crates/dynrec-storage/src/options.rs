//! Store and write options

use crate::wal::WalDurability;
use serde::{Deserialize, Serialize};

/// Options applied when a store is created or opened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOptions {
    /// WAL durability mode
    pub wal_durability: WalDurability,
    /// WAL file size that triggers rotation (bytes)
    pub max_wal_file_size: u64,
    /// Total memtable size that triggers a flush to segments (bytes)
    pub memtable_flush_bytes: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            wal_durability: WalDurability::default(),
            max_wal_file_size: 64 * 1024 * 1024, // 64MB
            memtable_flush_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Per-write options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip the WAL; the write is only durable after the next flush or close
    pub disable_wal: bool,
    /// fsync the WAL before returning
    pub sync: bool,
}

impl WriteOptions {
    /// Options for bulk loading: no WAL
    pub fn no_wal() -> Self {
        Self {
            disable_wal: true,
            sync: false,
        }
    }

    /// Options for a synchronous, logged write
    pub fn synced() -> Self {
        Self {
            disable_wal: false,
            sync: true,
        }
    }
}
