//! Write-Ahead Log implementation
//!
//! Every logged put or delete is appended here before it reaches a memtable.
//! Files are truncated once their contents have been flushed to segments.

mod reader;
mod writer;

pub use reader::{WalEntry, WalReader};
pub use writer::{GroupCommitConfig, WalDurability, WalWriter};

use serde::{Deserialize, Serialize};

/// A single logged mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    /// Namespace id from the manifest
    pub namespace: u32,
    pub op: WalOp,
}

/// Mutation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// File name for a WAL file number
pub(crate) fn wal_file_name(file_num: u64) -> String {
    format!("wal_{:08}.log", file_num)
}

/// Parse a WAL file number out of a file name
pub(crate) fn parse_wal_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("wal_")?.strip_suffix(".log")?.parse().ok()
}

/// Fixed-size header in front of every WAL entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WalEntryHeader {
    /// Entry sequence number
    pub sequence: u64,
    /// Wall-clock time of the write (nanoseconds since epoch)
    pub timestamp: i64,
    /// Number of records in this entry
    pub record_count: u32,
    /// Length of the serialized data
    pub data_len: u32,
    /// CRC32 of header bytes 0-23 and data
    pub checksum: u32,
}

impl WalEntryHeader {
    pub const SIZE: usize = 32; // 8 + 8 + 4 + 4 + 4 + 4 (padding)

    pub fn compute_checksum(
        sequence: u64,
        timestamp: i64,
        record_count: u32,
        data: &[u8],
    ) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&sequence.to_le_bytes());
        hasher.update(&timestamp.to_le_bytes());
        hasher.update(&record_count.to_le_bytes());
        hasher.update(&(data.len() as u32).to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.sequence.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.record_count.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.data_len.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.checksum.to_le_bytes());
        // bytes[28..32] is padding
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&bytes[0..8]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[8..16]);
        Self {
            sequence: u64::from_le_bytes(sequence),
            timestamp: i64::from_le_bytes(timestamp),
            record_count: u32_at(16),
            data_len: u32_at(20),
            checksum: u32_at(24),
        }
    }
}
