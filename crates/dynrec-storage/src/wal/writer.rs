//! WAL writer
//!
//! Each call to [`WalWriter::write`] appends one entry holding a batch of
//! namespace mutations. The open file, its size and the unsynced backlog sit
//! behind a single lock so that entry order on disk follows sequence order.

use super::{parse_wal_file_name, wal_file_name, WalEntryHeader, WalRecord};
use crate::error::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// When logged entries are forced to stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalDurability {
    /// fsync before every write returns
    EveryWrite,
    /// fsync once the backlog or the interval is exceeded
    Periodic { interval_ms: u64 },
    /// Hand bytes to the OS after each write, never fsync
    OsDefault,
    /// Keep bytes buffered until a sync, rotate or drop
    None,
}

impl Default for WalDurability {
    fn default() -> Self {
        WalDurability::Periodic { interval_ms: 100 }
    }
}

const WRITE_BUFFER_SIZE: usize = 64 * 1024;
const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Backlog limits for `Periodic` durability
#[derive(Debug, Clone)]
pub struct GroupCommitConfig {
    /// Unsynced bytes that force a sync
    pub max_pending_bytes: usize,
    /// Unsynced entries that force a sync
    pub max_pending_entries: usize,
    /// Upper bound on the sync interval
    pub max_wait_ms: u64,
}

impl Default for GroupCommitConfig {
    fn default() -> Self {
        Self {
            max_pending_bytes: 1 << 20,
            max_pending_entries: 1000,
            max_wait_ms: 10,
        }
    }
}

/// The file currently appended to
struct ActiveFile {
    num: u64,
    out: BufWriter<File>,
    size: u64,
    unsynced_bytes: usize,
    unsynced_entries: usize,
    synced_at: Instant,
}

impl ActiveFile {
    fn open(dir: &Path, num: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(wal_file_name(num)))?;
        let size = file.metadata()?.len();
        Ok(Self {
            num,
            out: BufWriter::with_capacity(WRITE_BUFFER_SIZE, file),
            size,
            unsynced_bytes: 0,
            unsynced_entries: 0,
            synced_at: Instant::now(),
        })
    }

    fn sync(&mut self) -> Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        self.unsynced_bytes = 0;
        self.unsynced_entries = 0;
        self.synced_at = Instant::now();
        Ok(())
    }
}

/// Appends mutation batches to numbered WAL files
pub struct WalWriter {
    dir: PathBuf,
    active: Mutex<ActiveFile>,
    next_sequence: AtomicU64,
    durability: WalDurability,
    group_commit: GroupCommitConfig,
    max_file_size: u64,
}

impl WalWriter {
    /// Open a writer on `dir`
    ///
    /// Appends go to a new file after the highest-numbered one, so a torn tail
    /// left by a crash stays at the end of its own file. An empty newest file
    /// is reused.
    pub fn new(dir: impl AsRef<Path>, durability: WalDurability) -> Result<Self> {
        Self::with_config(dir, durability, GroupCommitConfig::default())
    }

    /// Open a writer with explicit group commit limits
    pub fn with_config(
        dir: impl AsRef<Path>,
        durability: WalDurability,
        group_commit: GroupCommitConfig,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let active = ActiveFile::open(&dir, Self::first_free_file_num(&dir)?)?;

        Ok(Self {
            dir,
            active: Mutex::new(active),
            next_sequence: AtomicU64::new(0),
            durability,
            group_commit,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }

    /// Rotate once the active file reaches `size` bytes
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Number new entries from `sequence` on, after replaying older ones
    pub fn with_start_sequence(self, sequence: u64) -> Self {
        self.next_sequence.store(sequence, Ordering::SeqCst);
        self
    }

    /// Append `records` as one entry and return its sequence number
    ///
    /// An empty batch writes nothing.
    pub fn write(&self, records: &[WalRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(self.sequence());
        }

        let payload = bincode::serialize(records)?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        let record_count = records.len() as u32;
        let entry_len = WalEntryHeader::SIZE + payload.len();

        let mut active = self.active.lock();
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let header = WalEntryHeader {
            sequence,
            timestamp,
            record_count,
            data_len: payload.len() as u32,
            checksum: WalEntryHeader::compute_checksum(sequence, timestamp, record_count, &payload),
        };
        active.out.write_all(&header.to_bytes())?;
        active.out.write_all(&payload)?;
        active.size += entry_len as u64;
        active.unsynced_bytes += entry_len;
        active.unsynced_entries += 1;
        trace!("Logged entry {} with {} records", sequence, record_count);

        if active.size >= self.max_file_size {
            self.switch_file(&mut active)?;
        } else {
            self.apply_durability(&mut active)?;
        }
        Ok(sequence)
    }

    /// Flush buffered entries and fsync the active file
    pub fn sync(&self) -> Result<()> {
        self.active.lock().sync()
    }

    /// Sequence number the next entry will get
    pub fn sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    /// Number of the active file
    pub fn file_num(&self) -> u64 {
        self.active.lock().num
    }

    /// WAL directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start a new file and return its number
    ///
    /// All entries written before the call are synced and live in
    /// lower-numbered files.
    pub fn rotate(&self) -> Result<u64> {
        let mut active = self.active.lock();
        self.switch_file(&mut active)
    }

    fn switch_file(&self, active: &mut ActiveFile) -> Result<u64> {
        let next = ActiveFile::open(&self.dir, active.num + 1)?;
        active.sync()?;
        *active = next;
        debug!("Switched WAL to {}", wal_file_name(active.num));
        Ok(active.num)
    }

    fn apply_durability(&self, active: &mut ActiveFile) -> Result<()> {
        match self.durability {
            WalDurability::EveryWrite => active.sync(),
            WalDurability::Periodic { interval_ms } => {
                let limits = &self.group_commit;
                let interval = Duration::from_millis(interval_ms.min(limits.max_wait_ms));
                if active.unsynced_bytes >= limits.max_pending_bytes
                    || active.unsynced_entries >= limits.max_pending_entries
                    || active.synced_at.elapsed() >= interval
                {
                    active.sync()?;
                }
                Ok(())
            }
            WalDurability::OsDefault => {
                active.out.flush()?;
                Ok(())
            }
            WalDurability::None => Ok(()),
        }
    }

    fn first_free_file_num(dir: &Path) -> Result<u64> {
        let mut last: Option<(u64, PathBuf)> = None;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(num) = parse_wal_file_name(&entry.file_name().to_string_lossy()) {
                if last.as_ref().map_or(true, |(n, _)| num > *n) {
                    last = Some((num, entry.path()));
                }
            }
        }
        match last {
            None => Ok(0),
            Some((num, path)) if std::fs::metadata(&path)?.len() == 0 => Ok(num),
            Some((num, _)) => Ok(num + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::{WalOp, WalReader};
    use tempfile::TempDir;

    fn put(namespace: u32, key: &str, value: &str) -> WalRecord {
        WalRecord {
            namespace,
            op: WalOp::Put {
                key: key.as_bytes().to_vec(),
                value: value.as_bytes().to_vec(),
            },
        }
    }

    fn log_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| parse_wal_file_name(&e.file_name().to_string_lossy()).is_some())
            .count()
    }

    #[test]
    fn test_first_entry_gets_sequence_zero() {
        let dir = TempDir::new().unwrap();
        let wal = WalWriter::new(dir.path(), WalDurability::None).unwrap();

        assert_eq!(wal.write(&[put(0, "k", "v")]).unwrap(), 0);
        assert_eq!(wal.sequence(), 1);
    }

    #[test]
    fn test_empty_batch_is_not_logged() {
        let dir = TempDir::new().unwrap();
        let wal = WalWriter::new(dir.path(), WalDurability::None).unwrap();

        assert_eq!(wal.write(&[]).unwrap(), 0);
        assert_eq!(wal.sequence(), 0);
        wal.sync().unwrap();
        assert!(WalReader::new(dir.path()).read_all().unwrap().is_empty());
    }

    #[test]
    fn test_every_durability_mode_is_readable_after_sync() {
        for durability in [
            WalDurability::None,
            WalDurability::OsDefault,
            WalDurability::Periodic { interval_ms: 10 },
            WalDurability::EveryWrite,
        ] {
            let dir = TempDir::new().unwrap();
            let wal = WalWriter::new(dir.path(), durability).unwrap();
            wal.write(&[put(0, "k", "v"), put(1, "k", "w")]).unwrap();
            wal.sync().unwrap();

            let entries = WalReader::new(dir.path()).read_all().unwrap();
            assert_eq!(entries.len(), 1, "{:?}", durability);
            assert_eq!(entries[0].records.len(), 2);
        }
    }

    #[test]
    fn test_os_default_visible_without_sync() {
        let dir = TempDir::new().unwrap();
        let wal = WalWriter::new(dir.path(), WalDurability::OsDefault).unwrap();
        wal.write(&[put(0, "k", "v")]).unwrap();

        assert_eq!(WalReader::new(dir.path()).read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_size_limit_rotates() {
        let dir = TempDir::new().unwrap();
        let wal = WalWriter::new(dir.path(), WalDurability::None)
            .unwrap()
            .with_max_file_size(256);

        for i in 0..50 {
            wal.write(&[put(0, &i.to_string(), "some value bytes")]).unwrap();
        }
        wal.sync().unwrap();

        assert!(log_files(dir.path()) > 1);
        assert!(wal.file_num() > 0);
        let entries = WalReader::new(dir.path()).read_all().unwrap();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[49].sequence, 49);
    }

    #[test]
    fn test_periodic_syncs_at_entry_limit() {
        let dir = TempDir::new().unwrap();
        let limits = GroupCommitConfig {
            max_pending_bytes: 1 << 20,
            max_pending_entries: 5,
            max_wait_ms: 10_000,
        };
        let wal = WalWriter::with_config(
            dir.path(),
            WalDurability::Periodic { interval_ms: 10_000 },
            limits,
        )
        .unwrap();

        for i in 0..4 {
            wal.write(&[put(0, &i.to_string(), "v")]).unwrap();
        }
        assert_eq!(wal.active.lock().unsynced_entries, 4);

        wal.write(&[put(0, "4", "v")]).unwrap();
        assert_eq!(wal.active.lock().unsynced_entries, 0);
    }

    #[test]
    fn test_reopen_starts_new_file() {
        let dir = TempDir::new().unwrap();
        {
            let wal = WalWriter::new(dir.path(), WalDurability::None).unwrap();
            wal.write(&[put(0, "a", "1")]).unwrap();
            wal.sync().unwrap();
        }

        let wal = WalWriter::new(dir.path(), WalDurability::None)
            .unwrap()
            .with_start_sequence(1);
        assert_eq!(wal.file_num(), 1);
        wal.write(&[put(1, "b", "2")]).unwrap();
        wal.sync().unwrap();

        let entries = WalReader::new(dir.path()).read_all().unwrap();
        assert_eq!(log_files(dir.path()), 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, 1);
        assert_eq!(entries[1].records[0], put(1, "b", "2"));
    }

    #[test]
    fn test_reopen_reuses_empty_file() {
        let dir = TempDir::new().unwrap();
        drop(WalWriter::new(dir.path(), WalDurability::None).unwrap());

        let wal = WalWriter::new(dir.path(), WalDurability::None).unwrap();
        assert_eq!(wal.file_num(), 0);
        assert_eq!(log_files(dir.path()), 1);
    }

    #[test]
    fn test_write_after_torn_tail_is_readable() {
        let dir = TempDir::new().unwrap();
        {
            let wal = WalWriter::new(dir.path(), WalDurability::None).unwrap();
            wal.write(&[put(0, "a", "1")]).unwrap();
            wal.write(&[put(0, "torn", "x")]).unwrap();
            wal.sync().unwrap();
        }
        let first = dir.path().join(wal_file_name(0));
        let len = std::fs::metadata(&first).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&first)
            .unwrap()
            .set_len(len - 5)
            .unwrap();

        let wal = WalWriter::new(dir.path(), WalDurability::None)
            .unwrap()
            .with_start_sequence(1);
        wal.write(&[put(0, "b", "2")]).unwrap();
        wal.sync().unwrap();

        let entries = WalReader::new(dir.path()).read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].records[0], put(0, "a", "1"));
        assert_eq!(entries[1].records[0], put(0, "b", "2"));
    }

    #[test]
    fn test_rotate_returns_new_file_number() {
        let dir = TempDir::new().unwrap();
        let wal = WalWriter::new(dir.path(), WalDurability::None).unwrap();
        wal.write(&[put(0, "a", "1")]).unwrap();

        assert_eq!(wal.rotate().unwrap(), 1);
        assert_eq!(wal.file_num(), 1);
        wal.write(&[put(0, "b", "2")]).unwrap();
        wal.sync().unwrap();

        assert_eq!(log_files(dir.path()), 2);
        assert_eq!(WalReader::new(dir.path()).read_all().unwrap().len(), 2);
    }
}
