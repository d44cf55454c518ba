//! WAL recovery
//!
//! Replays logged entries after an unclean shutdown and deletes files whose
//! contents already live in segments.

use super::{parse_wal_file_name, WalEntryHeader, WalRecord};
use crate::error::{Result, StorageError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One logged batch
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub sequence: u64,
    /// Write time, nanoseconds since the epoch
    pub timestamp: i64,
    pub records: Vec<WalRecord>,
}

/// Reads the WAL files of one directory
pub struct WalReader {
    dir: PathBuf,
}

impl WalReader {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Every entry in every file, ordered by sequence
    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        let mut entries = Vec::new();
        for path in self.list_wal_files()? {
            entries.append(&mut self.read_file(&path)?);
        }
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    /// Entries of one file
    ///
    /// A torn entry at the tail, left by a crash mid-append, ends the file.
    /// A checksum mismatch is reported as corruption.
    pub fn read_file(&self, path: &Path) -> Result<Vec<WalEntry>> {
        let file = File::open(path)?;
        let mut remaining = file.metadata()?.len();
        let mut input = BufReader::new(file);
        let mut entries = Vec::new();
        while let Some(entry) = next_entry(&mut input, &mut remaining, path)? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// WAL files paired with their numbers, lowest first
    pub fn list_wal_files_numbered(&self) -> Result<Vec<(u64, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(num) = parse_wal_file_name(&entry.file_name().to_string_lossy()) {
                files.push((num, entry.path()));
            }
        }
        files.sort_unstable_by_key(|(num, _)| *num);
        Ok(files)
    }

    /// WAL file paths, lowest number first
    pub fn list_wal_files(&self) -> Result<Vec<PathBuf>> {
        let files = self.list_wal_files_numbered()?;
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete the files numbered below `file_num`, returning how many went
    pub fn remove_files_before(&self, file_num: u64) -> Result<usize> {
        let stale: Vec<PathBuf> = self
            .list_wal_files_numbered()?
            .into_iter()
            .filter(|(num, _)| *num < file_num)
            .map(|(_, path)| path)
            .collect();
        for path in &stale {
            std::fs::remove_file(path)?;
        }
        if !stale.is_empty() {
            debug!("Removed {} flushed WAL file(s)", stale.len());
        }
        Ok(stale.len())
    }
}

/// Decode the entry at the reader's position, `None` at a clean or torn end
///
/// `remaining` counts the unread bytes of the file and bounds the payload
/// length taken from the not yet verified header.
fn next_entry(input: &mut impl Read, remaining: &mut u64, path: &Path) -> Result<Option<WalEntry>> {
    let mut header_bytes = [0u8; WalEntryHeader::SIZE];
    match fill(input, &mut header_bytes)? {
        0 => return Ok(None),
        n if n < header_bytes.len() => {
            warn!("Torn WAL header at the end of {}", path.display());
            return Ok(None);
        }
        _ => {}
    }
    *remaining = remaining.saturating_sub(WalEntryHeader::SIZE as u64);
    let header = WalEntryHeader::from_bytes(&header_bytes);

    if u64::from(header.data_len) > *remaining {
        warn!(
            "WAL entry {} in {} claims {} bytes, {} left; treating as torn",
            header.sequence,
            path.display(),
            header.data_len,
            remaining
        );
        return Ok(None);
    }
    *remaining -= u64::from(header.data_len);

    let mut payload = vec![0u8; header.data_len as usize];
    if fill(input, &mut payload)? < payload.len() {
        warn!(
            "Torn WAL entry {} at the end of {}",
            header.sequence,
            path.display()
        );
        return Ok(None);
    }

    let checksum = WalEntryHeader::compute_checksum(
        header.sequence,
        header.timestamp,
        header.record_count,
        &payload,
    );
    if checksum != header.checksum {
        return Err(StorageError::Corrupted(format!(
            "WAL entry {} in {}: checksum {:08x}, stored {:08x}",
            header.sequence,
            path.display(),
            checksum,
            header.checksum
        )));
    }

    Ok(Some(WalEntry {
        sequence: header.sequence,
        timestamp: header.timestamp,
        records: bincode::deserialize(&payload)?,
    }))
}

/// Read until `buf` is full or the input ends, returning the bytes read
fn fill(input: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
