//! Segments - immutable sorted runs on disk
//!
//! Layout:
//!
//! ```text
//! magic "DRSG" | version u16 | entry_count u64
//! entry*: key_len u32 | key | flag u8 (1 value, 0 tombstone) | [value_len u32 | value]
//! crc32 u32 over everything above
//! ```
//!
//! All integers are little-endian. Segments are memory-mapped for reads and
//! indexed once at open.

use crate::error::{Result, StorageError};
use crate::memtable::Entry;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

const SEGMENT_MAGIC: [u8; 4] = *b"DRSG";
const SEGMENT_VERSION: u16 = 1;
const HEADER_SIZE: usize = 4 + 2 + 8;
const FOOTER_SIZE: usize = 4;

/// Summary of a written segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentMeta {
    pub entry_count: u64,
    pub size_bytes: u64,
}

/// Writes sorted entries into a segment file
pub struct SegmentWriter;

impl SegmentWriter {
    /// Write `entries` to `path`
    ///
    /// Entries are sorted by key first; for duplicate keys the last one wins.
    /// The file is written under a temporary name and renamed into place.
    pub fn write(path: &Path, mut entries: Vec<Entry>) -> Result<SegmentMeta> {
        // Stable sort keeps later duplicates after earlier ones
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.reverse();
        entries.dedup_by(|a, b| a.0 == b.0);
        entries.reverse();

        let mut buf = Vec::new();
        buf.extend_from_slice(&SEGMENT_MAGIC);
        buf.extend_from_slice(&SEGMENT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(entries.len() as u64).to_le_bytes());

        for (key, value) in &entries {
            buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
            buf.extend_from_slice(key);
            match value {
                Some(value) => {
                    buf.push(1);
                    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
                    buf.extend_from_slice(value);
                }
                None => buf.push(0),
            }
        }

        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());

        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&buf)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;

        debug!(
            "Wrote segment {} with {} entries ({} bytes)",
            path.display(),
            entries.len(),
            buf.len()
        );

        Ok(SegmentMeta {
            entry_count: entries.len() as u64,
            size_bytes: buf.len() as u64,
        })
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    key: Range<usize>,
    value: Option<Range<usize>>,
}

/// A memory-mapped, read-only segment
pub struct Segment {
    path: PathBuf,
    mmap: Mmap,
    index: Vec<IndexEntry>,
}

fn corrupted(path: &Path, what: &str) -> StorageError {
    StorageError::Corrupted(format!("segment {}: {}", path.display(), what))
}

impl Segment {
    /// Open and validate a segment file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len() as usize;
        if len < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupted(&path, "file too short"));
        }

        // Segment files are never modified after the rename in `SegmentWriter::write`
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        if mmap[0..4] != SEGMENT_MAGIC {
            return Err(corrupted(&path, "invalid magic"));
        }
        let version = u16::from_le_bytes([mmap[4], mmap[5]]);
        if version != SEGMENT_VERSION {
            return Err(corrupted(&path, &format!("unsupported version {}", version)));
        }

        let body_end = len - FOOTER_SIZE;
        let stored = read_u32(&mmap, body_end).ok_or_else(|| corrupted(&path, "missing checksum"))?;
        if crc32fast::hash(&mmap[..body_end]) != stored {
            return Err(corrupted(&path, "checksum mismatch"));
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&mmap[6..14]);
        let entry_count = u64::from_le_bytes(count_bytes);

        let index = Self::build_index(&path, &mmap[..body_end], entry_count)?;

        Ok(Self { path, mmap, index })
    }

    fn build_index(path: &Path, body: &[u8], entry_count: u64) -> Result<Vec<IndexEntry>> {
        let mut index: Vec<IndexEntry> = Vec::with_capacity(entry_count.min(1 << 20) as usize);
        let mut cursor = HEADER_SIZE;

        for _ in 0..entry_count {
            let key_len = read_u32(body, cursor).ok_or_else(|| corrupted(path, "truncated key"))?;
            let key_start = cursor + 4;
            let key_end = key_start + key_len as usize;
            let flag = *body
                .get(key_end)
                .ok_or_else(|| corrupted(path, "truncated entry"))?;
            cursor = key_end + 1;

            let value = match flag {
                0 => None,
                1 => {
                    let value_len =
                        read_u32(body, cursor).ok_or_else(|| corrupted(path, "truncated value"))?;
                    let value_start = cursor + 4;
                    let value_end = value_start + value_len as usize;
                    if value_end > body.len() {
                        return Err(corrupted(path, "truncated value"));
                    }
                    cursor = value_end;
                    Some(value_start..value_end)
                }
                _ => return Err(corrupted(path, "invalid entry flag")),
            };

            if let Some(prev) = index.last() {
                if body[prev.key.clone()] >= body[key_start..key_end] {
                    return Err(corrupted(path, "keys out of order"));
                }
            }

            index.push(IndexEntry {
                key: key_start..key_end,
                value,
            });
        }

        if cursor != body.len() {
            return Err(corrupted(path, "trailing bytes"));
        }

        Ok(index)
    }

    /// Look up a key
    ///
    /// `None` if absent, `Some(None)` for a tombstone.
    pub fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        let pos = self
            .index
            .binary_search_by(|entry| self.mmap[entry.key.clone()].cmp(key))
            .ok()?;
        Some(
            self.index[pos]
                .value
                .as_ref()
                .map(|range| self.mmap[range.clone()].to_vec()),
        )
    }

    /// Iterate entries in key order
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = (&[u8], Option<&[u8]>)> + '_ {
        self.index.iter().map(move |entry| {
            (
                &self.mmap[entry.key.clone()],
                entry.value.as_ref().map(|range| &self.mmap[range.clone()]),
            )
        })
    }

    /// Number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Segment file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(key: &str, value: Option<&str>) -> Entry {
        (
            key.as_bytes().to_vec(),
            value.map(|v| v.as_bytes().to_vec()),
        )
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0_00000001.seg");

        let meta = SegmentWriter::write(
            &path,
            vec![entry("b", Some("2")), entry("a", Some("1")), entry("c", None)],
        )
        .unwrap();
        assert_eq!(meta.entry_count, 3);

        let segment = Segment::open(&path).unwrap();
        assert_eq!(segment.len(), 3);
        assert_eq!(segment.get(b"a"), Some(Some(b"1".to_vec())));
        assert_eq!(segment.get(b"b"), Some(Some(b"2".to_vec())));
        assert_eq!(segment.get(b"c"), Some(None));
        assert_eq!(segment.get(b"d"), None);

        let keys: Vec<_> = segment.entries().rev().map(|(k, _)| k.to_vec()).collect();
        assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dup.seg");
        SegmentWriter::write(&path, vec![entry("k", Some("old")), entry("k", Some("new"))]).unwrap();

        let segment = Segment::open(&path).unwrap();
        assert_eq!(segment.len(), 1);
        assert_eq!(segment.get(b"k"), Some(Some(b"new".to_vec())));
    }

    #[test]
    fn test_empty_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.seg");
        SegmentWriter::write(&path, Vec::new()).unwrap();

        let segment = Segment::open(&path).unwrap();
        assert!(segment.is_empty());
        assert_eq!(segment.get(b"a"), None);
    }

    #[test]
    fn test_corruption_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.seg");
        SegmentWriter::write(&path, vec![entry("a", Some("value"))]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE + 5] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(Segment::open(&path), Err(StorageError::Corrupted(_))));

        std::fs::write(&path, b"DRSG").unwrap();
        assert!(matches!(Segment::open(&path), Err(StorageError::Corrupted(_))));
    }
}
