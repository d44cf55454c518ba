//! Store manifest
//!
//! The manifest names every namespace and the segments that belong to it.
//! It is rewritten whole on every change: serialized with bincode, written to
//! `MANIFEST.tmp`, synced, then renamed over `MANIFEST`.

use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Manifest file name inside a store directory
pub const MANIFEST_FILE: &str = "MANIFEST";

/// Name of the namespace every store has
pub const DEFAULT_NAMESPACE: &str = "default";

const MANIFEST_MAGIC: [u8; 4] = *b"DRMF";
const MANIFEST_VERSION: u32 = 1;

/// A namespace and its segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEntry {
    pub id: u32,
    pub name: String,
    /// Segment sequence numbers, oldest first
    pub segments: Vec<u64>,
}

/// Persistent description of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub namespaces: Vec<NamespaceEntry>,
    pub next_namespace_id: u32,
    pub next_segment_seq: u64,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            namespaces: vec![NamespaceEntry {
                id: 0,
                name: DEFAULT_NAMESPACE.to_string(),
                segments: Vec::new(),
            }],
            next_namespace_id: 1,
            next_segment_seq: 1,
        }
    }
}

/// File name of a namespace's segment
pub fn segment_file_name(namespace_id: u32, seq: u64) -> String {
    format!("{}_{:08}.seg", namespace_id, seq)
}

impl Manifest {
    /// Manifest for a fresh store, holding only the default namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the manifest inside `dir`
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Whether `dir` holds a store
    pub fn exists(dir: &Path) -> bool {
        Self::path(dir).is_file()
    }

    /// Load the manifest from a store directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        if !path.is_file() {
            return Err(StorageError::StoreNotFound(dir.display().to_string()));
        }

        let bytes = std::fs::read(&path)?;
        if bytes.len() < 8 || bytes[0..4] != MANIFEST_MAGIC {
            return Err(StorageError::Corrupted(format!(
                "invalid manifest header in {}",
                path.display()
            )));
        }

        let stored = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let data = &bytes[8..];
        if crc32fast::hash(data) != stored {
            return Err(StorageError::Corrupted(format!(
                "manifest checksum mismatch in {}",
                path.display()
            )));
        }

        let manifest: Manifest = bincode::deserialize(data)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(StorageError::Corrupted(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        Ok(manifest)
    }

    /// Atomically replace the manifest in `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let data = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(8 + data.len());
        bytes.extend_from_slice(&MANIFEST_MAGIC);
        bytes.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        bytes.extend_from_slice(&data);

        let tmp_path = dir.join(format!("{}.tmp", MANIFEST_FILE));
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, Self::path(dir))?;
        Ok(())
    }

    /// Find a namespace by name
    pub fn namespace(&self, name: &str) -> Option<&NamespaceEntry> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// Add an empty namespace, returning its id
    pub fn add_namespace(&mut self, name: &str) -> Result<u32> {
        if self.namespace(name).is_some() {
            return Err(StorageError::NamespaceExists(name.to_string()));
        }
        let id = self.next_namespace_id;
        self.next_namespace_id += 1;
        self.namespaces.push(NamespaceEntry {
            id,
            name: name.to_string(),
            segments: Vec::new(),
        });
        Ok(id)
    }

    /// Reserve the next segment sequence number
    pub fn allocate_segment_seq(&mut self) -> u64 {
        let seq = self.next_segment_seq;
        self.next_segment_seq += 1;
        seq
    }

    /// Record a new segment for a namespace
    pub fn add_segment(&mut self, namespace_id: u32, seq: u64) -> Result<()> {
        let entry = self
            .namespaces
            .iter_mut()
            .find(|ns| ns.id == namespace_id)
            .ok_or_else(|| StorageError::NamespaceNotFound(format!("id {}", namespace_id)))?;
        entry.segments.push(seq);
        Ok(())
    }
}
