//! Store - namespaced, key-ordered persistent store
//!
//! Write path: WAL -> namespace memtable.
//! Read path: memtable, then segments newest first.
//! `flush` turns every non-empty memtable into a new segment, records it in
//! the manifest and drops the WAL files it covers.
//!
//! A store directory must only be opened by one `Store` at a time; nothing
//! here enforces that across processes.

use crate::error::{Result, StorageError};
use crate::manifest::{segment_file_name, Manifest, DEFAULT_NAMESPACE};
use crate::memtable::MemTable;
use crate::options::{StoreOptions, WriteOptions};
use crate::segment::{Segment, SegmentWriter};
use crate::wal::{WalOp, WalReader, WalRecord, WalWriter};
use parking_lot::{Mutex, RwLock};
use std::collections::{btree_map, BTreeMap, HashMap};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const WAL_DIR: &str = "wal";
const SEGMENTS_DIR: &str = "segments";

/// In-memory state of one namespace
struct Namespace {
    id: u32,
    name: String,
    memtable: MemTable,
    /// Oldest first
    segments: RwLock<Vec<Arc<Segment>>>,
}

impl Namespace {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(value) = self.memtable.get(key) {
            return value;
        }
        // Memtable is checked first: a concurrent flush publishes the segment
        // before clearing the memtable, so the key is in at least one of them
        for segment in self.segments.read().iter().rev() {
            if let Some(value) = segment.get(key) {
                return value;
            }
        }
        None
    }

    fn merged(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let recent = self.memtable.snapshot();
        let segments = self.segments.read().clone();

        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for segment in &segments {
            for (key, value) in segment.entries() {
                merged.insert(key.to_vec(), value.map(<[u8]>::to_vec));
            }
        }
        merged.extend(recent);

        merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    }
}

/// A persistent key-value store with isolated namespaces
pub struct Store {
    path: PathBuf,
    options: StoreOptions,
    manifest: Mutex<Manifest>,
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
    /// `None` when opened read-only
    wal: Option<WalWriter>,
    /// Serializes writes with each other and with flushes
    write_lock: Mutex<()>,
    closed: bool,
}

impl Store {
    /// Create a new store at `path` with default options
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_options(path, StoreOptions::default())
    }

    /// Create a new store; fails if one already exists at `path`
    pub fn create_with_options(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if Manifest::exists(&path) {
            return Err(StorageError::StoreExists(path.display().to_string()));
        }

        std::fs::create_dir_all(path.join(WAL_DIR))?;
        std::fs::create_dir_all(path.join(SEGMENTS_DIR))?;
        let manifest = Manifest::new();
        manifest.save(&path)?;

        info!("Created store at {}", path.display());
        Self::load(path, manifest, options, false)
    }

    /// Open an existing store with default options
    ///
    /// Every name in `namespaces` must already exist. The default namespace
    /// always does.
    pub fn open(path: impl AsRef<Path>, namespaces: &[&str]) -> Result<Self> {
        Self::open_with_options(path, namespaces, StoreOptions::default())
    }

    /// Open an existing store
    pub fn open_with_options(
        path: impl AsRef<Path>,
        namespaces: &[&str],
        options: StoreOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manifest = Self::load_manifest(&path, namespaces)?;
        Self::load(path, manifest, options, false)
    }

    /// Open an existing store for reading only
    ///
    /// Sees the segments and WAL as they are at open time. Writes, namespace
    /// creation and flushes fail with `ReadOnly`.
    pub fn open_read_only(path: impl AsRef<Path>, namespaces: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manifest = Self::load_manifest(&path, namespaces)?;
        Self::load(path, manifest, StoreOptions::default(), true)
    }

    fn load_manifest(path: &Path, namespaces: &[&str]) -> Result<Manifest> {
        let manifest = Manifest::load(path)?;
        for name in namespaces {
            if manifest.namespace(name).is_none() {
                return Err(StorageError::NamespaceNotFound(name.to_string()));
            }
        }
        Ok(manifest)
    }

    fn load(path: PathBuf, manifest: Manifest, options: StoreOptions, read_only: bool) -> Result<Self> {
        let segments_dir = path.join(SEGMENTS_DIR);
        let mut namespaces = HashMap::new();
        for entry in &manifest.namespaces {
            let segments = entry
                .segments
                .iter()
                .map(|seq| {
                    Segment::open(segments_dir.join(segment_file_name(entry.id, *seq))).map(Arc::new)
                })
                .collect::<Result<Vec<_>>>()?;
            namespaces.insert(
                entry.name.clone(),
                Arc::new(Namespace {
                    id: entry.id,
                    name: entry.name.clone(),
                    memtable: MemTable::new(),
                    segments: RwLock::new(segments),
                }),
            );
        }

        let wal_dir = path.join(WAL_DIR);
        let next_sequence = Self::replay_wal(&wal_dir, &namespaces)?;

        let wal = if read_only {
            None
        } else {
            Some(
                WalWriter::new(&wal_dir, options.wal_durability)?
                    .with_max_file_size(options.max_wal_file_size)
                    .with_start_sequence(next_sequence),
            )
        };

        info!(
            "Opened store at {} with {} namespace(s){}",
            path.display(),
            namespaces.len(),
            if read_only { " (read-only)" } else { "" }
        );

        Ok(Self {
            path,
            options,
            manifest: Mutex::new(manifest),
            namespaces: RwLock::new(namespaces),
            wal,
            write_lock: Mutex::new(()),
            closed: false,
        })
    }

    /// Apply logged writes to the memtables, returning the next WAL sequence
    fn replay_wal(wal_dir: &Path, namespaces: &HashMap<String, Arc<Namespace>>) -> Result<u64> {
        let by_id: HashMap<u32, &Arc<Namespace>> =
            namespaces.values().map(|ns| (ns.id, ns)).collect();

        let mut next_sequence = 0;
        let mut replayed = 0usize;
        for entry in WalReader::new(wal_dir).read_all()? {
            next_sequence = entry.sequence + 1;
            for record in entry.records {
                let Some(ns) = by_id.get(&record.namespace) else {
                    warn!(
                        "Skipping WAL record for unknown namespace id {}",
                        record.namespace
                    );
                    continue;
                };
                match record.op {
                    WalOp::Put { key, value } => ns.memtable.put(key, value),
                    WalOp::Delete { key } => ns.memtable.delete(key),
                }
                replayed += 1;
            }
        }

        if replayed > 0 {
            info!("Replayed {} WAL record(s)", replayed);
        }
        Ok(next_sequence)
    }

    /// Store directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options the store was opened with
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Whether writes are rejected
    pub fn is_read_only(&self) -> bool {
        self.wal.is_none()
    }

    fn wal(&self) -> Result<&WalWriter> {
        self.wal.as_ref().ok_or(StorageError::ReadOnly)
    }

    fn lookup(&self, name: &str) -> Result<Arc<Namespace>> {
        self.namespaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NamespaceNotFound(name.to_string()))
    }

    /// Add a new, empty namespace
    pub fn create_namespace(&self, name: &str) -> Result<ColumnFamily<'_>> {
        self.wal()?;

        let mut manifest = self.manifest.lock();
        let mut staged = manifest.clone();
        let id = staged.add_namespace(name)?;
        staged.save(&self.path)?;
        *manifest = staged;

        let ns = Arc::new(Namespace {
            id,
            name: name.to_string(),
            memtable: MemTable::new(),
            segments: RwLock::new(Vec::new()),
        });
        self.namespaces
            .write()
            .insert(name.to_string(), Arc::clone(&ns));

        info!("Created namespace {} (id {})", name, id);
        Ok(ColumnFamily { store: self, ns })
    }

    /// Handle to an existing namespace
    pub fn namespace(&self, name: &str) -> Result<ColumnFamily<'_>> {
        Ok(ColumnFamily {
            store: self,
            ns: self.lookup(name)?,
        })
    }

    /// Handle to the default namespace
    pub fn default_namespace(&self) -> Result<ColumnFamily<'_>> {
        self.namespace(DEFAULT_NAMESPACE)
    }

    /// Names of all namespaces, sorted
    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Write a value, last write wins
    pub fn put(&self, namespace: &str, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.namespace(namespace)?.put(key, value)
    }

    /// Write a value with explicit options
    pub fn put_opt(
        &self,
        namespace: &str,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: WriteOptions,
    ) -> Result<()> {
        self.namespace(namespace)?.put_opt(key, value, options)
    }

    /// Read a value; fails with `KeyNotFound` if absent
    pub fn get(&self, namespace: &str, key: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        self.namespace(namespace)?.get(key)
    }

    /// Read a value, `None` if absent
    pub fn get_opt(&self, namespace: &str, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.namespace(namespace)?.get_opt(key)
    }

    /// Remove a key
    pub fn delete(&self, namespace: &str, key: impl AsRef<[u8]>) -> Result<()> {
        self.namespace(namespace)?.delete(key)
    }

    /// Iterate a namespace in key order
    pub fn iter(&self, namespace: &str) -> Result<StoreIter<'_>> {
        Ok(self.namespace(namespace)?.iter())
    }

    fn write(&self, ns: &Namespace, op: WalOp, options: WriteOptions) -> Result<()> {
        let wal = self.wal()?;
        {
            let _guard = self.write_lock.lock();
            let record = WalRecord {
                namespace: ns.id,
                op,
            };
            if !options.disable_wal {
                wal.write(std::slice::from_ref(&record))?;
                if options.sync {
                    wal.sync()?;
                }
            }
            match record.op {
                WalOp::Put { key, value } => ns.memtable.put(key, value),
                WalOp::Delete { key } => ns.memtable.delete(key),
            }
        }

        // The write is applied at this point; a failed flush leaves it buffered
        if self.options.memtable_flush_bytes > 0
            && self.memtable_size() >= self.options.memtable_flush_bytes
        {
            if let Err(e) = self.flush() {
                warn!("Automatic flush of {} failed: {}", self.path.display(), e);
            }
        }
        Ok(())
    }

    /// Bytes buffered across all memtables
    pub fn memtable_size(&self) -> usize {
        self.namespaces
            .read()
            .values()
            .map(|ns| ns.memtable.size())
            .sum()
    }

    /// Write all memtables to segments and truncate the WAL
    pub fn flush(&self) -> Result<()> {
        let wal = self.wal()?;
        let _guard = self.write_lock.lock();

        let mut manifest = self.manifest.lock();
        let namespaces: Vec<Arc<Namespace>> = self.namespaces.read().values().cloned().collect();

        let mut staged = manifest.clone();
        let mut flushed = Vec::new();
        for ns in namespaces.iter().filter(|ns| !ns.memtable.is_empty()) {
            let seq = staged.allocate_segment_seq();
            let path = self
                .path
                .join(SEGMENTS_DIR)
                .join(segment_file_name(ns.id, seq));
            let meta = SegmentWriter::write(&path, ns.memtable.snapshot())?;
            staged.add_segment(ns.id, seq)?;
            debug!(
                "Flushed {} entries of namespace {} to {}",
                meta.entry_count,
                ns.name,
                path.display()
            );
            flushed.push((Arc::clone(ns), Arc::new(Segment::open(&path)?)));
        }

        if flushed.is_empty() {
            return Ok(());
        }

        staged.save(&self.path)?;
        *manifest = staged;

        // Publish the segment before dropping the memtable copy
        for (ns, segment) in &flushed {
            ns.segments.write().push(Arc::clone(segment));
            ns.memtable.clear();
        }

        let keep_from = wal.rotate()?;
        WalReader::new(wal.dir()).remove_files_before(keep_from)?;

        info!("Flushed {} namespace(s) to segments", flushed.len());
        Ok(())
    }

    /// fsync the WAL
    pub fn sync(&self) -> Result<()> {
        self.wal()?.sync()
    }

    fn shutdown(&self) -> Result<()> {
        if !self.is_read_only() {
            self.flush()?;
            self.sync()?;
        }
        info!("Closed store at {}", self.path.display());
        Ok(())
    }

    /// Flush and release the store
    ///
    /// Writes made with `disable_wal` become durable here.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.shutdown()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.shutdown() {
            error!("Failed to flush store at {} on drop: {}", self.path.display(), e);
        }
    }
}

/// Handle to one namespace, valid while the store is borrowed
#[derive(Clone)]
pub struct ColumnFamily<'a> {
    store: &'a Store,
    ns: Arc<Namespace>,
}

impl<'a> ColumnFamily<'a> {
    /// Namespace name
    pub fn name(&self) -> &str {
        &self.ns.name
    }

    /// Namespace id in the manifest
    pub fn id(&self) -> u32 {
        self.ns.id
    }

    /// Write a value, last write wins
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_opt(key, value, WriteOptions::default())
    }

    /// Write a value with explicit options
    pub fn put_opt(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: WriteOptions,
    ) -> Result<()> {
        let op = WalOp::Put {
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        };
        self.store.write(&self.ns, op, options)
    }

    /// Remove a key
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        let op = WalOp::Delete {
            key: key.as_ref().to_vec(),
        };
        self.store.write(&self.ns, op, WriteOptions::default())
    }

    /// Read a value; fails with `KeyNotFound` if absent
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        self.get_opt(key)?.ok_or_else(|| StorageError::KeyNotFound {
            namespace: self.ns.name.clone(),
        })
    }

    /// Read a value, `None` if absent
    pub fn get_opt(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        Ok(self.ns.get(key.as_ref()))
    }

    /// Iterate live keys in order
    pub fn iter(&self) -> StoreIter<'a> {
        StoreIter {
            inner: self.ns.merged().into_iter(),
            _store: PhantomData,
        }
    }
}

/// Ordered iterator over one namespace
///
/// Holds a snapshot taken when it was created; later writes are not seen.
pub struct StoreIter<'a> {
    inner: btree_map::IntoIter<Vec<u8>, Vec<u8>>,
    _store: PhantomData<&'a Store>,
}

impl Iterator for StoreIter<'_> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for StoreIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for StoreIter<'_> {}
