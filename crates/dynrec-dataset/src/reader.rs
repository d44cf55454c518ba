//! Dataset reader
//!
//! Opens a dataset store with both namespaces, decodes the metadata record
//! and compiles the embedded schema text to get the data record descriptor.

use crate::error::{DatasetError, Result};
use crate::meta::{DatasetMeta, METADATA_KEY, METADATA_NAMESPACE};
use dynrec_codec::decode;
use dynrec_record::DynamicRecord;
use dynrec_schema::{MessageDescriptor, SchemaCompiler};
use dynrec_storage::{Store, StorageError, DEFAULT_NAMESPACE};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Reads records back from a dataset
pub struct DatasetReader {
    store: Store,
    descriptor: Arc<MessageDescriptor>,
    meta: DatasetMeta,
    len: u64,
}

impl DatasetReader {
    /// Open a dataset
    ///
    /// Fails if the store or either namespace is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Store::open(path.as_ref(), &[DEFAULT_NAMESPACE, METADATA_NAMESPACE])?;
        Self::load(store, &SchemaCompiler::new())
    }

    /// Open a dataset without write access
    ///
    /// Safe next to a live writer in the same process: the reader sees the
    /// records that were logged when it opened.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let store = Store::open_read_only(path.as_ref(), &[DEFAULT_NAMESPACE, METADATA_NAMESPACE])?;
        Self::load(store, &SchemaCompiler::new())
    }

    /// Open a dataset, registering its schema with `compiler`
    pub fn open_with_compiler(path: impl AsRef<Path>, compiler: &SchemaCompiler) -> Result<Self> {
        let store = Store::open(path.as_ref(), &[DEFAULT_NAMESPACE, METADATA_NAMESPACE])?;
        Self::load(store, compiler)
    }

    fn load(store: Store, compiler: &SchemaCompiler) -> Result<Self> {
        let bytes = store
            .get_opt(METADATA_NAMESPACE, METADATA_KEY)?
            .ok_or_else(|| DatasetError::InvalidMetadata(format!("no {} record", METADATA_KEY)))?;
        let meta = DatasetMeta::decode(&bytes)?;

        let record_type = meta.resolve_record_type()?;
        let descriptor = compiler.compile(&meta.schema_text, &record_type)?;

        let len = match meta.record_count {
            Some(count) => count,
            None => Self::probe_len(&store, &meta)?,
        };

        info!(
            "Opened dataset at {} ({} records of {})",
            store.path().display(),
            len,
            descriptor.full_name()
        );
        Ok(Self {
            store,
            descriptor,
            meta,
            len,
        })
    }

    /// Count consecutive records from index 0
    fn probe_len(store: &Store, meta: &DatasetMeta) -> Result<u64> {
        let mut len = 0;
        while store
            .get_opt(DEFAULT_NAMESPACE, meta.key_format.key(len))?
            .is_some()
        {
            len += 1;
        }
        debug!("Dataset has no record count, probed {} records", len);
        Ok(len)
    }

    /// Descriptor compiled from the embedded schema
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Dataset metadata
    pub fn meta(&self) -> &DatasetMeta {
        &self.meta
    }

    /// Number of records
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read and decode one record
    pub fn read_record(&self, index: u64) -> Result<DynamicRecord> {
        if index >= self.len {
            return Err(DatasetError::RecordOutOfRange {
                index,
                len: self.len,
            });
        }

        let key = self.meta.key_format.key(index);
        let bytes = self
            .store
            .get_opt(DEFAULT_NAMESPACE, &key)?
            .ok_or_else(|| StorageError::KeyNotFound {
                namespace: DEFAULT_NAMESPACE.to_string(),
            })?;
        Ok(decode(&bytes, &self.descriptor)?)
    }

    /// All records in index order
    pub fn records(&self) -> impl Iterator<Item = Result<DynamicRecord>> + '_ {
        (0..self.len).map(move |index| self.read_record(index))
    }

    /// Close the underlying store
    pub fn close(self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }
}
