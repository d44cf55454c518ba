//! Dataset writer
//!
//! Creates a fresh store, records the metadata under `desc1` in the `desc`
//! namespace, then appends encoded records to the default namespace under
//! keys derived from their zero-based index.
//!
//! Records are written without the WAL by default, like a bulk load: they
//! become durable when the writer finishes. A crash before that may lose them
//! and leaves the dataset partially written; nothing is rolled back.

use crate::error::{DatasetError, Result};
use crate::meta::{metadata_descriptor, DatasetMeta, METADATA_KEY, METADATA_NAMESPACE};
use dynrec_codec::encode;
use dynrec_record::{DynamicRecord, RecordError, RecordFactory};
use dynrec_schema::{MessageDescriptor, SchemaCompiler};
use dynrec_storage::{Store, StoreOptions, WriteOptions, DEFAULT_NAMESPACE};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Store and write settings for a new dataset
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub store: StoreOptions,
    /// Applied to every record and metadata write
    pub write: WriteOptions,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            store: StoreOptions::default(),
            write: WriteOptions::no_wal(),
        }
    }
}

/// Streams records into a new dataset
pub struct DatasetWriter {
    store: Store,
    descriptor: Arc<MessageDescriptor>,
    meta_descriptor: Arc<MessageDescriptor>,
    factory: RecordFactory,
    meta: DatasetMeta,
    write_options: WriteOptions,
    next_index: u64,
}

impl DatasetWriter {
    /// Create a dataset at `path` with default options
    pub fn create(path: impl AsRef<Path>, meta: DatasetMeta) -> Result<Self> {
        Self::create_with_options(path, meta, WriterOptions::default())
    }

    /// Create a dataset at `path`
    ///
    /// Fails if a store already exists there. The schema is compiled before
    /// anything touches the disk.
    pub fn create_with_options(
        path: impl AsRef<Path>,
        meta: DatasetMeta,
        options: WriterOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let record_type = meta.record_type.as_deref().ok_or_else(|| {
            DatasetError::InvalidMetadata("record type is required to write".to_string())
        })?;
        let descriptor = SchemaCompiler::new().compile(&meta.schema_text, record_type)?;
        let meta_descriptor = metadata_descriptor()?;

        let store = Store::create_with_options(path, options.store)?;
        store.create_namespace(METADATA_NAMESPACE)?;

        let mut meta = meta;
        meta.record_count = None;

        let writer = Self {
            store,
            descriptor,
            meta_descriptor,
            factory: RecordFactory::new(),
            meta,
            write_options: options.write,
            next_index: 0,
        };
        writer.write_meta()?;

        info!(
            "Created dataset at {} for record type {}",
            path.display(),
            writer.descriptor.full_name()
        );
        Ok(writer)
    }

    fn write_meta(&self) -> Result<()> {
        let record = self.meta.to_record(&self.meta_descriptor)?;
        self.store.put_opt(
            METADATA_NAMESPACE,
            METADATA_KEY,
            encode(&record),
            self.write_options,
        )?;
        Ok(())
    }

    /// Descriptor of the data records
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Metadata as written so far
    pub fn meta(&self) -> &DatasetMeta {
        &self.meta
    }

    /// Records appended so far
    pub fn len(&self) -> u64 {
        self.next_index
    }

    /// Check if no record was appended
    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Empty record of the dataset's type
    pub fn new_record(&self) -> DynamicRecord {
        self.factory.new_instance(&self.descriptor)
    }

    /// Append a record, returning its index
    pub fn append(&mut self, record: &DynamicRecord) -> Result<u64> {
        if record.descriptor() != &self.descriptor {
            return Err(RecordError::DescriptorMismatch {
                expected: self.descriptor.full_name().to_string(),
                actual: record.descriptor().full_name().to_string(),
            }
            .into());
        }

        let index = self.next_index;
        if !self.meta.key_format.fits(index) {
            return Err(DatasetError::KeyOverflow {
                index,
                width: self.meta.key_format.width(),
            });
        }

        let key = self.meta.key_format.key(index);
        self.store
            .put_opt(DEFAULT_NAMESPACE, &key, encode(record), self.write_options)?;
        debug!("Wrote record {} under key {}", index, key);

        self.next_index += 1;
        Ok(index)
    }

    /// Record the final count and close the store
    pub fn finish(mut self) -> Result<DatasetMeta> {
        self.meta.record_count = Some(self.next_index);
        self.write_meta()?;
        self.store.close()?;

        info!("Finished dataset with {} records", self.next_index);
        Ok(self.meta)
    }
}

/// Write a complete dataset in one call
///
/// `generate` is called `count` times with the record index and an empty
/// record to fill. The first error stops the write.
pub fn write_dataset<F>(
    path: impl AsRef<Path>,
    meta: DatasetMeta,
    count: u64,
    generate: F,
) -> Result<DatasetMeta>
where
    F: FnMut(u64, &mut DynamicRecord) -> dynrec_record::Result<()>,
{
    write_dataset_with_options(path, meta, count, WriterOptions::default(), generate)
}

/// Write a complete dataset with explicit options
pub fn write_dataset_with_options<F>(
    path: impl AsRef<Path>,
    meta: DatasetMeta,
    count: u64,
    options: WriterOptions,
    mut generate: F,
) -> Result<DatasetMeta>
where
    F: FnMut(u64, &mut DynamicRecord) -> dynrec_record::Result<()>,
{
    let mut writer = DatasetWriter::create_with_options(path, meta, options)?;
    for index in 0..count {
        let mut record = writer.new_record();
        generate(index, &mut record)?;
        writer.append(&record)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyFormat;
    use dynrec_codec::decode;
    use dynrec_storage::StorageError;
    use tempfile::TempDir;

    const SCHEMA: &str = "syntax = \"proto3\";\nmessage R { uint32 a = 1; int32 b = 2; }";

    #[test]
    fn test_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ds");
        DatasetWriter::create(&path, DatasetMeta::new(SCHEMA, "R"))
            .unwrap()
            .finish()
            .unwrap();

        let err = DatasetWriter::create(&path, DatasetMeta::new(SCHEMA, "R")).err().unwrap();
        assert!(err.is_already_exists());
        assert!(matches!(
            err,
            DatasetError::Storage(StorageError::StoreExists(_))
        ));
    }

    #[test]
    fn test_bad_schema_leaves_no_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ds");

        let err = DatasetWriter::create(&path, DatasetMeta::new(SCHEMA, "Missing")).err().unwrap();
        assert!(err.is_not_found());
        assert!(!path.exists());
    }

    #[test]
    fn test_append_writes_keys_in_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ds");
        let meta = DatasetMeta::new(SCHEMA, "R").with_key_format(KeyFormat::ZeroPadded { width: 3 });

        let mut writer = DatasetWriter::create(&path, meta).unwrap();
        for i in 0..3u32 {
            let mut record = writer.new_record();
            record.set("a", i).unwrap();
            assert_eq!(writer.append(&record).unwrap(), i as u64);
        }
        assert_eq!(writer.len(), 3);
        let meta = writer.finish().unwrap();
        assert_eq!(meta.record_count, Some(3));

        let store = Store::open(&path, &[DEFAULT_NAMESPACE, METADATA_NAMESPACE]).unwrap();
        let bytes = store.get(DEFAULT_NAMESPACE, "002").unwrap();
        let descriptor = SchemaCompiler::new().compile(SCHEMA, "R").unwrap();
        let record = decode(&bytes, &descriptor).unwrap();
        assert_eq!(record.get("a").unwrap().as_u64(), Some(2));
    }

    #[test]
    fn test_key_overflow() {
        let dir = TempDir::new().unwrap();
        let meta = DatasetMeta::new(SCHEMA, "R").with_key_format(KeyFormat::ZeroPadded { width: 1 });

        let err = write_dataset(dir.path().join("ds"), meta, 11, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, DatasetError::KeyOverflow { index: 10, width: 1 }));
    }

    #[test]
    fn test_foreign_record_rejected() {
        let dir = TempDir::new().unwrap();
        let mut writer = DatasetWriter::create(dir.path().join("ds"), DatasetMeta::new(SCHEMA, "R")).unwrap();

        let other = SchemaCompiler::new()
            .compile("message Q { string s = 1; }", "Q")
            .unwrap();
        let err = writer.append(&DynamicRecord::new(other)).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Record(RecordError::DescriptorMismatch { .. })
        ));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_generator_error_stops_write() {
        let dir = TempDir::new().unwrap();
        let err = write_dataset(dir.path().join("ds"), DatasetMeta::new(SCHEMA, "R"), 5, |i, record| {
            if i == 2 {
                record.set("missing", 1u32)
            } else {
                record.set("a", i as u32)
            }
        })
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_record_type_required() {
        let dir = TempDir::new().unwrap();
        let meta = DatasetMeta {
            schema_text: SCHEMA.to_string(),
            ..DatasetMeta::default()
        };
        assert!(matches!(
            DatasetWriter::create(dir.path().join("ds"), meta),
            Err(DatasetError::InvalidMetadata(_))
        ));
    }
}
