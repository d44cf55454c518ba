//! Dataset metadata record
//!
//! The metadata is itself a dynamic record, compiled from a built-in schema
//! and stored under `desc1` in the `desc` namespace. It carries the schema
//! text of the data records so a reader needs nothing out of band.

use crate::error::{DatasetError, Result};
use crate::key::KeyFormat;
use dynrec_codec::{decode, encode};
use dynrec_record::{DynamicRecord, Value};
use dynrec_schema::{parse_schema, MessageDescriptor, SchemaCompiler};
use std::sync::Arc;

/// Namespace holding the metadata record
pub const METADATA_NAMESPACE: &str = "desc";

/// Key of the metadata record
pub const METADATA_KEY: &str = "desc1";

/// Message name of the metadata schema
pub const DATASET_DESCRIPTOR_TYPE: &str = "DatasetDescriptor";

/// Schema of the metadata record
pub const DATASET_DESCRIPTOR_SCHEMA: &str = r#"syntax = "proto3";

message DatasetDescriptor {
    uint64 start_index = 1;
    uint64 end_index = 2;
    int64 start_timestamp = 3;
    int64 end_timestamp = 4;
    string schema_text = 5;
    string record_type = 6;
    uint64 record_count = 7;
    uint32 key_width = 8;
}
"#;

/// Compile the metadata schema
pub fn metadata_descriptor() -> Result<Arc<MessageDescriptor>> {
    Ok(SchemaCompiler::new().compile(DATASET_DESCRIPTOR_SCHEMA, DATASET_DESCRIPTOR_TYPE)?)
}

/// Description of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetMeta {
    pub start_index: u64,
    pub end_index: u64,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    /// Schema text of the data records
    pub schema_text: String,
    /// Data record message name; older datasets leave it unset
    pub record_type: Option<String>,
    /// Number of data records; unset until the writer finishes
    pub record_count: Option<u64>,
    pub key_format: KeyFormat,
}

impl DatasetMeta {
    /// Metadata for records of `record_type` declared in `schema_text`
    pub fn new(schema_text: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            schema_text: schema_text.into(),
            record_type: Some(record_type.into()),
            ..Self::default()
        }
    }

    pub fn with_index_range(mut self, start: u64, end: u64) -> Self {
        self.start_index = start;
        self.end_index = end;
        self
    }

    pub fn with_time_range(mut self, start: i64, end: i64) -> Self {
        self.start_timestamp = start;
        self.end_timestamp = end;
        self
    }

    pub fn with_key_format(mut self, key_format: KeyFormat) -> Self {
        self.key_format = key_format;
        self
    }

    /// Record type to compile, falling back to the schema's first message
    pub fn resolve_record_type(&self) -> Result<String> {
        if let Some(record_type) = &self.record_type {
            return Ok(record_type.clone());
        }
        let proto = parse_schema(&self.schema_text)?;
        proto
            .messages
            .first()
            .map(|message| message.name.clone())
            .ok_or_else(|| DatasetError::InvalidMetadata("schema declares no message".to_string()))
    }

    /// Build the metadata record
    pub fn to_record(&self, descriptor: &Arc<MessageDescriptor>) -> Result<DynamicRecord> {
        let mut record = DynamicRecord::new(Arc::clone(descriptor));
        record.set("start_index", self.start_index)?;
        record.set("end_index", self.end_index)?;
        record.set("start_timestamp", self.start_timestamp)?;
        record.set("end_timestamp", self.end_timestamp)?;
        record.set("schema_text", self.schema_text.as_str())?;
        if let Some(record_type) = &self.record_type {
            record.set("record_type", record_type.as_str())?;
        }
        if let Some(count) = self.record_count {
            record.set("record_count", count)?;
        }
        if self.key_format != KeyFormat::Decimal {
            record.set("key_width", self.key_format.width())?;
        }
        Ok(record)
    }

    /// Read metadata back from a record
    pub fn from_record(record: &DynamicRecord) -> Result<Self> {
        let schema_text = match record.get_opt("schema_text")? {
            Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
            _ => {
                return Err(DatasetError::InvalidMetadata(
                    "schema_text is missing".to_string(),
                ))
            }
        };

        let record_type = match record.get_opt("record_type")? {
            Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
            _ => None,
        };
        let record_count = record.get_opt("record_count")?.and_then(Value::as_u64);
        let key_width = record
            .get("key_width")?
            .as_u64()
            .and_then(|w| u32::try_from(w).ok())
            .unwrap_or(0);

        Ok(Self {
            start_index: record.get("start_index")?.as_u64().unwrap_or(0),
            end_index: record.get("end_index")?.as_u64().unwrap_or(0),
            start_timestamp: record.get("start_timestamp")?.as_i64().unwrap_or(0),
            end_timestamp: record.get("end_timestamp")?.as_i64().unwrap_or(0),
            schema_text,
            record_type,
            record_count,
            key_format: KeyFormat::from_width(key_width),
        })
    }

    /// Encode as a metadata record
    pub fn encode(&self) -> Result<Vec<u8>> {
        let descriptor = metadata_descriptor()?;
        Ok(encode(&self.to_record(&descriptor)?))
    }

    /// Decode a metadata record
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let descriptor = metadata_descriptor()?;
        Self::from_record(&decode(bytes, &descriptor)?)
    }
}
