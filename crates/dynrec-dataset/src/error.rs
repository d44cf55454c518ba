//! Dataset error types

use dynrec_codec::CodecError;
use dynrec_record::RecordError;
use dynrec_schema::SchemaError;
use dynrec_storage::StorageError;
use thiserror::Error;

/// Dataset errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record index {index} out of range (dataset holds {len} records)")]
    RecordOutOfRange { index: u64, len: u64 },

    #[error("Record index {index} does not fit in a {width}-digit key")]
    KeyOverflow { index: u64, width: u32 },

    #[error("Invalid dataset metadata: {0}")]
    InvalidMetadata(String),
}

impl DatasetError {
    /// True for missing keys, namespaces, stores, messages and out-of-range indices
    pub fn is_not_found(&self) -> bool {
        match self {
            DatasetError::Schema(e) => e.is_not_found(),
            DatasetError::Record(e) => e.is_not_found(),
            DatasetError::Codec(e) => e.is_not_found(),
            DatasetError::Storage(e) => e.is_not_found(),
            DatasetError::RecordOutOfRange { .. } => true,
            _ => false,
        }
    }

    /// True when creating something that is already there
    pub fn is_already_exists(&self) -> bool {
        match self {
            DatasetError::Schema(e) => e.is_already_exists(),
            DatasetError::Storage(e) => e.is_already_exists(),
            _ => false,
        }
    }
}

/// Result type alias for dataset operations
pub type Result<T> = std::result::Result<T, DatasetError>;
