//! Codec error types

use crate::wire::WireType;
use dynrec_record::RecordError;
use thiserror::Error;

/// Decode errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Truncated input: unexpected end of data at offset {offset}")]
    Truncated { offset: usize },

    #[error("Varint overflow at offset {offset}")]
    VarintOverflow { offset: usize },

    #[error("Invalid wire type {0}")]
    InvalidWireType(u8),

    #[error("Invalid field number {0}")]
    InvalidFieldNumber(u64),

    #[error("Wire type mismatch for field {field}: expected {expected}, got {actual}")]
    WireTypeMismatch {
        field: String,
        expected: WireType,
        actual: WireType,
    },

    #[error("Invalid UTF-8 in string field {field}")]
    InvalidUtf8 { field: String },

    #[error("Length {length} exceeds the {available} remaining bytes")]
    LengthOverflow { length: u64, available: usize },

    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

impl CodecError {
    /// True for lookup failures surfaced from the record layer
    pub fn is_not_found(&self) -> bool {
        matches!(self, CodecError::Record(e) if e.is_not_found())
    }

    /// True when the input ended early
    pub fn is_truncated(&self) -> bool {
        matches!(
            self,
            CodecError::Truncated { .. } | CodecError::LengthOverflow { .. }
        )
    }
}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
