//! Error types for dynrec-record

use thiserror::Error;

/// Record access errors
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Field not found: {message}.{field}")]
    FieldNotFound { message: String, field: String },

    #[error("Field index {index} out of range for {message}")]
    FieldIndexOutOfRange { message: String, index: usize },

    #[error("Type mismatch for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Descriptor mismatch: expected {expected}, got {actual}")]
    DescriptorMismatch { expected: String, actual: String },

    #[error("Unknown message type: {0}")]
    UnknownMessage(String),
}

impl RecordError {
    /// True for lookup failures (unknown field, index or message)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RecordError::FieldNotFound { .. }
                | RecordError::FieldIndexOutOfRange { .. }
                | RecordError::UnknownMessage(_)
        )
    }

    /// True for value kind mismatches
    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            RecordError::TypeMismatch { .. } | RecordError::DescriptorMismatch { .. }
        )
    }
}

/// Result type alias for record operations
pub type Result<T> = std::result::Result<T, RecordError>;
