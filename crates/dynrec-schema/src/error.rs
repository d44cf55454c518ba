//! Schema error types

use thiserror::Error;

/// Schema compilation and lookup errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Message type not found: {0}")]
    MessageNotFound(String),

    #[error("Field not found: {message}.{field}")]
    FieldNotFound { message: String, field: String },

    #[error("Schema already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid schema: {0}")]
    Invalid(String),
}

impl SchemaError {
    /// Build a parse error at a source position
    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        SchemaError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    /// True for lookup failures (unknown message or field name)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchemaError::MessageNotFound(_) | SchemaError::FieldNotFound { .. }
        )
    }

    /// True when a name was registered twice in the same pool
    pub fn is_already_exists(&self) -> bool {
        matches!(self, SchemaError::AlreadyRegistered(_))
    }
}

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;
