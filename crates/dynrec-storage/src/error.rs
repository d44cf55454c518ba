//! Storage error types

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found in namespace {namespace}")]
    KeyNotFound { namespace: String },

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("No store at {0}")]
    StoreNotFound(String),

    #[error("Store already exists at {0}")]
    StoreExists(String),

    #[error("Namespace already exists: {0}")]
    NamespaceExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store is open read-only")]
    ReadOnly,
}

impl StorageError {
    /// True for a missing key, namespace or store
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::KeyNotFound { .. }
                | StorageError::NamespaceNotFound(_)
                | StorageError::StoreNotFound(_)
        )
    }

    /// True when creating something that already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            StorageError::StoreExists(_) | StorageError::NamespaceExists(_)
        )
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
