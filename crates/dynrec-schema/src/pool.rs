//! Descriptor pool and schema compiler
//!
//! The pool is an explicitly owned, append-only registry of resolved files.
//! Registration takes the write lock for the whole check-then-insert, so two
//! threads racing to register the same name see exactly one success.

use crate::descriptor::{FileDescriptor, FileDescriptorProto, MessageDescriptor};
use crate::error::{Result, SchemaError};
use crate::parser::parse_schema;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct PoolInner {
    /// File name -> file
    files: HashMap<String, Arc<FileDescriptor>>,
    /// Full message name -> message
    messages: HashMap<String, Arc<MessageDescriptor>>,
}

/// Append-only registry of schema files
#[derive(Default)]
pub struct DescriptorPool {
    inner: RwLock<PoolInner>,
}

impl DescriptorPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and register a parsed file
    ///
    /// Fails if the file has no name, if a file with the same name is already
    /// registered, or if one of its messages collides with a registered one.
    pub fn build_file(&self, proto: FileDescriptorProto) -> Result<Arc<FileDescriptor>> {
        let file = Arc::new(FileDescriptor::build(&proto)?);

        let mut inner = self.inner.write();
        if inner.files.contains_key(file.name()) {
            return Err(SchemaError::AlreadyRegistered(file.name().to_string()));
        }
        for message in file.messages() {
            if inner.messages.contains_key(message.full_name()) {
                return Err(SchemaError::AlreadyRegistered(message.full_name().to_string()));
            }
        }

        for message in file.messages() {
            inner
                .messages
                .insert(message.full_name().to_string(), Arc::clone(message));
        }
        inner.files.insert(file.name().to_string(), Arc::clone(&file));

        debug!(
            "Registered schema file {} with {} message(s)",
            file.name(),
            file.messages().len()
        );
        Ok(file)
    }

    /// Get a registered file by name
    pub fn file(&self, name: &str) -> Option<Arc<FileDescriptor>> {
        self.inner.read().files.get(name).cloned()
    }

    /// Find a message by full name, falling back to a unique short name
    pub fn find_message(&self, name: &str) -> Option<Arc<MessageDescriptor>> {
        let inner = self.inner.read();
        if let Some(message) = inner.messages.get(name) {
            return Some(Arc::clone(message));
        }

        let mut matches = inner.messages.values().filter(|m| m.name() == name);
        match (matches.next(), matches.next()) {
            (Some(message), None) => Some(Arc::clone(message)),
            _ => None,
        }
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compiles schema text into message descriptors registered in a pool
#[derive(Clone, Default)]
pub struct SchemaCompiler {
    pool: Arc<DescriptorPool>,
}

impl SchemaCompiler {
    /// Create a compiler with its own empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler registering into a shared pool
    pub fn with_pool(pool: Arc<DescriptorPool>) -> Self {
        Self { pool }
    }

    /// The pool this compiler registers into
    pub fn pool(&self) -> &Arc<DescriptorPool> {
        &self.pool
    }

    /// Parse, register and resolve `record_type` from `schema_text`
    ///
    /// A schema has no file name of its own; it is registered under
    /// `record_type`, so compiling the same record type twice in one pool
    /// fails with `AlreadyRegistered`.
    pub fn compile(&self, schema_text: &str, record_type: &str) -> Result<Arc<MessageDescriptor>> {
        let mut proto = parse_schema(schema_text)?;

        if !proto.has_message(record_type) {
            return Err(SchemaError::MessageNotFound(record_type.to_string()));
        }

        if proto.name.is_none() {
            proto.name = Some(record_type.to_string());
        }

        let file = self.pool.build_file(proto)?;
        file.find_message_type_by_name(record_type)
            .ok_or_else(|| SchemaError::MessageNotFound(record_type.to_string()))
    }
}
