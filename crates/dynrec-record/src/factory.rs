//! Record factory with a per-type prototype cache

use crate::error::{RecordError, Result};
use crate::record::DynamicRecord;
use dashmap::DashMap;
use dynrec_schema::{DescriptorPool, MessageDescriptor};
use std::sync::Arc;

/// Produces empty record instances for message descriptors
///
/// One prototype is cached per message full name; `new_instance` clones it.
#[derive(Default)]
pub struct RecordFactory {
    prototypes: DashMap<String, DynamicRecord>,
    pool: Option<Arc<DescriptorPool>>,
}

impl RecordFactory {
    /// Create a factory that only works from explicit descriptors
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory that can also resolve message names through `pool`
    pub fn with_pool(pool: Arc<DescriptorPool>) -> Self {
        Self {
            prototypes: DashMap::new(),
            pool: Some(pool),
        }
    }

    /// Get (or build and cache) the prototype for a descriptor
    pub fn prototype(&self, descriptor: &Arc<MessageDescriptor>) -> DynamicRecord {
        if let Some(prototype) = self.prototypes.get(descriptor.full_name()) {
            if prototype.descriptor() == descriptor {
                return prototype.clone();
            }
        }

        let prototype = DynamicRecord::new(Arc::clone(descriptor));
        self.prototypes
            .insert(descriptor.full_name().to_string(), prototype.clone());
        prototype
    }

    /// New empty record for a descriptor
    pub fn new_instance(&self, descriptor: &Arc<MessageDescriptor>) -> DynamicRecord {
        self.prototype(descriptor)
    }

    /// New empty record for a message registered in the factory's pool
    pub fn new_instance_by_name(&self, name: &str) -> Result<DynamicRecord> {
        let descriptor = self
            .pool
            .as_ref()
            .and_then(|pool| pool.find_message(name))
            .ok_or_else(|| RecordError::UnknownMessage(name.to_string()))?;
        Ok(self.prototype(&descriptor))
    }

    /// Number of cached prototypes
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
