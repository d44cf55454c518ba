//! Dynrec Record - Dynamic record instances
//!
//! Records are built from run-time `MessageDescriptor`s and accessed
//! generically by field name, tag order or descriptor index.
//! `RecordFactory` hands out empty instances from a prototype cache.

pub mod error;
pub mod factory;
pub mod record;
pub mod value;

pub use error::{RecordError, Result};
pub use factory::RecordFactory;
pub use record::DynamicRecord;
pub use value::Value;
