//! Dynamic record instances
//!
//! A `DynamicRecord` is a mutable value conforming to one `MessageDescriptor`.
//! Field access goes through the descriptor's name or tag table once and then
//! operates on a slot indexed by the field's position, so there is no
//! reflection beyond a hash lookup.

use crate::error::{RecordError, Result};
use crate::value::Value;
use dynrec_schema::{FieldDescriptor, MessageDescriptor};
use std::fmt;
use std::sync::Arc;

/// A record whose shape is only known at run time
#[derive(Debug, Clone)]
pub struct DynamicRecord {
    descriptor: Arc<MessageDescriptor>,
    /// One slot per field, in descriptor order. Empty until the first set.
    values: Vec<Option<Value>>,
}

impl DynamicRecord {
    /// Create an empty record; nothing is allocated per field
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            values: Vec::new(),
        }
    }

    /// Descriptor this record conforms to
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.descriptor
            .field_by_name(name)
            .ok_or_else(|| RecordError::FieldNotFound {
                message: self.descriptor.full_name().to_string(),
                field: name.to_string(),
            })
    }

    fn field_at(&self, index: usize) -> Result<&FieldDescriptor> {
        self.descriptor
            .field(index)
            .ok_or_else(|| RecordError::FieldIndexOutOfRange {
                message: self.descriptor.full_name().to_string(),
                index,
            })
    }

    fn slot(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    fn store(&mut self, index: usize, value: Value) {
        if self.values.is_empty() {
            self.values.resize(self.descriptor.field_count(), None);
        }
        self.values[index] = Some(value);
    }

    fn checked(field: &FieldDescriptor, value: Value) -> Result<Value> {
        if value.matches_kind(field.kind()) {
            Ok(value)
        } else {
            Err(RecordError::TypeMismatch {
                field: field.name().to_string(),
                expected: field.kind().to_string(),
                actual: value.type_name().to_string(),
            })
        }
    }

    /// Get a field's value, or its default if unset
    pub fn get(&self, name: &str) -> Result<Value> {
        let field = self.field(name)?;
        Ok(self
            .slot(field.index())
            .cloned()
            .unwrap_or_else(|| Value::default_for(field.kind())))
    }

    /// Get a field's value, `None` if unset
    pub fn get_opt(&self, name: &str) -> Result<Option<&Value>> {
        let field = self.field(name)?;
        Ok(self.slot(field.index()))
    }

    /// Get a field's value by descriptor index, or its default if unset
    pub fn get_by_index(&self, index: usize) -> Result<Value> {
        let field = self.field_at(index)?;
        Ok(self
            .slot(index)
            .cloned()
            .unwrap_or_else(|| Value::default_for(field.kind())))
    }

    /// Set a field; the value must match the field's kind exactly
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let field = self.field(name)?;
        let index = field.index();
        let value = Self::checked(field, value.into())?;
        self.store(index, value);
        Ok(())
    }

    /// Set a field by descriptor index
    pub fn set_by_index(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let field = self.field_at(index)?;
        let value = Self::checked(field, value.into())?;
        self.store(index, value);
        Ok(())
    }

    /// Set a field, reinterpreting the bits of a same-width integer
    ///
    /// `int32 -1` stored into a `uint32` field becomes `4294967295`. No range
    /// check is made; conversions across widths or families still fail.
    pub fn set_reinterpret(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let field = self.field(name)?;
        let index = field.index();
        let kind = field.kind();
        let value = value.into();
        let actual = value.type_name();
        let value = value.reinterpret(kind).ok_or_else(|| RecordError::TypeMismatch {
            field: field.name().to_string(),
            expected: kind.to_string(),
            actual: actual.to_string(),
        })?;
        self.store(index, value);
        Ok(())
    }

    /// Whether a field has been set
    pub fn has(&self, name: &str) -> Result<bool> {
        let field = self.field(name)?;
        Ok(self.slot(field.index()).is_some())
    }

    /// Reset a field to unset
    pub fn clear(&mut self, name: &str) -> Result<()> {
        let index = self.field(name)?.index();
        if let Some(slot) = self.values.get_mut(index) {
            *slot = None;
        }
        Ok(())
    }

    /// Reset every field to unset
    pub fn clear_all(&mut self) {
        self.values.clear();
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Set fields in ascending tag order
    pub fn set_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> + '_ {
        self.descriptor
            .fields()
            .iter()
            .filter_map(move |field| self.slot(field.index()).map(|value| (field, value)))
    }
}

impl PartialEq for DynamicRecord {
    fn eq(&self, other: &Self) -> bool {
        if self.descriptor != other.descriptor {
            return false;
        }
        (0..self.descriptor.field_count()).all(|i| self.slot(i) == other.slot(i))
    }
}

impl fmt::Display for DynamicRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, value) in self.set_fields() {
            writeln!(f, "{}: {}", field.name(), value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynrec_schema::SchemaCompiler;

    fn descriptor() -> Arc<MessageDescriptor> {
        SchemaCompiler::new()
            .compile(
                "syntax = \"proto3\"; message R { uint32 a = 1; int32 b = 2; string note = 5; }",
                "R",
            )
            .unwrap()
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = DynamicRecord::new(descriptor());
        assert!(record.is_empty());
        assert_eq!(record.get("a").unwrap(), Value::Uint32(0));
        assert_eq!(record.get_opt("b").unwrap(), None);
        assert!(!record.has("note").unwrap());
        assert_eq!(record.to_string(), "");
    }

    #[test]
    fn test_set_and_get() {
        let mut record = DynamicRecord::new(descriptor());
        record.set("a", 7u32).unwrap();
        record.set("b", -3).unwrap();

        assert_eq!(record.get("a").unwrap(), Value::Uint32(7));
        assert_eq!(record.get("b").unwrap(), Value::Int32(-3));
        assert!(record.has("a").unwrap());
        assert!(!record.is_empty());
    }

    #[test]
    fn test_unknown_field() {
        let mut record = DynamicRecord::new(descriptor());
        let err = record.set("missing", 1).unwrap_err();
        assert!(err.is_not_found());
        assert!(record.get("missing").unwrap_err().is_not_found());
        assert!(record.get_by_index(3).unwrap_err().is_not_found());
    }

    #[test]
    fn test_strict_set_rejects_sign_crossing() {
        let mut record = DynamicRecord::new(descriptor());
        let err = record.set("a", -1).unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(record.set("b", 1u32).unwrap_err().is_type_mismatch());
        assert!(record.set("note", 1).unwrap_err().is_type_mismatch());
        assert!(record.is_empty());
    }

    #[test]
    fn test_set_reinterpret() {
        let mut record = DynamicRecord::new(descriptor());
        record.set_reinterpret("a", -1).unwrap();
        assert_eq!(record.get("a").unwrap(), Value::Uint32(4_294_967_295));

        record.set_reinterpret("b", u32::MAX).unwrap();
        assert_eq!(record.get("b").unwrap(), Value::Int32(-1));

        assert!(record.set_reinterpret("a", -1i64).unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_index_access_matches_name_access() {
        let mut record = DynamicRecord::new(descriptor());
        let index = record.descriptor().field_by_name("note").unwrap().index();
        record.set_by_index(index, "hi").unwrap();
        assert_eq!(record.get("note").unwrap(), Value::from("hi"));
        assert_eq!(record.get_by_index(index).unwrap(), Value::from("hi"));
    }

    #[test]
    fn test_clear() {
        let mut record = DynamicRecord::new(descriptor());
        record.set("a", 1u32).unwrap();
        record.set("b", 2).unwrap();

        record.clear("a").unwrap();
        assert!(!record.has("a").unwrap());
        assert!(record.has("b").unwrap());

        record.clear_all();
        assert!(record.is_empty());
        // Clearing an untouched record is a no-op
        record.clear("b").unwrap();
    }

    #[test]
    fn test_set_fields_in_tag_order_and_display() {
        let mut record = DynamicRecord::new(descriptor());
        record.set("note", "x").unwrap();
        record.set("b", -3).unwrap();
        record.set("a", 7u32).unwrap();

        let names: Vec<_> = record.set_fields().map(|(f, _)| f.name()).collect();
        assert_eq!(names, vec!["a", "b", "note"]);
        assert_eq!(record.to_string(), "a: 7\nb: -3\nnote: \"x\"\n");
    }

    #[test]
    fn test_equality_ignores_allocation() {
        let descriptor = descriptor();
        let mut a = DynamicRecord::new(Arc::clone(&descriptor));
        let b = DynamicRecord::new(Arc::clone(&descriptor));
        a.set("a", 1u32).unwrap();
        a.clear("a").unwrap();
        assert_eq!(a, b);

        a.set("b", 0).unwrap();
        assert_ne!(a, b);
    }
}
