//! Descriptor types
//!
//! Two layers, mirroring how a schema moves through the compiler:
//! - `*Proto` structs: the raw parse result, one-to-one with the schema text
//! - `FileDescriptor` / `MessageDescriptor` / `FieldDescriptor`: resolved,
//!   immutable and indexed for lookup by name and by tag

use crate::error::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Smallest valid field tag
pub const MIN_FIELD_NUMBER: u32 = 1;

/// Largest valid field tag (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Tags reserved for the wire format implementation
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<u32> = 19_000..=19_999;

/// Primitive kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl FieldKind {
    /// All supported kinds
    pub const ALL: [FieldKind; 15] = [
        FieldKind::Double,
        FieldKind::Float,
        FieldKind::Int32,
        FieldKind::Int64,
        FieldKind::Uint32,
        FieldKind::Uint64,
        FieldKind::Sint32,
        FieldKind::Sint64,
        FieldKind::Fixed32,
        FieldKind::Fixed64,
        FieldKind::Sfixed32,
        FieldKind::Sfixed64,
        FieldKind::Bool,
        FieldKind::String,
        FieldKind::Bytes,
    ];

    /// Keyword used for this kind in schema text
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Uint32 => "uint32",
            FieldKind::Uint64 => "uint64",
            FieldKind::Sint32 => "sint32",
            FieldKind::Sint64 => "sint64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::Sfixed32 => "sfixed32",
            FieldKind::Sfixed64 => "sfixed64",
            FieldKind::Bool => "bool",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
        }
    }

    /// Look up a kind by its schema keyword
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// True for kinds holding a signed integer
    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            FieldKind::Int32
                | FieldKind::Int64
                | FieldKind::Sint32
                | FieldKind::Sint64
                | FieldKind::Sfixed32
                | FieldKind::Sfixed64
        )
    }

    /// True for kinds holding an unsigned integer
    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            FieldKind::Uint32 | FieldKind::Uint64 | FieldKind::Fixed32 | FieldKind::Fixed64
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Syntax marker declared at the top of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Syntax {
    Proto2,
    #[default]
    Proto3,
}

impl Syntax {
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

/// Parsed field declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptorProto {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
}

/// Parsed message block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DescriptorProto {
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<FieldDescriptorProto>,
}

/// Parsed schema file
///
/// The grammar has no file name, so `name` stays `None` after parsing until
/// the caller assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileDescriptorProto {
    pub name: Option<String>,
    pub syntax: Syntax,
    pub package: Option<String>,
    pub messages: Vec<DescriptorProto>,
}

impl FileDescriptorProto {
    /// Whether a message with the given short or qualified name is declared
    pub fn has_message(&self, name: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.name == name || qualify(self.package.as_deref(), &m.name) == name)
    }
}

/// Resolved field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    kind: FieldKind,
    index: usize,
}

impl FieldDescriptor {
    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field tag
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Primitive kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Position of this field within its message (tag order)
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Resolved message type
///
/// Fields are stored in ascending tag order; the name and tag indexes both
/// point into the same vector, so either lookup yields the same object.
#[derive(Debug, PartialEq, Eq)]
pub struct MessageDescriptor {
    name: String,
    full_name: String,
    file_name: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    by_number: HashMap<u32, usize>,
}

impl MessageDescriptor {
    pub(crate) fn build(
        proto: &DescriptorProto,
        package: Option<&str>,
        file_name: &str,
    ) -> Result<Self> {
        let mut sorted: Vec<&FieldDescriptorProto> = proto.fields.iter().collect();
        sorted.sort_by_key(|f| f.number);

        let mut fields = Vec::with_capacity(sorted.len());
        let mut by_name = HashMap::with_capacity(sorted.len());
        let mut by_number = HashMap::with_capacity(sorted.len());

        for (index, field) in sorted.into_iter().enumerate() {
            validate_number(&proto.name, field)?;
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(SchemaError::Invalid(format!(
                    "duplicate field name {}.{}",
                    proto.name, field.name
                )));
            }
            if by_number.insert(field.number, index).is_some() {
                return Err(SchemaError::Invalid(format!(
                    "duplicate field number {} in {}",
                    field.number, proto.name
                )));
            }
            fields.push(FieldDescriptor {
                name: field.name.clone(),
                number: field.number,
                kind: field.kind,
                index,
            });
        }

        Ok(Self {
            name: proto.name.clone(),
            full_name: qualify(package, &proto.name),
            file_name: file_name.to_string(),
            fields,
            by_name,
            by_number,
        })
    }

    /// Short message name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package-qualified name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Name of the file this message was registered under
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// All fields in ascending tag order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of declared fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field at a position in tag order
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Find a field by name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Find a field by tag
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    /// Find a field by name, failing with a lookup error
    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field_by_name(name)
            .ok_or_else(|| SchemaError::FieldNotFound {
                message: self.full_name.clone(),
                field: name.to_string(),
            })
    }

    /// Render this message back to schema text
    pub fn to_schema_text(&self) -> String {
        let mut out = format!("message {} {{\n", self.name);
        for field in &self.fields {
            out.push_str(&format!(
                "    {} {} = {};\n",
                field.kind, field.name, field.number
            ));
        }
        out.push('}');
        out
    }
}

/// Resolved schema file
#[derive(Debug)]
pub struct FileDescriptor {
    name: String,
    syntax: Syntax,
    package: Option<String>,
    messages: Vec<Arc<MessageDescriptor>>,
}

impl FileDescriptor {
    pub(crate) fn build(proto: &FileDescriptorProto) -> Result<Self> {
        let name = proto
            .name
            .clone()
            .ok_or_else(|| SchemaError::Invalid("file descriptor has no name".to_string()))?;

        let mut messages: Vec<Arc<MessageDescriptor>> = Vec::with_capacity(proto.messages.len());
        for message in &proto.messages {
            if messages.iter().any(|m| m.name == message.name) {
                return Err(SchemaError::Invalid(format!(
                    "duplicate message name {}",
                    message.name
                )));
            }
            messages.push(Arc::new(MessageDescriptor::build(
                message,
                proto.package.as_deref(),
                &name,
            )?));
        }

        Ok(Self {
            name,
            syntax: proto.syntax,
            package: proto.package.clone(),
            messages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Messages in declaration order
    pub fn messages(&self) -> &[Arc<MessageDescriptor>] {
        &self.messages
    }

    /// Find a message by short or package-qualified name
    pub fn find_message_type_by_name(&self, name: &str) -> Option<Arc<MessageDescriptor>> {
        self.messages
            .iter()
            .find(|m| m.name == name || m.full_name == name)
            .cloned()
    }
}

fn qualify(package: Option<&str>, name: &str) -> String {
    match package {
        Some(pkg) if !pkg.is_empty() => format!("{}.{}", pkg, name),
        _ => name.to_string(),
    }
}

fn validate_number(message: &str, field: &FieldDescriptorProto) -> Result<()> {
    if field.number < MIN_FIELD_NUMBER || field.number > MAX_FIELD_NUMBER {
        return Err(SchemaError::Invalid(format!(
            "field {}.{} has out-of-range number {}",
            message, field.name, field.number
        )));
    }
    if RESERVED_FIELD_NUMBERS.contains(&field.number) {
        return Err(SchemaError::Invalid(format!(
            "field {}.{} uses reserved number {}",
            message, field.name, field.number
        )));
    }
    Ok(())
}
