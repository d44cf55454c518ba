//! Field values held by dynamic records

use dynrec_schema::FieldKind;
use std::fmt;

/// A typed field value
///
/// One variant per in-memory representation. Several schema kinds share a
/// representation: `int32`, `sint32` and `sfixed32` all hold `Int32`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Default (zero) value for a field kind
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => Value::Int32(0),
            FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => Value::Int64(0),
            FieldKind::Uint32 | FieldKind::Fixed32 => Value::Uint32(0),
            FieldKind::Uint64 | FieldKind::Fixed64 => Value::Uint64(0),
            FieldKind::Float => Value::Float(0.0),
            FieldKind::Double => Value::Double(0.0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Bytes => Value::Bytes(Vec::new()),
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Uint32(_) => "uint32",
            Value::Uint64(_) => "uint64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Whether this value can be stored in a field of `kind` as-is
    pub fn matches_kind(&self, kind: FieldKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&Value::default_for(kind))
    }

    /// Reinterpret the bit pattern of an integer for a field of `kind`
    ///
    /// Only same-width integer conversions are defined (`i32 <-> u32`,
    /// `i64 <-> u64`); values already matching `kind` pass through unchanged.
    /// Returns `None` for every other combination.
    pub fn reinterpret(self, kind: FieldKind) -> Option<Value> {
        if self.matches_kind(kind) {
            return Some(self);
        }
        match (self, Value::default_for(kind)) {
            (Value::Int32(v), Value::Uint32(_)) => Some(Value::Uint32(v as u32)),
            (Value::Uint32(v), Value::Int32(_)) => Some(Value::Int32(v as i32)),
            (Value::Int64(v), Value::Uint64(_)) => Some(Value::Uint64(v as u64)),
            (Value::Uint64(v), Value::Int64(_)) => Some(Value::Int64(v as i64)),
            _ => None,
        }
    }

    /// Try to convert to i64 without loss
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::Uint32(v) => Some(*v as i64),
            Value::Uint64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to convert to u64 without loss
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint32(v) => Some(*v as u64),
            Value::Uint64(v) => Some(*v),
            Value::Int32(v) => u64::try_from(*v).ok(),
            Value::Int64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Uint32(v) => Some(*v as f64),
            Value::Uint64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as byte slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Uint32(v) => write!(f, "{}", v),
            Value::Uint64(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "\"{}\"", b.escape_ascii()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}
