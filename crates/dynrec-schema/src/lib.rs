//! Dynrec Schema - Run-time schema compiler
//!
//! Turns schema text into queryable type descriptors:
//! - `Lexer` / `parse_schema`: text -> `FileDescriptorProto`
//! - `DescriptorPool`: append-only registry of resolved files
//! - `SchemaCompiler`: parse + register + resolve in one call
//! - `MessageDescriptor` / `FieldDescriptor`: immutable, indexed by name and tag
//!
//! ```
//! use dynrec_schema::{FieldKind, SchemaCompiler};
//!
//! let compiler = SchemaCompiler::new();
//! let message = compiler
//!     .compile("syntax = \"proto3\"; message R { uint32 a = 1; int32 b = 2; }", "R")
//!     .unwrap();
//! assert_eq!(message.field_by_name("b").unwrap().kind(), FieldKind::Int32);
//! ```

pub mod descriptor;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod pool;

pub use descriptor::{
    DescriptorProto, FieldDescriptor, FieldDescriptorProto, FieldKind, FileDescriptor,
    FileDescriptorProto, MessageDescriptor, Syntax,
};
pub use error::{Result, SchemaError};
pub use parser::parse_schema;
pub use pool::{DescriptorPool, SchemaCompiler};
