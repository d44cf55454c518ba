//! Dynrec Codec - Binary encoding for dynamic records
//!
//! Records are encoded as a sequence of `(tag, wire type, payload)` entries
//! compatible with the Protocol Buffers wire format, so a record written here
//! can be read by any protobuf decoder built from the same schema.
//!
//! ```
//! use dynrec_codec::{decode, encode};
//! use dynrec_record::DynamicRecord;
//! use dynrec_schema::SchemaCompiler;
//!
//! let descriptor = SchemaCompiler::new()
//!     .compile("message R { uint32 a = 1; int32 b = 2; }", "R")
//!     .unwrap();
//! let mut record = DynamicRecord::new(descriptor.clone());
//! record.set("a", 7u32).unwrap();
//! record.set("b", -3).unwrap();
//!
//! let bytes = encode(&record);
//! assert_eq!(decode(&bytes, &descriptor).unwrap(), record);
//! ```

pub mod codec;
pub mod error;
pub mod wire;

pub use codec::{decode, encode, encode_to, encoded_len, merge};
pub use error::{CodecError, Result};
pub use wire::{WireReader, WireType, WireWriter};
