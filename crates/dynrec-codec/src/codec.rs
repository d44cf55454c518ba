//! Record encoding and decoding
//!
//! Set fields are written in ascending tag order, including fields holding
//! their default value; unset fields are omitted. Decoding skips tags the
//! descriptor does not know and keeps the last occurrence of a repeated tag.

use crate::error::{CodecError, Result};
use crate::wire::{
    key_len, varint_len, zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64,
    WireReader, WireType, WireWriter,
};
use dynrec_record::{DynamicRecord, Value};
use dynrec_schema::{FieldDescriptor, FieldKind, MessageDescriptor};
use std::sync::Arc;
use tracing::debug;

/// Exact size of `encode(record)`
pub fn encoded_len(record: &DynamicRecord) -> usize {
    record
        .set_fields()
        .map(|(field, value)| key_len(field.number()) + value_len(field.kind(), value))
        .sum()
}

/// Encode a record into a new buffer
pub fn encode(record: &DynamicRecord) -> Vec<u8> {
    let mut writer = WireWriter::with_capacity(encoded_len(record));
    write_record(&mut writer, record);
    writer.finish()
}

/// Encode a record, appending to `buf`
pub fn encode_to(record: &DynamicRecord, buf: &mut Vec<u8>) {
    buf.reserve(encoded_len(record));
    let mut writer = WireWriter::from_vec(std::mem::take(buf));
    write_record(&mut writer, record);
    *buf = writer.finish();
}

/// Decode bytes into a new record of `descriptor`
pub fn decode(bytes: &[u8], descriptor: &Arc<MessageDescriptor>) -> Result<DynamicRecord> {
    let mut record = DynamicRecord::new(Arc::clone(descriptor));
    merge(&mut record, bytes)?;
    Ok(record)
}

/// Decode bytes on top of an existing record
///
/// Fields present in `bytes` overwrite the record's values, others are kept.
/// On error the record may hold a prefix of the input's fields.
pub fn merge(record: &mut DynamicRecord, bytes: &[u8]) -> Result<()> {
    let descriptor = Arc::clone(record.descriptor());
    let mut reader = WireReader::new(bytes);

    while !reader.is_empty() {
        let offset = reader.position();
        let (number, wire_type) = reader.read_key()?;

        let field = match descriptor.field_by_number(number) {
            Some(field) => field,
            None => {
                debug!(
                    "Skipping unknown field {} ({}) at offset {} in {}",
                    number,
                    wire_type,
                    offset,
                    descriptor.full_name()
                );
                reader.skip(wire_type)?;
                continue;
            }
        };

        let expected = WireType::for_kind(field.kind());
        if wire_type != expected {
            return Err(CodecError::WireTypeMismatch {
                field: field.name().to_string(),
                expected,
                actual: wire_type,
            });
        }

        let value = read_value(&mut reader, field)?;
        record.set_by_index(field.index(), value)?;
    }

    Ok(())
}

fn write_record(writer: &mut WireWriter, record: &DynamicRecord) {
    for (field, value) in record.set_fields() {
        let kind = field.kind();
        writer.write_key(field.number(), WireType::for_kind(kind));
        match value {
            Value::Int32(v) => match kind {
                FieldKind::Sint32 => writer.write_varint(zigzag_encode32(*v) as u64),
                FieldKind::Sfixed32 => writer.write_fixed32(*v as u32),
                // Negative int32 is sign-extended to ten bytes
                _ => writer.write_varint(*v as i64 as u64),
            },
            Value::Int64(v) => match kind {
                FieldKind::Sint64 => writer.write_varint(zigzag_encode64(*v)),
                FieldKind::Sfixed64 => writer.write_fixed64(*v as u64),
                _ => writer.write_varint(*v as u64),
            },
            Value::Uint32(v) => match kind {
                FieldKind::Fixed32 => writer.write_fixed32(*v),
                _ => writer.write_varint(*v as u64),
            },
            Value::Uint64(v) => match kind {
                FieldKind::Fixed64 => writer.write_fixed64(*v),
                _ => writer.write_varint(*v),
            },
            Value::Float(v) => writer.write_fixed32(v.to_bits()),
            Value::Double(v) => writer.write_fixed64(v.to_bits()),
            Value::Bool(v) => writer.write_varint(*v as u64),
            Value::String(s) => writer.write_length_delimited(s.as_bytes()),
            Value::Bytes(b) => writer.write_length_delimited(b),
        }
    }
}

fn value_len(kind: FieldKind, value: &Value) -> usize {
    match value {
        Value::Int32(v) => match kind {
            FieldKind::Sint32 => varint_len(zigzag_encode32(*v) as u64),
            FieldKind::Sfixed32 => 4,
            _ => varint_len(*v as i64 as u64),
        },
        Value::Int64(v) => match kind {
            FieldKind::Sint64 => varint_len(zigzag_encode64(*v)),
            FieldKind::Sfixed64 => 8,
            _ => varint_len(*v as u64),
        },
        Value::Uint32(v) => match kind {
            FieldKind::Fixed32 => 4,
            _ => varint_len(*v as u64),
        },
        Value::Uint64(v) => match kind {
            FieldKind::Fixed64 => 8,
            _ => varint_len(*v),
        },
        Value::Float(_) => 4,
        Value::Double(_) => 8,
        Value::Bool(_) => 1,
        Value::String(s) => varint_len(s.len() as u64) + s.len(),
        Value::Bytes(b) => varint_len(b.len() as u64) + b.len(),
    }
}

fn read_value(reader: &mut WireReader<'_>, field: &FieldDescriptor) -> Result<Value> {
    let value = match field.kind() {
        FieldKind::Int32 => Value::Int32(reader.read_varint()? as i32),
        FieldKind::Int64 => Value::Int64(reader.read_varint()? as i64),
        FieldKind::Uint32 => Value::Uint32(reader.read_varint()? as u32),
        FieldKind::Uint64 => Value::Uint64(reader.read_varint()?),
        FieldKind::Sint32 => Value::Int32(zigzag_decode32(reader.read_varint()? as u32)),
        FieldKind::Sint64 => Value::Int64(zigzag_decode64(reader.read_varint()?)),
        FieldKind::Bool => Value::Bool(reader.read_varint()? != 0),
        FieldKind::Fixed32 => Value::Uint32(reader.read_fixed32()?),
        FieldKind::Sfixed32 => Value::Int32(reader.read_fixed32()? as i32),
        FieldKind::Float => Value::Float(f32::from_bits(reader.read_fixed32()?)),
        FieldKind::Fixed64 => Value::Uint64(reader.read_fixed64()?),
        FieldKind::Sfixed64 => Value::Int64(reader.read_fixed64()? as i64),
        FieldKind::Double => Value::Double(f64::from_bits(reader.read_fixed64()?)),
        FieldKind::String => {
            let bytes = reader.read_length_delimited()?;
            let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 {
                field: field.name().to_string(),
            })?;
            Value::String(text.to_string())
        }
        FieldKind::Bytes => Value::Bytes(reader.read_length_delimited()?.to_vec()),
    };
    Ok(value)
}
