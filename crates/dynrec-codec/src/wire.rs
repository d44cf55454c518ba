//! Wire primitives
//!
//! Field keys are `(number << 3) | wire_type` written as a varint. Integers
//! use little-endian base-128 varints, signed `sint` kinds are zigzag mapped
//! first. Fixed-width kinds are little-endian, strings and bytes carry a
//! varint length prefix.

use crate::error::{CodecError, Result};
use dynrec_schema::descriptor::MAX_FIELD_NUMBER;
use dynrec_schema::FieldKind;
use std::fmt;

/// How a field's payload is framed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Parse the low three bits of a field key
    ///
    /// Groups (3, 4) are not supported.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(CodecError::InvalidWireType(other)),
        }
    }

    /// Wire type used for a field kind
    pub fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Int32
            | FieldKind::Int64
            | FieldKind::Uint32
            | FieldKind::Uint64
            | FieldKind::Sint32
            | FieldKind::Sint64
            | FieldKind::Bool => WireType::Varint,
            FieldKind::Fixed32 | FieldKind::Sfixed32 | FieldKind::Float => WireType::Fixed32,
            FieldKind::Fixed64 | FieldKind::Sfixed64 | FieldKind::Double => WireType::Fixed64,
            FieldKind::String | FieldKind::Bytes => WireType::LengthDelimited,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "i64",
            WireType::LengthDelimited => "len",
            WireType::Fixed32 => "i32",
        };
        write!(f, "{}", name)
    }
}

/// Number of bytes a varint takes
#[inline]
pub fn varint_len(value: u64) -> usize {
    // 1 byte per started group of 7 bits, at least 1
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Number of bytes a field key takes
#[inline]
pub fn key_len(number: u32) -> usize {
    varint_len((number as u64) << 3)
}

/// Zigzag encode a 32-bit signed integer
/// Maps: 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...
#[inline]
pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Zigzag decode a 32-bit value
#[inline]
pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ (-((value & 1) as i32))
}

/// Zigzag encode a 64-bit signed integer
#[inline]
pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Zigzag decode a 64-bit value
#[inline]
pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}

/// Append-only wire writer
#[derive(Debug, Default)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Continue writing at the end of an existing buffer
    pub fn from_vec(buffer: Vec<u8>) -> Self {
        Self { buffer }
    }

    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                break;
            } else {
                self.buffer.push(byte | 0x80);
            }
        }
    }

    pub fn write_key(&mut self, number: u32, wire_type: WireType) {
        self.write_varint(((number as u64) << 3) | wire_type as u64);
    }

    pub fn write_fixed32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a length prefix followed by the bytes
    pub fn write_length_delimited(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing was written
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Finish writing and return the buffer
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Cursor over encoded bytes
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a new reader
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the input
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Check if the input is exhausted
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value = 0u64;
        let mut shift = 0;

        loop {
            if self.pos >= self.data.len() {
                return Err(CodecError::Truncated { offset: self.pos });
            }

            let byte = self.data[self.pos];
            self.pos += 1;

            value |= ((byte & 0x7F) as u64) << shift;

            if byte & 0x80 == 0 {
                break;
            }

            shift += 7;
            if shift >= 64 {
                return Err(CodecError::VarintOverflow { offset: start });
            }
        }

        Ok(value)
    }

    /// Read a field key, returning the field number and wire type
    pub fn read_key(&mut self) -> Result<(u32, WireType)> {
        let key = self.read_varint()?;
        let wire_type = WireType::from_u8((key & 0x07) as u8)?;
        let number = key >> 3;
        if number == 0 || number > MAX_FIELD_NUMBER as u64 {
            return Err(CodecError::InvalidFieldNumber(number));
        }
        Ok((number as u32, wire_type))
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(CodecError::Truncated {
                offset: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn read_fixed32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_fixed64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a length prefix and borrow that many bytes
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let length = self.read_varint()?;
        let available = self.remaining();
        if length > available as u64 {
            return Err(CodecError::LengthOverflow { length, available });
        }
        self.take(length as usize)
    }

    /// Skip over one payload of the given wire type
    pub fn skip(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode32(0), 0);
        assert_eq!(zigzag_encode32(-1), 1);
        assert_eq!(zigzag_encode32(1), 2);
        assert_eq!(zigzag_encode32(i32::MIN), u32::MAX);
        assert_eq!(zigzag_decode32(u32::MAX), i32::MIN);
        assert_eq!(zigzag_encode64(-2), 3);
        assert_eq!(zigzag_decode64(zigzag_encode64(i64::MAX)), i64::MAX);
    }

    #[test]
    fn test_varint_encoding() {
        let mut writer = WireWriter::new();
        writer.write_varint(1);
        writer.write_varint(300);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0x01, 0xAC, 0x02]);

        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_varint().unwrap(), 1);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_varint_len() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut writer = WireWriter::new();
            writer.write_varint(value);
            assert_eq!(varint_len(value), writer.len(), "{}", value);
        }
        assert_eq!(varint_len(u64::MAX), 10);
    }

    #[test]
    fn test_key() {
        let mut writer = WireWriter::new();
        writer.write_key(2, WireType::Varint);
        writer.write_key(MAX_FIELD_NUMBER, WireType::LengthDelimited);
        let bytes = writer.finish();
        assert_eq!(bytes[0], 0x10);

        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_key().unwrap(), (2, WireType::Varint));
        assert_eq!(
            reader.read_key().unwrap(),
            (MAX_FIELD_NUMBER, WireType::LengthDelimited)
        );
        assert_eq!(key_len(MAX_FIELD_NUMBER), 5);
    }

    #[test]
    fn test_invalid_keys() {
        // Field number 0
        assert!(matches!(
            WireReader::new(&[0x00]).read_key(),
            Err(CodecError::InvalidFieldNumber(0))
        ));
        // Start group
        assert!(matches!(
            WireReader::new(&[0x0B]).read_key(),
            Err(CodecError::InvalidWireType(3))
        ));
    }

    #[test]
    fn test_truncated_input() {
        assert!(WireReader::new(&[0x80]).read_varint().unwrap_err().is_truncated());
        assert!(WireReader::new(&[1, 2, 3]).read_fixed32().unwrap_err().is_truncated());
        assert!(WireReader::new(&[5, b'a'])
            .read_length_delimited()
            .unwrap_err()
            .is_truncated());
    }

    #[test]
    fn test_varint_overflow() {
        let bytes = [0xFF; 11];
        assert!(matches!(
            WireReader::new(&bytes).read_varint(),
            Err(CodecError::VarintOverflow { offset: 0 })
        ));
    }

    #[test]
    fn test_skip() {
        let mut writer = WireWriter::new();
        writer.write_varint(u64::MAX);
        writer.write_fixed64(7);
        writer.write_length_delimited(b"abc");
        writer.write_fixed32(9);
        let bytes = writer.finish();

        let mut reader = WireReader::new(&bytes);
        reader.skip(WireType::Varint).unwrap();
        reader.skip(WireType::Fixed64).unwrap();
        reader.skip(WireType::LengthDelimited).unwrap();
        assert_eq!(reader.read_fixed32().unwrap(), 9);
        assert!(reader.is_empty());
    }
}
