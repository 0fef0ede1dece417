// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Self-describing binary codec for message bodies.
//!
//! Wire layout (all multi-byte values network byte order):
//!
//! ```text
//! message := item_count(u8) item{item_count}
//! item    := framing(u8) body
//! framing := (size_code:4 << 4) | type_code:4
//!
//! Integer item (codes 0..=9)          Array item (codes 10..=12)
//! +--------+========+                 +--------+========+~~~~~~~~+
//! |0000XXXX|  DATA  |                 |YYYYXXXX|  SIZE  |  DATA  |
//! +--------+========+                 +--------+========+~~~~~~~~+
//! ```
//!
//! `SIZE` is the element count (not the byte count), written with the
//! smallest sufficient width; `YYYY` is that width as a one-hot nibble
//! (1, 2, 4 or 8). An empty body serializes to an empty buffer with no
//! count byte. `from`/`to`/`id` do not travel on the wire.

use std::fmt;

use super::{Item, Message};
use crate::config::MAX_BODY_ITEMS;

/// Highest valid type code (`Item::Str`).
const TYPE_MAX: u8 = 12;
/// Codes `0..=INT_TYPE_MAX` are fixed-width integer items.
const INT_TYPE_MAX: u8 = 9;

// ============================================================================
// Errors
// ============================================================================

/// Codec failure. Encoding rejects, decoding never surfaces a partial body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Body has more items than the one-byte count can carry.
    BodyTooLong { len: usize },
    /// Framing byte holds an invalid (type, size) combination.
    BadFraming { offset: usize, byte: u8 },
    /// Buffer ended while more bytes were declared.
    Truncated { offset: usize, needed: usize },
    /// Bytes left over after `item_count` items were consumed.
    TrailingBytes { offset: usize, remaining: usize },
    /// String item does not hold valid UTF-8.
    BadUtf8 { offset: usize },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::BodyTooLong { len } => {
                write!(f, "body too long: {} items exceed the count byte", len)
            }
            WireError::BadFraming { offset, byte } => {
                write!(f, "bad framing byte {:#04x} at offset {}", byte, offset)
            }
            WireError::Truncated { offset, needed } => {
                write!(f, "truncated at offset {}: {} more bytes declared", offset, needed)
            }
            WireError::TrailingBytes { offset, remaining } => {
                write!(f, "{} trailing bytes after last item at offset {}", remaining, offset)
            }
            WireError::BadUtf8 { offset } => {
                write!(f, "invalid utf-8 in string item at offset {}", offset)
            }
        }
    }
}

impl std::error::Error for WireError {}

pub type WireResult<T> = Result<T, WireError>;

// ============================================================================
// Read cursor
// ============================================================================

/// Generate read methods for big-endian primitives.
///
/// Each generated method bounds-checks, converts via `from_be_bytes()` and
/// advances the offset.
macro_rules! impl_read_be {
    ($name:ident, $type:ty, $size:expr) => {
        fn $name(&mut self) -> WireResult<$type> {
            if self.offset + $size > self.buffer.len() {
                return Err(WireError::Truncated {
                    offset: self.offset,
                    needed: self.offset + $size - self.buffer.len(),
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buffer[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(<$type>::from_be_bytes(bytes))
        }
    };
}

/// Bounds-checked read cursor over a wire buffer.
struct Reader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_be!(read_u8, u8, 1);
    impl_read_be!(read_u16, u16, 2);
    impl_read_be!(read_u32, u32, 4);
    impl_read_be!(read_u64, u64, 8);
    impl_read_be!(read_i8, i8, 1);
    impl_read_be!(read_i16, i16, 2);
    impl_read_be!(read_i32, i32, 4);
    impl_read_be!(read_i64, i64, 8);

    fn read_bytes(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if self.offset + len > self.buffer.len() {
            return Err(WireError::Truncated {
                offset: self.offset,
                needed: self.offset + len - self.buffer.len(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Smallest prefix width (in bytes) able to carry an element count.
#[inline]
fn prefix_width(len: usize) -> u8 {
    if len <= u8::MAX as usize {
        1
    } else if len <= u16::MAX as usize {
        2
    } else if len as u64 <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

/// Framing byte: one-hot prefix width in the high nibble for arrays, zero
/// for integers; type code in the low nibble.
#[inline]
fn framing_byte(item: &Item) -> u8 {
    let size_code = match item {
        Item::Bytes(v) => prefix_width(v.len()),
        Item::I32Array(v) => prefix_width(v.len()),
        Item::Str(s) => prefix_width(s.len()),
        _ => 0,
    };
    (size_code << 4) | item.type_code()
}

/// Encoded size of one item, framing byte included.
fn encoded_len(item: &Item) -> usize {
    1 + match item {
        Item::Bool(_) | Item::Char(_) | Item::I8(_) | Item::U8(_) => 1,
        Item::I16(_) | Item::U16(_) => 2,
        Item::I32(_) | Item::U32(_) => 4,
        Item::I64(_) | Item::U64(_) => 8,
        Item::Bytes(v) => prefix_width(v.len()) as usize + v.len(),
        Item::I32Array(v) => prefix_width(v.len()) as usize + v.len() * 4,
        Item::Str(s) => prefix_width(s.len()) as usize + s.len(),
    }
}

fn write_len_prefix(buffer: &mut Vec<u8>, len: usize) {
    match prefix_width(len) {
        1 => buffer.push(len as u8),
        2 => buffer.extend_from_slice(&(len as u16).to_be_bytes()),
        4 => buffer.extend_from_slice(&(len as u32).to_be_bytes()),
        _ => buffer.extend_from_slice(&(len as u64).to_be_bytes()),
    }
}

fn encode_item(buffer: &mut Vec<u8>, item: &Item) {
    match item {
        Item::Bool(v) => buffer.push(u8::from(*v)),
        Item::Char(v) | Item::U8(v) => buffer.push(*v),
        Item::I8(v) => buffer.push(*v as u8),
        Item::I16(v) => buffer.extend_from_slice(&v.to_be_bytes()),
        Item::U16(v) => buffer.extend_from_slice(&v.to_be_bytes()),
        Item::I32(v) => buffer.extend_from_slice(&v.to_be_bytes()),
        Item::U32(v) => buffer.extend_from_slice(&v.to_be_bytes()),
        Item::I64(v) => buffer.extend_from_slice(&v.to_be_bytes()),
        Item::U64(v) => buffer.extend_from_slice(&v.to_be_bytes()),
        Item::Bytes(v) => {
            write_len_prefix(buffer, v.len());
            buffer.extend_from_slice(v);
        }
        Item::I32Array(v) => {
            write_len_prefix(buffer, v.len());
            for value in v {
                buffer.extend_from_slice(&value.to_be_bytes());
            }
        }
        Item::Str(s) => {
            write_len_prefix(buffer, s.len());
            buffer.extend_from_slice(s.as_bytes());
        }
    }
}

/// Encode a message body to its wire form.
///
/// An empty body yields an empty buffer. Bodies longer than
/// [`MAX_BODY_ITEMS`] are rejected outright rather than truncated, so every
/// buffer this function produces decodes back to an equal body.
pub fn encode(message: &Message) -> WireResult<Vec<u8>> {
    let items = &message.body;
    if items.is_empty() {
        return Ok(Vec::new());
    }
    if items.len() > MAX_BODY_ITEMS {
        return Err(WireError::BodyTooLong { len: items.len() });
    }

    let total = 1 + items.iter().map(encoded_len).sum::<usize>();
    let mut buffer = Vec::with_capacity(total);

    buffer.push(items.len() as u8);
    for item in items {
        buffer.push(framing_byte(item));
        encode_item(&mut buffer, item);
    }

    debug_assert_eq!(buffer.len(), total);

    Ok(buffer)
}

// ============================================================================
// Decoding
// ============================================================================

fn read_len_prefix(reader: &mut Reader<'_>, size_code: u8) -> WireResult<usize> {
    let len = match size_code {
        1 => u64::from(reader.read_u8()?),
        2 => u64::from(reader.read_u16()?),
        4 => u64::from(reader.read_u32()?),
        _ => reader.read_u64()?,
    };
    usize::try_from(len).map_err(|_| WireError::Truncated {
        offset: reader.offset(),
        needed: usize::MAX,
    })
}

fn decode_array(reader: &mut Reader<'_>, type_code: u8, size_code: u8) -> WireResult<Item> {
    let len = read_len_prefix(reader, size_code)?;

    match type_code {
        10 => Ok(Item::Bytes(reader.read_bytes(len)?.to_vec())),
        11 => {
            // Bounds-check the whole run before building the vector so an
            // absurd declared length fails without allocating.
            let byte_len = len.checked_mul(4).ok_or(WireError::Truncated {
                offset: reader.offset(),
                needed: usize::MAX,
            })?;
            let raw = reader.read_bytes(byte_len)?;
            let values = raw
                .chunks_exact(4)
                .map(|chunk| i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect();
            Ok(Item::I32Array(values))
        }
        _ => {
            let offset = reader.offset();
            let raw = reader.read_bytes(len)?;
            match std::str::from_utf8(raw) {
                Ok(s) => Ok(Item::Str(s.to_owned())),
                Err(_) => Err(WireError::BadUtf8 { offset }),
            }
        }
    }
}

fn decode_item(reader: &mut Reader<'_>, framing: u8, framing_offset: usize) -> WireResult<Item> {
    let type_code = framing & 0x0F;
    let size_code = framing >> 4;

    let malformed = WireError::BadFraming {
        offset: framing_offset,
        byte: framing,
    };

    if type_code <= INT_TYPE_MAX {
        if size_code != 0 {
            return Err(malformed);
        }
        Ok(match type_code {
            0 => Item::Bool(reader.read_u8()? != 0),
            1 => Item::Char(reader.read_u8()?),
            2 => Item::I8(reader.read_i8()?),
            3 => Item::U8(reader.read_u8()?),
            4 => Item::I16(reader.read_i16()?),
            5 => Item::U16(reader.read_u16()?),
            6 => Item::I32(reader.read_i32()?),
            7 => Item::U32(reader.read_u32()?),
            8 => Item::I64(reader.read_i64()?),
            _ => Item::U64(reader.read_u64()?),
        })
    } else if type_code <= TYPE_MAX {
        // One-hot nibble: exactly one of {1, 2, 4, 8}.
        if !size_code.is_power_of_two() {
            return Err(malformed);
        }
        decode_array(reader, type_code, size_code)
    } else {
        Err(malformed)
    }
}

/// Decode a wire buffer produced by [`encode`].
///
/// Reads the count byte, then exactly `item_count` items; anything else
/// (early exhaustion, trailing bytes, invalid framing, over-declared array
/// lengths) fails as a whole. Non-minimal length-prefix widths are accepted.
pub fn decode(buffer: &[u8]) -> WireResult<Message> {
    let mut message = Message::new(0);
    if buffer.is_empty() {
        return Ok(message);
    }

    let mut reader = Reader::new(buffer);
    let item_count = reader.read_u8()?;
    message.body.reserve(usize::from(item_count));

    for _ in 0..item_count {
        let framing_offset = reader.offset();
        let framing = reader.read_u8()?;
        let item = decode_item(&mut reader, framing, framing_offset)?;
        message.body.push(item);
    }

    if !reader.is_eof() {
        return Err(WireError::TrailingBytes {
            offset: reader.offset(),
            remaining: reader.remaining(),
        });
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_width_boundaries() {
        assert_eq!(prefix_width(0), 1);
        assert_eq!(prefix_width(0xFF), 1);
        assert_eq!(prefix_width(0x100), 2);
        assert_eq!(prefix_width(0xFFFF), 2);
        assert_eq!(prefix_width(0x1_0000), 4);
        assert_eq!(prefix_width(0xFFFF_FFFF), 4);
        assert_eq!(prefix_width(0x1_0000_0000), 8);
    }

    #[test]
    fn test_encode_known_vector() {
        let msg = Message::new(7).with(0x0102u16).with("hi");
        let bytes = encode(&msg).expect("encode should succeed");

        assert_eq!(bytes, [0x02, 0x05, 0x01, 0x02, 0x1C, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_decode_known_vector() {
        let bytes = [0x02, 0x05, 0x01, 0x02, 0x1C, 0x02, b'h', b'i'];
        let msg = decode(&bytes).expect("decode should succeed");

        assert_eq!(msg.body, vec![Item::U16(0x0102), Item::Str("hi".into())]);
    }

    #[test]
    fn test_empty_body_is_empty_buffer() {
        let msg = Message::new(7);
        assert!(encode(&msg).expect("encode should succeed").is_empty());

        let decoded = decode(&[]).expect("decode should succeed");
        assert!(decoded.body.is_empty());
    }

    #[test]
    fn test_unknown_type_code_rejected() {
        let err = decode(&[0x01, 0xFF]).unwrap_err();
        assert_eq!(err, WireError::BadFraming { offset: 1, byte: 0xFF });
    }

    #[test]
    fn test_integer_with_size_nibble_rejected() {
        // Type 5 (u16) with a non-zero size nibble is malformed.
        let err = decode(&[0x01, 0x15, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, WireError::BadFraming { offset: 1, .. }));
    }

    #[test]
    fn test_array_with_non_one_hot_size_rejected() {
        // Type 10 (bytes) with size nibble 3 (not one-hot).
        let err = decode(&[0x01, 0x3A, 0x00]).unwrap_err();
        assert!(matches!(err, WireError::BadFraming { .. }));
    }

    #[test]
    fn test_truncated_integer_rejected() {
        // Declares a u32 but provides two bytes.
        let err = decode(&[0x01, 0x07, 0xAA, 0xBB]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }

    #[test]
    fn test_array_longer_than_remaining_rejected() {
        // Byte array declares 5 elements, provides 2.
        let err = decode(&[0x01, 0x1A, 0x05, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }

    #[test]
    fn test_missing_items_rejected() {
        // Count says two items, buffer holds one bool.
        let err = decode(&[0x02, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        // One bool item plus a stray byte.
        let err = decode(&[0x01, 0x00, 0x01, 0xEE]).unwrap_err();
        assert_eq!(err, WireError::TrailingBytes { offset: 3, remaining: 1 });
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = decode(&[0x01, 0x1C, 0x02, 0xC3, 0x28]).unwrap_err();
        assert!(matches!(err, WireError::BadUtf8 { .. }));
    }

    #[test]
    fn test_empty_array_uses_one_byte_prefix() {
        let msg = Message::new(0).with(Vec::<u8>::new());
        let bytes = encode(&msg).expect("encode should succeed");
        assert_eq!(bytes, [0x01, 0x1A, 0x00]);

        let decoded = decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded.body, vec![Item::Bytes(vec![])]);
    }

    #[test]
    fn test_array_crossing_u8_boundary_widens_prefix() {
        let msg = Message::new(0).with(vec![0xABu8; 0x100]);
        let bytes = encode(&msg).expect("encode should succeed");

        // framing = (2 << 4) | 10, then 0x0100 big-endian.
        assert_eq!(&bytes[..4], &[0x01, 0x2A, 0x01, 0x00]);
        assert_eq!(bytes.len(), 1 + 1 + 2 + 0x100);

        let decoded = decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded.body, msg.body);
    }

    #[test]
    fn test_array_crossing_u16_boundary_widens_prefix() {
        let msg = Message::new(0).with(vec![0u8; 0x1_0000]);
        let bytes = encode(&msg).expect("encode should succeed");

        assert_eq!(&bytes[..6], &[0x01, 0x4A, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_non_minimal_prefix_accepted() {
        // "hi" with a 2-byte length prefix instead of the canonical 1 byte.
        let bytes = [0x01, 0x2C, 0x00, 0x02, b'h', b'i'];
        let msg = decode(&bytes).expect("decode should succeed");
        assert_eq!(msg.body, vec![Item::Str("hi".into())]);

        // Re-encoding canonicalizes to the minimal width.
        assert_eq!(encode(&msg).expect("encode should succeed"), [0x01, 0x1C, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_oversized_body_rejected() {
        let mut msg = Message::new(0);
        for _ in 0..=MAX_BODY_ITEMS {
            msg.push(true);
        }
        let err = encode(&msg).unwrap_err();
        assert_eq!(err, WireError::BodyTooLong { len: MAX_BODY_ITEMS + 1 });
    }

    #[test]
    fn test_roundtrip_every_variant() {
        let msg = Message::new(42)
            .with(true)
            .with(Item::Char(b'c'))
            .with(-8i8)
            .with(8u8)
            .with(-1600i16)
            .with(1600u16)
            .with(-320_000i32)
            .with(320_000u32)
            .with(-64_000_000_000i64)
            .with(64_000_000_000u64)
            .with(vec![1u8, 2, 3])
            .with(vec![-1i32, 0, i32::MAX])
            .with("héllo");

        let bytes = encode(&msg).expect("encode should succeed");
        let decoded = decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded.body, msg.body);

        // Canonical buffers re-encode byte-identically.
        assert_eq!(encode(&decoded).expect("encode should succeed"), bytes);
    }

    #[test]
    fn test_i32_array_elements_are_big_endian() {
        let msg = Message::new(0).with(vec![0x0102_0304i32]);
        let bytes = encode(&msg).expect("encode should succeed");
        assert_eq!(bytes, [0x01, 0x1B, 0x01, 0x01, 0x02, 0x03, 0x04]);
    }
}
