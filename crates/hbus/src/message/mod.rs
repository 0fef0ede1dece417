// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed message value model
//!
//! A [`Message`] is an addressed envelope (`from`/`to`/`id`) around a body of
//! heterogeneous [`Item`]s. The body is used as a stack: [`Message::push`]
//! appends, [`Message::pop`] removes from the tail, so readers either mirror
//! the writer in reverse order or index into `body` positionally.
//!
//! # Item ordinals
//!
//! Every variant has a fixed ordinal which doubles as its wire type code
//! (see [`wire`]). The encoding packs the code into the low nibble of the
//! framing byte, which caps the variant at 16 alternatives.
//!
//! | Code | Variant    | Payload            |
//! |-----:|------------|--------------------|
//! | 0    | `Bool`     | 1 byte             |
//! | 1    | `Char`     | 1 byte             |
//! | 2-9  | `I8`..`U64`| fixed-width integer|
//! | 10   | `Bytes`    | byte sequence      |
//! | 11   | `I32Array` | signed-32 sequence |
//! | 12   | `Str`      | UTF-8 string       |

pub mod wire;

use crate::config::DEFAULT_BODY_CAPACITY;

/// One value in a message body.
///
/// The declaration order is load-bearing: [`Item::type_code`] and the wire
/// decoder rely on these exact ordinals.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Bool(bool),
    Char(u8),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Bytes(Vec<u8>),
    I32Array(Vec<i32>),
    Str(String),
}

impl Item {
    /// Wire type code (low nibble of the framing byte).
    #[inline]
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            Item::Bool(_) => 0,
            Item::Char(_) => 1,
            Item::I8(_) => 2,
            Item::U8(_) => 3,
            Item::I16(_) => 4,
            Item::U16(_) => 5,
            Item::I32(_) => 6,
            Item::U32(_) => 7,
            Item::I64(_) => 8,
            Item::U64(_) => 9,
            Item::Bytes(_) => 10,
            Item::I32Array(_) => 11,
            Item::Str(_) => 12,
        }
    }

    /// Short variant name for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Bool(_) => "bool",
            Item::Char(_) => "char",
            Item::I8(_) => "i8",
            Item::U8(_) => "u8",
            Item::I16(_) => "i16",
            Item::U16(_) => "u16",
            Item::I32(_) => "i32",
            Item::U32(_) => "u32",
            Item::I64(_) => "i64",
            Item::U64(_) => "u64",
            Item::Bytes(_) => "bytes",
            Item::I32Array(_) => "i32 array",
            Item::Str(_) => "string",
        }
    }
}

/// Generate `From<inner>` and `TryFrom<Item>` for a plain variant.
///
/// `TryFrom` hands the original item back on mismatch so a failed typed pop
/// can restore the body untouched.
macro_rules! impl_item_conv {
    ($variant:ident, $inner:ty) => {
        impl From<$inner> for Item {
            #[inline]
            fn from(value: $inner) -> Self {
                Item::$variant(value)
            }
        }

        impl TryFrom<Item> for $inner {
            type Error = Item;

            #[inline]
            fn try_from(item: Item) -> Result<Self, Item> {
                match item {
                    Item::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

impl_item_conv!(Bool, bool);
impl_item_conv!(I8, i8);
impl_item_conv!(U8, u8);
impl_item_conv!(I16, i16);
impl_item_conv!(U16, u16);
impl_item_conv!(I32, i32);
impl_item_conv!(U32, u32);
impl_item_conv!(I64, i64);
impl_item_conv!(U64, u64);
impl_item_conv!(Bytes, Vec<u8>);
impl_item_conv!(I32Array, Vec<i32>);
impl_item_conv!(Str, String);

impl From<&str> for Item {
    #[inline]
    fn from(value: &str) -> Self {
        Item::Str(value.to_owned())
    }
}

impl From<&[u8]> for Item {
    #[inline]
    fn from(value: &[u8]) -> Self {
        Item::Bytes(value.to_vec())
    }
}

/// Addressed envelope around a stack of [`Item`]s.
///
/// `from` is informational; `to` selects the destination handler when the
/// message goes through the router. `id` is an application-defined message
/// type, unrelated to the per-item wire codes. Neither address travels on
/// the wire (see [`wire`]).
///
/// Enum-valued payloads map to their underlying integer on push and are
/// converted back by the caller on pop:
///
/// ```
/// use hbus::Message;
///
/// #[derive(Debug, PartialEq)]
/// #[repr(u16)]
/// enum Mode { Fast = 1, Safe = 2 }
///
/// let mut msg = Message::new(4).with(Mode::Safe as u16);
/// assert_eq!(msg.pop::<u16>(), Mode::Safe as u16);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub id: u16,
    pub body: Vec<Item>,
}

impl Message {
    /// Create an empty message with the given application id.
    #[must_use]
    pub fn new(id: u16) -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            id,
            body: Vec::with_capacity(DEFAULT_BODY_CAPACITY),
        }
    }

    /// Append a value to the body.
    pub fn push<T: Into<Item>>(&mut self, value: T) {
        self.body.push(value.into());
    }

    /// Builder-style [`Message::push`].
    ///
    /// ```
    /// use hbus::Message;
    ///
    /// let msg = Message::new(7).with(0x0102u16).with("hi");
    /// assert_eq!(msg.body.len(), 2);
    /// ```
    #[must_use]
    pub fn with<T: Into<Item>>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Remove and return the tail item, untyped.
    pub fn pop_item(&mut self) -> Option<Item> {
        self.body.pop()
    }

    /// Remove the tail item if it holds a `T`; leave the body untouched
    /// otherwise.
    pub fn take<T>(&mut self) -> Option<T>
    where
        T: TryFrom<Item, Error = Item>,
    {
        match T::try_from(self.body.pop()?) {
            Ok(value) => Some(value),
            Err(item) => {
                self.body.push(item);
                None
            }
        }
    }

    /// Remove and return the tail item as a `T`.
    ///
    /// # Panics
    ///
    /// Panics when the body is empty or the tail item holds a different
    /// variant. Popping the wrong type is a contract violation on the
    /// caller's side, not a runtime condition to recover from; use
    /// [`Message::take`] when the tail type is genuinely unknown.
    pub fn pop<T>(&mut self) -> T
    where
        T: TryFrom<Item, Error = Item>,
    {
        let item = self.body.pop().expect("pop on empty message body");
        match T::try_from(item) {
            Ok(value) => value,
            Err(item) => panic!("typed pop mismatch: tail item is {}", item.kind()),
        }
    }

    /// Encode the body to its wire form.
    ///
    /// Returns an empty buffer when the body is empty or when the encoder
    /// rejects the message (body longer than [`crate::config::MAX_BODY_ITEMS`]).
    #[must_use]
    pub fn serialize(message: &Message) -> Vec<u8> {
        match wire::encode(message) {
            Ok(buffer) => buffer,
            Err(err) => {
                log::debug!("[message] encoder reject: {}", err);
                Vec::new()
            }
        }
    }

    /// Decode a wire buffer back into a message.
    ///
    /// Returns `None` on any malformation; a partially decoded body is never
    /// surfaced. The `from`/`to`/`id` fields are not on the wire and come
    /// back defaulted.
    #[must_use]
    pub fn deserialize(buffer: &[u8]) -> Option<Message> {
        match wire::decode(buffer) {
            Ok(message) => Some(message),
            Err(err) => {
                log::debug!("[message] decoder reject: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_are_stable() {
        let items = [
            Item::Bool(true),
            Item::Char(b'x'),
            Item::I8(-1),
            Item::U8(1),
            Item::I16(-1),
            Item::U16(1),
            Item::I32(-1),
            Item::U32(1),
            Item::I64(-1),
            Item::U64(1),
            Item::Bytes(vec![]),
            Item::I32Array(vec![]),
            Item::Str(String::new()),
        ];
        for (expected, item) in items.iter().enumerate() {
            assert_eq!(item.type_code(), expected as u8);
        }
    }

    #[test]
    fn test_push_pop_mirror_in_reverse() {
        let mut msg = Message::new(3).with(7u32).with("payload").with(true);

        assert!(msg.pop::<bool>());
        assert_eq!(msg.pop::<String>(), "payload");
        assert_eq!(msg.pop::<u32>(), 7);
        assert!(msg.body.is_empty());
    }

    #[test]
    fn test_take_restores_body_on_mismatch() {
        let mut msg = Message::new(0).with(42u16);

        assert_eq!(msg.take::<i64>(), None);
        assert_eq!(msg.body.len(), 1);
        assert_eq!(msg.take::<u16>(), Some(42));
        assert!(msg.take::<u16>().is_none());
    }

    #[test]
    #[should_panic(expected = "typed pop mismatch")]
    fn test_pop_wrong_type_panics() {
        let mut msg = Message::new(0).with(1u8);
        let _: i8 = msg.pop();
    }

    #[test]
    fn test_positional_reads() {
        let msg = Message::new(1).with(0x0102u16).with("hi");

        assert_eq!(msg.body[0], Item::U16(0x0102));
        assert_eq!(msg.body[1], Item::Str("hi".into()));
    }

    #[test]
    fn test_new_reserves_default_capacity() {
        let msg = Message::new(9);
        assert!(msg.body.capacity() >= DEFAULT_BODY_CAPACITY);
        assert_eq!(msg.id, 9);
        assert!(msg.from.is_empty() && msg.to.is_empty());
    }
}
