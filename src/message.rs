//! Lazy wire-format message decoder
//!
//! IWA objects are encoded with the Protocol Buffers wire format, but the
//! reader has no schemas: a [`Message`] is a map from field number to the
//! byte ranges of that field's occurrences, built in a single pass over the
//! input. Typed access decodes a field on first use and memoizes the
//! result; nothing is copied out of the backing stream until then.
//!
//! The parse is deliberately tolerant. A duplicate field number arriving
//! with a different wire type is dropped and parsing continues, so a single
//! bit flip damages at most one message. Truncation keeps every field that
//! ended before the damage.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::stream::{MemoryStream, SeekWhence};
use crate::varint::read_uvar;
use crate::{Error, Result};

/// The four wire types of the IWA format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

/// Declared value kind of a field, pinned on first typed access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Bool,
    Fixed64,
    Double,
    Str,
    Bytes,
    Message,
    Fixed32,
    Float,
}

impl ValueTag {
    fn wire_type(self) -> WireType {
        match self {
            Self::UInt32 | Self::UInt64 | Self::SInt32 | Self::SInt64 | Self::Bool => {
                WireType::Varint
            }
            Self::Fixed64 | Self::Double => WireType::Fixed64,
            Self::Str | Self::Bytes | Self::Message => WireType::LengthDelimited,
            Self::Fixed32 | Self::Float => WireType::Fixed32,
        }
    }
}

/// Decoded occurrences of one field, in document order.
#[derive(Clone)]
enum Values {
    UInt32(Rc<Vec<u32>>),
    UInt64(Rc<Vec<u64>>),
    SInt32(Rc<Vec<i32>>),
    SInt64(Rc<Vec<i64>>),
    Bool(Rc<Vec<bool>>),
    Fixed64(Rc<Vec<u64>>),
    Double(Rc<Vec<f64>>),
    Str(Rc<Vec<String>>),
    Bytes(Rc<Vec<MemoryStream>>),
    Message(Rc<Vec<Message>>),
    Fixed32(Rc<Vec<u32>>),
    Float(Rc<Vec<f32>>),
}

impl Values {
    fn tag(&self) -> ValueTag {
        match self {
            Self::UInt32(_) => ValueTag::UInt32,
            Self::UInt64(_) => ValueTag::UInt64,
            Self::SInt32(_) => ValueTag::SInt32,
            Self::SInt64(_) => ValueTag::SInt64,
            Self::Bool(_) => ValueTag::Bool,
            Self::Fixed64(_) => ValueTag::Fixed64,
            Self::Double(_) => ValueTag::Double,
            Self::Str(_) => ValueTag::Str,
            Self::Bytes(_) => ValueTag::Bytes,
            Self::Message(_) => ValueTag::Message,
            Self::Fixed32(_) => ValueTag::Fixed32,
            Self::Float(_) => ValueTag::Float,
        }
    }
}

struct FieldSlot {
    wire_type: WireType,
    /// Byte ranges of the occurrences; for length-delimited fields the
    /// range covers the payload only, not the length prefix.
    pieces: Vec<(usize, usize)>,
    decoded: OnceCell<Values>,
}

/// A parsed view over a byte range of the backing stream.
///
/// Cloning a message is cheap; clones share the field map and the decoded
/// value caches.
#[derive(Clone)]
pub struct Message {
    input: MemoryStream,
    fields: Rc<BTreeMap<u32, FieldSlot>>,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Message {
    /// Parse the byte range `[start, end)` of the given stream. Parsing
    /// never fails: damage truncates the field map at the last field that
    /// ended before it.
    pub fn from_range(stream: &MemoryStream, start: usize, end: usize) -> Self {
        let mut input = stream.clone();
        let mut fields = BTreeMap::new();
        if end > start && input.seek(start as i64, SeekWhence::Set).is_ok() {
            parse_fields(&mut input, (end - start) as u64, &mut fields);
        }
        Self {
            input,
            fields: Rc::new(fields),
        }
    }

    /// Whether no field was recovered from the range.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn uint32(&self, field: u32) -> Result<FieldValues<u32>> {
        match self.decode(field, ValueTag::UInt32)? {
            Values::UInt32(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn uint64(&self, field: u32) -> Result<FieldValues<u64>> {
        match self.decode(field, ValueTag::UInt64)? {
            Values::UInt64(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn sint32(&self, field: u32) -> Result<FieldValues<i32>> {
        match self.decode(field, ValueTag::SInt32)? {
            Values::SInt32(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn sint64(&self, field: u32) -> Result<FieldValues<i64>> {
        match self.decode(field, ValueTag::SInt64)? {
            Values::SInt64(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn bool_(&self, field: u32) -> Result<FieldValues<bool>> {
        match self.decode(field, ValueTag::Bool)? {
            Values::Bool(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn fixed64(&self, field: u32) -> Result<FieldValues<u64>> {
        match self.decode(field, ValueTag::Fixed64)? {
            Values::Fixed64(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn double_(&self, field: u32) -> Result<FieldValues<f64>> {
        match self.decode(field, ValueTag::Double)? {
            Values::Double(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn string(&self, field: u32) -> Result<FieldValues<String>> {
        match self.decode(field, ValueTag::Str)? {
            Values::Str(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn bytes(&self, field: u32) -> Result<FieldValues<MemoryStream>> {
        match self.decode(field, ValueTag::Bytes)? {
            Values::Bytes(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn message(&self, field: u32) -> Result<FieldValues<Message>> {
        match self.decode(field, ValueTag::Message)? {
            Values::Message(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn fixed32(&self, field: u32) -> Result<FieldValues<u32>> {
        match self.decode(field, ValueTag::Fixed32)? {
            Values::Fixed32(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    pub fn float_(&self, field: u32) -> Result<FieldValues<f32>> {
        match self.decode(field, ValueTag::Float)? {
            Values::Float(v) => Ok(FieldValues::new(v)),
            _ => Err(Error::AccessMismatch(field)),
        }
    }

    fn decode(&self, field: u32, tag: ValueTag) -> Result<Values> {
        let Some(slot) = self.fields.get(&field) else {
            return Ok(empty_values(tag));
        };

        // A stored length-delimited field satisfies any request: that is
        // how packed repeated scalars arrive.
        if slot.wire_type != tag.wire_type() && slot.wire_type != WireType::LengthDelimited {
            return Err(Error::AccessMismatch(field));
        }

        let values = slot
            .decoded
            .get_or_try_init(|| self.decode_pieces(slot, tag))?;
        if values.tag() != tag {
            return Err(Error::AccessMismatch(field));
        }
        Ok(values.clone())
    }

    fn decode_pieces(&self, slot: &FieldSlot, tag: ValueTag) -> Result<Values> {
        macro_rules! scalars {
            ($variant:ident, $read:expr) => {{
                let mut values = Vec::new();
                for &(start, end) in &slot.pieces {
                    let mut input = self.input.clone();
                    input.seek(start as i64, SeekWhence::Set)?;
                    while input.tell() < end {
                        values.push($read(&mut input)?);
                    }
                }
                Values::$variant(Rc::new(values))
            }};
        }

        Ok(match tag {
            ValueTag::UInt32 => scalars!(UInt32, |s| read_uvar(s).map(|v| v as u32)),
            ValueTag::UInt64 => scalars!(UInt64, read_uvar),
            ValueTag::SInt32 => {
                scalars!(SInt32, |s| crate::varint::read_svar(s).map(|v| v as i32))
            }
            ValueTag::SInt64 => scalars!(SInt64, crate::varint::read_svar),
            ValueTag::Bool => scalars!(Bool, |s| read_uvar(s).map(|v| v != 0)),
            ValueTag::Fixed64 => scalars!(Fixed64, MemoryStream::read_u64_le),
            ValueTag::Double => scalars!(Double, MemoryStream::read_f64_le),
            ValueTag::Fixed32 => scalars!(Fixed32, MemoryStream::read_u32_le),
            ValueTag::Float => scalars!(Float, MemoryStream::read_f32_le),
            ValueTag::Str => {
                let mut values = Vec::new();
                for &(start, end) in &slot.pieces {
                    let mut input = self.input.clone();
                    input.seek(start as i64, SeekWhence::Set)?;
                    let bytes = input.read_exact(end - start)?;
                    values.push(String::from_utf8_lossy(bytes).into_owned());
                }
                Values::Str(Rc::new(values))
            }
            ValueTag::Bytes => {
                let mut values = Vec::new();
                for &(start, end) in &slot.pieces {
                    let mut input = self.input.clone();
                    input.seek(start as i64, SeekWhence::Set)?;
                    let bytes = input.read_exact(end - start)?;
                    values.push(MemoryStream::new(bytes.to_vec()));
                }
                Values::Bytes(Rc::new(values))
            }
            ValueTag::Message => {
                let values = slot
                    .pieces
                    .iter()
                    .map(|&(start, end)| Message::from_range(&self.input, start, end))
                    .collect();
                Values::Message(Rc::new(values))
            }
        })
    }
}

fn empty_values(tag: ValueTag) -> Values {
    match tag {
        ValueTag::UInt32 => Values::UInt32(Rc::new(Vec::new())),
        ValueTag::UInt64 => Values::UInt64(Rc::new(Vec::new())),
        ValueTag::SInt32 => Values::SInt32(Rc::new(Vec::new())),
        ValueTag::SInt64 => Values::SInt64(Rc::new(Vec::new())),
        ValueTag::Bool => Values::Bool(Rc::new(Vec::new())),
        ValueTag::Fixed64 => Values::Fixed64(Rc::new(Vec::new())),
        ValueTag::Double => Values::Double(Rc::new(Vec::new())),
        ValueTag::Str => Values::Str(Rc::new(Vec::new())),
        ValueTag::Bytes => Values::Bytes(Rc::new(Vec::new())),
        ValueTag::Message => Values::Message(Rc::new(Vec::new())),
        ValueTag::Fixed32 => Values::Fixed32(Rc::new(Vec::new())),
        ValueTag::Float => Values::Float(Rc::new(Vec::new())),
    }
}

fn parse_fields(input: &mut MemoryStream, length: u64, fields: &mut BTreeMap<u32, FieldSlot>) {
    let start_pos = input.tell();

    while !input.is_end() && ((input.tell() - start_pos) as u64) < length {
        let key = match read_uvar(input) {
            Ok(key) => key,
            Err(_) => break,
        };
        let field = (key >> 3) as u32;

        let Some(wire_type) = WireType::from_raw(key & 0x7) else {
            debug!(
                "Message::parse: unexpected wire type {} for field {}",
                key & 0x7,
                field
            );
            break;
        };

        let mut start = input.tell();
        let skipped = match wire_type {
            WireType::Varint => read_uvar(input).map(|_| ()),
            WireType::Fixed64 => input.read_exact(8).map(|_| ()),
            WireType::LengthDelimited => match read_uvar(input) {
                Ok(len) => {
                    // the field parser expects just the payload
                    start = input.tell();
                    input.seek(len as i64, SeekWhence::Cur)
                }
                Err(e) => Err(e),
            },
            WireType::Fixed32 => input.read_exact(4).map(|_| ()),
        };
        if skipped.is_err() {
            break;
        }

        let end = input.tell();
        if ((end - start_pos) as u64) > length {
            // the field runs past the declared range: drop it
            break;
        }

        match fields.entry(field) {
            Entry::Occupied(mut entry) => {
                if entry.get().wire_type != wire_type {
                    debug!(
                        "Message::parse: wire type {:?} of field {} does not match previously seen {:?}",
                        wire_type,
                        field,
                        entry.get().wire_type
                    );
                    continue;
                }
                entry.get_mut().pieces.push((start, end));
            }
            Entry::Vacant(entry) => {
                entry.insert(FieldSlot {
                    wire_type,
                    pieces: vec![(start, end)],
                    decoded: OnceCell::new(),
                });
            }
        }
    }
}

/// The decoded occurrences of one field, in document order.
///
/// A declared-optional field resolves through [`FieldValues::optional`];
/// a declared-repeated field iterates the same sequence.
#[derive(Debug, Clone)]
pub struct FieldValues<T> {
    values: Rc<Vec<T>>,
}

impl<T> FieldValues<T> {
    fn new(values: Rc<Vec<T>>) -> Self {
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn first(&self) -> Option<&T> {
        self.values.first()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }
}

impl<T: Clone> FieldValues<T> {
    /// The first occurrence, if any.
    pub fn optional(&self) -> Option<T> {
        self.values.first().cloned()
    }
}

impl<'a, T> IntoIterator for &'a FieldValues<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl FieldValues<Message> {
    /// Delegate typed access to the first nested message; an absent
    /// message yields an absent field.
    pub fn uint32(&self, field: u32) -> Result<FieldValues<u32>> {
        match self.first() {
            Some(msg) => msg.uint32(field),
            None => Ok(FieldValues::new(Rc::new(Vec::new()))),
        }
    }

    pub fn uint64(&self, field: u32) -> Result<FieldValues<u64>> {
        match self.first() {
            Some(msg) => msg.uint64(field),
            None => Ok(FieldValues::new(Rc::new(Vec::new()))),
        }
    }

    pub fn bool_(&self, field: u32) -> Result<FieldValues<bool>> {
        match self.first() {
            Some(msg) => msg.bool_(field),
            None => Ok(FieldValues::new(Rc::new(Vec::new()))),
        }
    }

    pub fn string(&self, field: u32) -> Result<FieldValues<String>> {
        match self.first() {
            Some(msg) => msg.string(field),
            None => Ok(FieldValues::new(Rc::new(Vec::new()))),
        }
    }

    pub fn message(&self, field: u32) -> Result<FieldValues<Message>> {
        match self.first() {
            Some(msg) => msg.message(field),
            None => Ok(FieldValues::new(Rc::new(Vec::new()))),
        }
    }

    pub fn float_(&self, field: u32) -> Result<FieldValues<f32>> {
        match self.first() {
            Some(msg) => msg.float_(field),
            None => Ok(FieldValues::new(Rc::new(Vec::new()))),
        }
    }
}
