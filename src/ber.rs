// BER packet tree used by the control codecs.
// Definite-length BER only; primitive content is kept as raw bytes and
// scalars are decoded on demand.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{Cursor, Read};
use thiserror::Error;

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_UTF8_STRING: u8 = 0x0C;
pub const TAG_SEQUENCE: u8 = 0x10;

const CONSTRUCTED_BIT: u8 = 0x20;
const TAG_NUMBER_MASK: u8 = 0x1F;

/// Nesting limit for decoding; control values are a handful of levels deep.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BerError {
    #[error("BER truncated: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("indefinite length not supported")]
    IndefiniteLength,
    #[error("length too large: {0} bytes")]
    LengthTooLarge(usize),
    #[error("high tag number form not supported (tag byte 0x{0:02X})")]
    HighTagNumber(u8),
    #[error("{0} trailing bytes after element")]
    TrailingData(usize),
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
    #[error("integer of {0} bytes does not fit in 64 bits")]
    IntegerTooLarge(usize),
    #[error("integer has no content octets")]
    EmptyInteger,
    #[error("tag number {0} needs the high tag number form")]
    InvalidTag(u8),
    #[error("primitive element with children or constructed element with data")]
    MixedContent,
}

/// Tag class, the top two bits of the identifier octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Class {
    Universal,
    Application,
    Context,
    Private,
}

impl Class {
    fn bits(self) -> u8 {
        match self {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::Context => 0x80,
            Class::Private => 0xC0,
        }
    }

    fn from_tag_byte(byte: u8) -> Self {
        match byte & 0xC0 {
            0x00 => Class::Universal,
            0x40 => Class::Application,
            0x80 => Class::Context,
            _ => Class::Private,
        }
    }
}

/// One BER element. Primitive elements carry `data`, constructed ones carry `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PacketFields")]
pub struct Packet {
    pub class: Class,
    pub constructed: bool,
    pub tag: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Packet>,
}

// Deserialized form of `Packet`, checked before it becomes one.
#[derive(Deserialize)]
struct PacketFields {
    class: Class,
    constructed: bool,
    tag: u8,
    #[serde(default)]
    data: Vec<u8>,
    #[serde(default)]
    children: Vec<Packet>,
}

impl TryFrom<PacketFields> for Packet {
    type Error = BerError;

    fn try_from(fields: PacketFields) -> Result<Self, BerError> {
        let mut packet = if fields.constructed {
            if !fields.data.is_empty() {
                return Err(BerError::MixedContent);
            }
            Packet::try_constructed(fields.class, fields.tag)?
        } else {
            if !fields.children.is_empty() {
                return Err(BerError::MixedContent);
            }
            Packet::try_primitive(fields.class, fields.tag, fields.data)?
        };
        packet.children = fields.children;
        Ok(packet)
    }
}

fn check_tag(tag: u8) -> Result<u8, BerError> {
    if tag >= TAG_NUMBER_MASK {
        return Err(BerError::InvalidTag(tag));
    }
    Ok(tag)
}

impl Packet {
    /// Primitive element, or [`BerError::InvalidTag`] for tag numbers of 31 and up.
    pub fn try_primitive(class: Class, tag: u8, data: impl Into<Vec<u8>>) -> Result<Self, BerError> {
        Ok(Self {
            class,
            constructed: false,
            tag: check_tag(tag)?,
            data: data.into(),
            children: Vec::new(),
        })
    }

    /// Constructed element, or [`BerError::InvalidTag`] for tag numbers of 31 and up.
    pub fn try_constructed(class: Class, tag: u8) -> Result<Self, BerError> {
        Ok(Self {
            class,
            constructed: true,
            tag: check_tag(tag)?,
            data: Vec::new(),
            children: Vec::new(),
        })
    }

    /// # Panics
    ///
    /// If `tag` is 31 or more. Use [`Packet::try_primitive`] for tags that are
    /// not compile-time constants.
    pub fn primitive(class: Class, tag: u8, data: impl Into<Vec<u8>>) -> Self {
        assert!(tag < TAG_NUMBER_MASK, "tag number {} needs the high tag number form", tag);
        Self {
            class,
            constructed: false,
            tag,
            data: data.into(),
            children: Vec::new(),
        }
    }

    /// # Panics
    ///
    /// If `tag` is 31 or more. Use [`Packet::try_constructed`] for tags that are
    /// not compile-time constants.
    pub fn constructed(class: Class, tag: u8) -> Self {
        assert!(tag < TAG_NUMBER_MASK, "tag number {} needs the high tag number form", tag);
        Self {
            class,
            constructed: true,
            tag,
            data: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Universal constructed SEQUENCE with no children yet.
    pub fn sequence() -> Self {
        Self::constructed(Class::Universal, TAG_SEQUENCE)
    }

    pub fn octet_string(data: impl Into<Vec<u8>>) -> Self {
        Self::primitive(Class::Universal, TAG_OCTET_STRING, data)
    }

    pub fn string(s: &str) -> Self {
        Self::octet_string(s.as_bytes())
    }

    pub fn boolean(value: bool) -> Self {
        Self::primitive(Class::Universal, TAG_BOOLEAN, vec![if value { 0xFF } else { 0x00 }])
    }

    /// Integer content under an arbitrary tag (universal INTEGER, context-tagged fields, ...).
    pub fn integer(class: Class, tag: u8, value: i64) -> Self {
        Self::primitive(class, tag, encode_int64(value))
    }

    /// Appends a child. Ignored for primitive elements, which only carry data.
    pub fn push(&mut self, child: Packet) {
        if self.constructed {
            self.children.push(child);
        }
    }

    pub fn with_child(mut self, child: Packet) -> Self {
        self.push(child);
        self
    }

    pub fn children(&self) -> &[Packet] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&Packet> {
        self.children.get(index)
    }

    /// Raw content octets of a primitive element (empty for constructed ones).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Content octets as they appear on the wire: the data of a primitive
    /// element, or the concatenated encodings of a constructed element's children.
    pub fn content(&self) -> Vec<u8> {
        if self.constructed {
            let mut writer = BerWriter::new();
            for child in &self.children {
                writer.write_packet(child);
            }
            writer.into_vec()
        } else {
            self.data.clone()
        }
    }

    pub fn is_universal(&self, tag: u8) -> bool {
        self.class == Class::Universal && self.tag == tag
    }

    fn is_universal_primitive(&self, tag: u8) -> bool {
        self.is_universal(tag) && !self.constructed
    }

    /// Value of a universal BOOLEAN.
    pub fn as_bool(&self) -> Option<bool> {
        if !self.is_universal_primitive(TAG_BOOLEAN) {
            return None;
        }
        match self.data.as_slice() {
            [b] => Some(*b != 0),
            _ => None,
        }
    }

    /// Value of a universal INTEGER or ENUMERATED.
    pub fn as_i64(&self) -> Option<i64> {
        if self.is_universal_primitive(TAG_INTEGER) || self.is_universal_primitive(TAG_ENUMERATED) {
            parse_int64(&self.data).ok()
        } else {
            None
        }
    }

    /// Value of a universal OCTET STRING or UTF8String holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        if self.is_universal_primitive(TAG_OCTET_STRING) || self.is_universal_primitive(TAG_UTF8_STRING) {
            std::str::from_utf8(&self.data).ok()
        } else {
            None
        }
    }

    fn tag_byte(&self) -> u8 {
        let constructed = if self.constructed { CONSTRUCTED_BIT } else { 0 };
        self.class.bits() | constructed | self.tag
    }

    /// Decodes exactly one element; trailing bytes are an error.
    pub fn from_bytes(data: &[u8]) -> Result<Self, BerError> {
        let mut reader = BerReader::new(data);
        let packet = reader.read_packet(0)?;
        if reader.remaining() > 0 {
            return Err(BerError::TrailingData(reader.remaining()));
        }
        Ok(packet)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BerWriter::new();
        writer.write_packet(self);
        writer.into_vec()
    }

    /// Indented, human-readable rendering of the tree.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let kind = if self.constructed { "Constructed" } else { "Primitive" };
        let _ = write!(out, "{}{:?} {} {}", indent, self.class, kind, self.tag_name());
        if self.constructed {
            let _ = writeln!(out, " ({} children)", self.children.len());
            for child in &self.children {
                child.dump_into(out, depth + 1);
            }
            return;
        }
        if let Some(b) = self.as_bool() {
            let _ = writeln!(out, " {}", b);
        } else if let Some(i) = self.as_i64() {
            let _ = writeln!(out, " {}", i);
        } else if let Some(s) = self.as_str() {
            let _ = writeln!(out, " {:?}", s);
        } else {
            let _ = writeln!(out, " [{}] {}", self.data.len(), hex::encode(&self.data));
        }
    }

    fn tag_name(&self) -> String {
        if self.class != Class::Universal {
            return format!("[{}]", self.tag);
        }
        match self.tag {
            TAG_BOOLEAN => "Boolean".to_string(),
            TAG_INTEGER => "Integer".to_string(),
            TAG_OCTET_STRING => "OctetString".to_string(),
            TAG_ENUMERATED => "Enumerated".to_string(),
            TAG_UTF8_STRING => "UTF8String".to_string(),
            TAG_SEQUENCE => "Sequence".to_string(),
            other => format!("Tag({})", other),
        }
    }
}

/// Two's-complement big-endian integer of 1 to 8 octets.
pub fn parse_int64(bytes: &[u8]) -> Result<i64, BerError> {
    let first = match bytes.first() {
        Some(b) => *b,
        None => return Err(BerError::EmptyInteger),
    };
    if bytes.len() > 8 {
        return Err(BerError::IntegerTooLarge(bytes.len()));
    }
    // Sign extension
    let mut value: i64 = if first & 0x80 != 0 { -1 } else { 0 };
    for &byte in bytes {
        value = (value << 8) | byte as i64;
    }
    Ok(value)
}

/// Minimal two's-complement encoding of `value`.
pub fn encode_int64(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let next_high_bit = bytes[start + 1] & 0x80;
        let redundant = (bytes[start] == 0x00 && next_high_bit == 0)
            || (bytes[start] == 0xFF && next_high_bit != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

// BER parsing utilities
pub(crate) struct BerReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BerReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn read_tag(&mut self) -> Result<u8, BerError> {
        let buf = self.read_raw_bytes(1)?;
        Ok(buf[0])
    }

    fn read_length(&mut self) -> Result<usize, BerError> {
        let first_byte = self.read_tag()?;

        if (first_byte & 0x80) == 0 {
            // Short form
            Ok(first_byte as usize)
        } else {
            // Long form
            let length_bytes = (first_byte & 0x7F) as usize;
            if length_bytes == 0 {
                return Err(BerError::IndefiniteLength);
            }
            if length_bytes > 4 {
                return Err(BerError::LengthTooLarge(length_bytes));
            }
            let buf = self.read_raw_bytes(length_bytes)?;
            let mut length = 0u32;
            for byte in buf {
                length = (length << 8) | byte as u32;
            }
            Ok(length as usize)
        }
    }

    fn remaining(&self) -> usize {
        let pos = self.cursor.position() as usize;
        let len = self.cursor.get_ref().len();
        len.saturating_sub(pos)
    }

    fn read_raw_bytes(&mut self, n: usize) -> Result<Vec<u8>, BerError> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(BerError::Truncated { needed: n, remaining });
        }
        let mut buf = vec![0u8; n];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| BerError::Truncated { needed: n, remaining })?;
        Ok(buf)
    }

    pub(crate) fn read_packet(&mut self, depth: usize) -> Result<Packet, BerError> {
        if depth > MAX_DEPTH {
            return Err(BerError::TooDeep(MAX_DEPTH));
        }
        let tag_byte = self.read_tag()?;
        if tag_byte & TAG_NUMBER_MASK == TAG_NUMBER_MASK {
            return Err(BerError::HighTagNumber(tag_byte));
        }
        let length = self.read_length()?;
        let content = self.read_raw_bytes(length)?;
        let class = Class::from_tag_byte(tag_byte);
        let tag = tag_byte & TAG_NUMBER_MASK;

        if tag_byte & CONSTRUCTED_BIT == 0 {
            return Ok(Packet::primitive(class, tag, content));
        }
        let mut packet = Packet::constructed(class, tag);
        let mut inner = BerReader::new(&content);
        while inner.remaining() > 0 {
            packet.push(inner.read_packet(depth + 1)?);
        }
        Ok(packet)
    }
}

// BER encoding utilities
pub(crate) struct BerWriter {
    buffer: Vec<u8>,
}

impl BerWriter {
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn write_tag(&mut self, tag: u8) {
        self.buffer.push(tag);
    }

    fn write_length(&mut self, length: usize) {
        if length < 128 {
            // Short form
            self.buffer.push(length as u8);
        } else {
            // Long form
            let mut bytes = Vec::new();
            let mut len = length;
            while len > 0 {
                bytes.push((len & 0xFF) as u8);
                len >>= 8;
            }
            bytes.reverse();
            self.buffer.push(0x80 | bytes.len() as u8);
            self.buffer.extend_from_slice(&bytes);
        }
    }

    pub(crate) fn write_packet(&mut self, packet: &Packet) {
        self.write_tag(packet.tag_byte());
        let content = packet.content();
        self.write_length(content.len());
        self.buffer.extend_from_slice(&content);
    }

    pub(crate) fn into_vec(self) -> Vec<u8> {
        self.buffer
    }
}
