//! Declarative record codec
//!
//! A [`Layout`] is an ordered list of [`FieldSpec`] descriptors. One generic
//! routine walks the list to decode bytes into a [`Record`] and to encode a
//! [`Record`] back into bytes, so each wire record has a single source of
//! truth for its shape.
//!
//! # Encoding rules
//!
//! - Integers are little-endian.
//! - Text is UTF-16LE without a terminator; terminators and region padding
//!   are separate fields.
//! - Computed fields ([`FieldKind::LengthOf`], [`FieldKind::ZeroPad`]) are
//!   re-derived from the other values on every encode. Whatever the record
//!   holds for them is ignored.

use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use super::{Error, Result, guid};

/// Shape of a single field on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Little-endian `u16`
    U16,
    /// Little-endian `u32`
    U32,
    /// Little-endian `u64`
    U64,
    /// Fixed number of raw bytes
    Bytes(usize),
    /// 16-byte GUID in little-endian group order
    Guid,
    /// Another record embedded in place
    Nested(&'static Layout),
    /// UTF-16LE text followed by zero bytes up to a fixed region size
    Utf16Region {
        /// Total region size in bytes (text + padding)
        size: usize,
    },
    /// UTF-16LE text whose byte length is `value(length_field) - overhead`
    Utf16Sized {
        /// Earlier `u32` field holding the declared length
        length_field: &'static str,
        /// Bytes counted by the length field that are not part of the text
        overhead: u32,
    },
    /// Computed `u32`: UTF-16 byte length of `target` plus `extra`
    LengthOf {
        /// Text field being measured
        target: &'static str,
        /// Constant added to the measured length
        extra: u32,
    },
    /// Computed run of zero bytes
    ZeroPad(usize),
}

impl FieldKind {
    /// Whether the encoder derives this field instead of reading the record
    #[must_use]
    pub const fn is_computed(self) -> bool {
        matches!(self, Self::LengthOf { .. } | Self::ZeroPad(_))
    }

    /// Wire width if it does not depend on the field's value
    #[must_use]
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::U16 => Some(2),
            Self::U32 | Self::LengthOf { .. } => Some(4),
            Self::U64 => Some(8),
            Self::Bytes(n) | Self::ZeroPad(n) => Some(n),
            Self::Guid => Some(guid::GUID_SIZE),
            Self::Utf16Region { size } => Some(size),
            Self::Nested(layout) => layout.fixed_size(),
            Self::Utf16Sized { .. } => None,
        }
    }
}

/// A named field in a [`Layout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, unique within its layout
    pub name: &'static str,
    /// Wire shape
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Create a field descriptor
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Ordered field list describing one record type
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    name: &'static str,
    fields: &'static [FieldSpec],
}

impl Layout {
    /// Create a layout from its fields, in wire order
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { name, fields }
    }

    /// Layout name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Fields in wire order
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Position of a field by name
    #[must_use]
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|spec| spec.name == field)
    }

    /// Total encoded size, when every field has a fixed width
    #[must_use]
    pub fn fixed_size(&self) -> Option<usize> {
        self.fields
            .iter()
            .try_fold(0usize, |acc, spec| Some(acc + spec.kind.fixed_width()?))
    }

    /// Decode a record that spans the whole buffer
    pub fn decode(&'static self, bytes: &[u8]) -> Result<Record> {
        let (record, used) = self.decode_prefix(bytes)?;
        if used != bytes.len() {
            return Err(Error::TrailingBytes {
                layout: self.name,
                extra: bytes.len() - used,
            });
        }
        Ok(record)
    }

    /// Decode a record from the start of the buffer
    ///
    /// Returns the record and the number of bytes consumed; anything after
    /// that is left to the caller.
    pub fn decode_prefix(&'static self, bytes: &[u8]) -> Result<(Record, usize)> {
        let mut buf = bytes;
        let mut values: Vec<Option<Value>> = Vec::with_capacity(self.fields.len());

        for spec in self.fields {
            let value = self.decode_field(spec, &mut buf, &values)?;
            values.push(Some(value));
        }

        let used = bytes.len() - buf.remaining();
        Ok((
            Record {
                layout: self,
                values,
            },
            used,
        ))
    }

    fn decode_field(
        &self,
        spec: &FieldSpec,
        buf: &mut &[u8],
        decoded: &[Option<Value>],
    ) -> Result<Value> {
        let field = spec.name;
        let value = match spec.kind {
            FieldKind::U16 => {
                ensure_remaining(field, buf, 2)?;
                Value::U16(buf.get_u16_le())
            }
            FieldKind::U32 | FieldKind::LengthOf { .. } => {
                ensure_remaining(field, buf, 4)?;
                Value::U32(buf.get_u32_le())
            }
            FieldKind::U64 => {
                ensure_remaining(field, buf, 8)?;
                Value::U64(buf.get_u64_le())
            }
            FieldKind::Bytes(n) | FieldKind::ZeroPad(n) => {
                ensure_remaining(field, buf, n)?;
                Value::Bytes(buf.copy_to_bytes(n))
            }
            FieldKind::Guid => {
                ensure_remaining(field, buf, guid::GUID_SIZE)?;
                let id = guid::decode(&buf[..guid::GUID_SIZE])?;
                buf.advance(guid::GUID_SIZE);
                Value::Guid(id)
            }
            FieldKind::Nested(layout) => {
                let (record, used) = layout.decode_prefix(buf)?;
                buf.advance(used);
                Value::Record(record)
            }
            FieldKind::Utf16Region { size } => {
                ensure_remaining(field, buf, size)?;
                let region = &buf[..size];
                let text_len = region
                    .chunks_exact(2)
                    .position(|unit| unit == [0, 0])
                    .map_or(size - size % 2, |units| units * 2);
                let text = decode_utf16(field, &region[..text_len])?;
                buf.advance(size);
                Value::Text(text)
            }
            FieldKind::Utf16Sized {
                length_field,
                overhead,
            } => {
                let declared = self
                    .index_of(length_field)
                    .and_then(|idx| decoded.get(idx))
                    .and_then(Option::as_ref)
                    .and_then(Value::as_u32)
                    .ok_or(Error::UndeterminedLength {
                        field,
                        length_field,
                    })?;
                let available = buf.remaining();
                let max = available as u64 + u64::from(overhead);
                if declared < overhead || u64::from(declared) > max {
                    return Err(Error::LengthOutOfRange {
                        field: length_field,
                        declared: u64::from(declared),
                        min: u64::from(overhead),
                        max,
                    });
                }
                let len = (declared - overhead) as usize;
                let text = decode_utf16(field, &buf[..len])?;
                buf.advance(len);
                Value::Text(text)
            }
        };
        Ok(value)
    }

    /// Encode a record into a fresh buffer
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.fixed_size().unwrap_or(64));
        self.encode_into(record, &mut out)?;
        Ok(out)
    }

    /// Append the encoded record to `out`
    ///
    /// On error `out` may hold a partially written record.
    pub fn encode_into(&self, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        if record.layout != self {
            return Err(Error::FieldType {
                field: self.name,
                expected: "record of matching layout",
            });
        }

        for (idx, spec) in self.fields.iter().enumerate() {
            let field = spec.name;
            match spec.kind {
                FieldKind::U16 => out.put_u16_le(record.value_at(idx)?.expect_u16(field)?),
                FieldKind::U32 => out.put_u32_le(record.value_at(idx)?.expect_u32(field)?),
                FieldKind::U64 => out.put_u64_le(record.value_at(idx)?.expect_u64(field)?),
                FieldKind::Bytes(n) => {
                    let bytes = record.value_at(idx)?.expect_bytes(field)?;
                    if bytes.len() != n {
                        return Err(Error::LengthOutOfRange {
                            field,
                            declared: bytes.len() as u64,
                            min: n as u64,
                            max: n as u64,
                        });
                    }
                    out.put_slice(bytes);
                }
                FieldKind::Guid => {
                    let id = record.value_at(idx)?.expect_guid(field)?;
                    guid::encode_into(id, out)?;
                }
                FieldKind::Nested(layout) => {
                    let nested = record.value_at(idx)?.expect_record(field)?;
                    layout.encode_into(nested, out)?;
                }
                FieldKind::Utf16Region { size } => {
                    let text = record.value_at(idx)?.expect_text(field)?;
                    if text.contains('\0') {
                        return Err(Error::EmbeddedNul { field });
                    }
                    let len = utf16_len(text);
                    if len > size {
                        return Err(Error::TextTooLong {
                            field,
                            len,
                            max: size,
                        });
                    }
                    put_utf16(out, text);
                    out.put_bytes(0, size - len);
                }
                FieldKind::Utf16Sized { .. } => {
                    let text = record.value_at(idx)?.expect_text(field)?;
                    put_utf16(out, text);
                }
                FieldKind::LengthOf { target, extra } => {
                    let text = record.text(target)?;
                    let len = utf16_len(text) as u64 + u64::from(extra);
                    let len = u32::try_from(len).map_err(|_| Error::LengthOutOfRange {
                        field,
                        declared: len,
                        min: u64::from(extra),
                        max: u64::from(u32::MAX),
                    })?;
                    out.put_u32_le(len);
                }
                FieldKind::ZeroPad(n) => out.put_bytes(0, n),
            }
        }
        Ok(())
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `u16` field
    U16(u16),
    /// `u32` field
    U32(u32),
    /// `u64` field
    U64(u64),
    /// Raw bytes
    Bytes(Bytes),
    /// GUID
    Guid(Uuid),
    /// UTF-16 text, held as a Rust string
    Text(String),
    /// Nested record
    Record(Record),
}

impl Value {
    /// The value as `u32`, if it is one
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    fn expect_u16(&self, field: &'static str) -> Result<u16> {
        match self {
            Self::U16(v) => Ok(*v),
            _ => Err(Error::FieldType {
                field,
                expected: "u16",
            }),
        }
    }

    fn expect_u32(&self, field: &'static str) -> Result<u32> {
        self.as_u32().ok_or(Error::FieldType {
            field,
            expected: "u32",
        })
    }

    fn expect_u64(&self, field: &'static str) -> Result<u64> {
        match self {
            Self::U64(v) => Ok(*v),
            _ => Err(Error::FieldType {
                field,
                expected: "u64",
            }),
        }
    }

    fn expect_bytes(&self, field: &'static str) -> Result<&Bytes> {
        match self {
            Self::Bytes(v) => Ok(v),
            _ => Err(Error::FieldType {
                field,
                expected: "bytes",
            }),
        }
    }

    fn expect_guid(&self, field: &'static str) -> Result<&Uuid> {
        match self {
            Self::Guid(v) => Ok(v),
            _ => Err(Error::FieldType {
                field,
                expected: "GUID",
            }),
        }
    }

    fn expect_text(&self, field: &'static str) -> Result<&str> {
        match self {
            Self::Text(v) => Ok(v),
            _ => Err(Error::FieldType {
                field,
                expected: "text",
            }),
        }
    }

    fn expect_record(&self, field: &'static str) -> Result<&Record> {
        match self {
            Self::Record(v) => Ok(v),
            _ => Err(Error::FieldType {
                field,
                expected: "nested record",
            }),
        }
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Guid(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

/// Field values for one [`Layout`], in layout order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    layout: &'static Layout,
    values: Vec<Option<Value>>,
}

impl Record {
    /// Create a record with no values set
    #[must_use]
    pub fn new(layout: &'static Layout) -> Self {
        Self {
            layout,
            values: vec![None; layout.fields.len()],
        }
    }

    /// Layout this record follows
    #[must_use]
    pub const fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Set a field value
    pub fn set(&mut self, field: &'static str, value: impl Into<Value>) -> Result<()> {
        let idx = self.index(field)?;
        self.values[idx] = Some(value.into());
        Ok(())
    }

    /// Builder-style [`Record::set`]
    pub fn with(mut self, field: &'static str, value: impl Into<Value>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Look up a field value
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.layout
            .index_of(field)
            .and_then(|idx| self.values[idx].as_ref())
    }

    /// Iterate over `(name, value)` pairs that are set
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.layout
            .fields
            .iter()
            .zip(&self.values)
            .filter_map(|(spec, value)| value.as_ref().map(|v| (spec.name, v)))
    }

    /// `u16` field
    pub fn u16(&self, field: &'static str) -> Result<u16> {
        self.require(field)?.expect_u16(field)
    }

    /// `u32` field
    pub fn u32(&self, field: &'static str) -> Result<u32> {
        self.require(field)?.expect_u32(field)
    }

    /// `u64` field
    pub fn u64(&self, field: &'static str) -> Result<u64> {
        self.require(field)?.expect_u64(field)
    }

    /// Raw bytes field
    pub fn bytes(&self, field: &'static str) -> Result<&Bytes> {
        self.require(field)?.expect_bytes(field)
    }

    /// GUID field
    pub fn guid(&self, field: &'static str) -> Result<Uuid> {
        self.require(field)?.expect_guid(field).copied()
    }

    /// Text field
    pub fn text(&self, field: &'static str) -> Result<&str> {
        self.require(field)?.expect_text(field)
    }

    /// Nested record field
    pub fn record(&self, field: &'static str) -> Result<&Record> {
        self.require(field)?.expect_record(field)
    }

    /// Encode with this record's layout
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.layout.encode(self)
    }

    fn index(&self, field: &'static str) -> Result<usize> {
        self.layout.index_of(field).ok_or(Error::UnknownField {
            layout: self.layout.name,
            field,
        })
    }

    fn require(&self, field: &'static str) -> Result<&Value> {
        let idx = self.index(field)?;
        self.value_at(idx)
    }

    fn value_at(&self, idx: usize) -> Result<&Value> {
        self.values[idx].as_ref().ok_or(Error::MissingField {
            layout: self.layout.name,
            field: self.layout.fields[idx].name,
        })
    }
}

/// UTF-16 byte length of a string
#[must_use]
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count() * 2
}

fn put_utf16(out: &mut Vec<u8>, text: &str) {
    for unit in text.encode_utf16() {
        out.put_u16_le(unit);
    }
}

fn decode_utf16(field: &'static str, bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::OddTextLength {
            field,
            len: bytes.len(),
        });
    }
    let units = bytes
        .chunks_exact(2)
        .map(|unit| u16::from_le_bytes([unit[0], unit[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|_| Error::InvalidUtf16 { field })
}

fn ensure_remaining(field: &'static str, buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(Error::Truncated {
            field,
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}
