//! Little-endian GUID codec
//!
//! KMS carries GUIDs in the Windows in-memory order: the first three groups
//! (4, 2 and 2 bytes) are little-endian, the last 8 bytes are copied as-is.
//! This differs from the RFC 4122 network order most GUID encoders use.

use bytes::Bytes;
use uuid::Uuid;

use super::codec::{FieldKind, FieldSpec, Layout, Record};
use super::{Error, Result};

/// Encoded GUID size in bytes
pub const GUID_SIZE: usize = 16;

/// GUID groups as they appear on the wire
pub static GUID_LAYOUT: Layout = Layout::new(
    "Guid",
    &[
        FieldSpec::new("data1", FieldKind::U32),
        FieldSpec::new("data2", FieldKind::U16),
        FieldSpec::new("data3", FieldKind::U16),
        FieldSpec::new("data4", FieldKind::Bytes(8)),
    ],
);

/// Decode a GUID from the first 16 bytes of `bytes`
pub fn decode(bytes: &[u8]) -> Result<Uuid> {
    let (record, _) = GUID_LAYOUT.decode_prefix(bytes)?;
    from_record(&record)
}

/// Encode a GUID into its 16 wire bytes
pub fn encode(id: &Uuid) -> Result<Vec<u8>> {
    GUID_LAYOUT.encode(&to_record(id)?)
}

/// Append the 16 wire bytes of a GUID to `out`
pub fn encode_into(id: &Uuid, out: &mut Vec<u8>) -> Result<()> {
    GUID_LAYOUT.encode_into(&to_record(id)?, out)
}

/// Split a GUID into a [`GUID_LAYOUT`] record
pub fn to_record(id: &Uuid) -> Result<Record> {
    let (data1, data2, data3, data4) = id.as_fields();
    Record::new(&GUID_LAYOUT)
        .with("data1", data1)?
        .with("data2", data2)?
        .with("data3", data3)?
        .with("data4", Bytes::copy_from_slice(data4))
}

/// Rebuild a GUID from a [`GUID_LAYOUT`] record
pub fn from_record(record: &Record) -> Result<Uuid> {
    let data4: [u8; 8] = record
        .bytes("data4")?
        .as_ref()
        .try_into()
        .map_err(|_| Error::FieldType {
            field: "data4",
            expected: "8 bytes",
        })?;
    Ok(Uuid::from_fields(
        record.u32("data1")?,
        record.u16("data2")?,
        record.u16("data3")?,
        &data4,
    ))
}
