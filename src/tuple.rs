//! Tuples and their fixed-width physical encoding.
//!
//! Every field type has a fixed byte width, so a table's tuples all occupy
//! the same number of bytes on disk. That width, together with the page
//! size, determines how many slots fit on a page (see `storage::page`).

use crate::error::{Error, Result};
use crate::storage::page::PageId;
use byteorder::{ByteOrder, LittleEndian};

/// Total physical bytes of a text field: a u16 length prefix plus content,
/// zero-padded to the full width.
pub const TEXT_FIELD_BYTES: usize = 32;
const TEXT_MAX_LEN: usize = TEXT_FIELD_BYTES - 2;

/// Field types supported by the storage core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 4-byte little-endian signed integer.
    Int,
    /// Fixed-width text, at most `TEXT_FIELD_BYTES - 2` content bytes.
    Text,
}

impl FieldType {
    pub fn byte_width(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Text => TEXT_FIELD_BYTES,
        }
    }
}

/// A field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Int(_) => FieldType::Int,
            Value::Text(_) => FieldType::Text,
        }
    }
}

/// An ordered list of field types; its byte width is the fixed physical
/// record size for the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldType>,
}

impl Schema {
    pub fn new(fields: Vec<FieldType>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Fixed byte width of one encoded tuple.
    pub fn tuple_bytes(&self) -> usize {
        self.fields.iter().map(|f| f.byte_width()).sum()
    }
}

/// Location of one tuple: page plus slot index. Valid only while the owning
/// page's occupancy bitmap marks the slot used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}

/// A row of values, plus its on-disk location once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub values: Vec<Value>,
    pub record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            record_id: None,
        }
    }

    /// Encodes the tuple into its fixed-width physical record.
    pub fn encode(&self, schema: &Schema) -> Result<Vec<u8>> {
        if self.values.len() != schema.field_count() {
            return Err(Error::SchemaMismatch {
                expected: schema.field_count(),
                actual: self.values.len(),
            });
        }

        let mut buf = vec![0u8; schema.tuple_bytes()];
        let mut offset = 0;
        for (value, field) in self.values.iter().zip(schema.fields()) {
            if value.field_type() != *field {
                return Err(Error::SchemaMismatch {
                    expected: schema.field_count(),
                    actual: self.values.len(),
                });
            }
            match value {
                Value::Int(v) => {
                    LittleEndian::write_i32(&mut buf[offset..offset + 4], *v);
                }
                Value::Text(s) => {
                    let bytes = s.as_bytes();
                    if bytes.len() > TEXT_MAX_LEN {
                        return Err(Error::ValueTooLarge {
                            len: bytes.len(),
                            max: TEXT_MAX_LEN,
                        });
                    }
                    LittleEndian::write_u16(&mut buf[offset..offset + 2], bytes.len() as u16);
                    buf[offset + 2..offset + 2 + bytes.len()].copy_from_slice(bytes);
                }
            }
            offset += field.byte_width();
        }
        Ok(buf)
    }

    /// Decodes a physical record produced by `encode`.
    pub fn decode(schema: &Schema, data: &[u8]) -> Result<Tuple> {
        let mut values = Vec::with_capacity(schema.field_count());
        let mut offset = 0;
        for field in schema.fields() {
            match field {
                FieldType::Int => {
                    values.push(Value::Int(LittleEndian::read_i32(&data[offset..offset + 4])));
                }
                FieldType::Text => {
                    let len = LittleEndian::read_u16(&data[offset..offset + 2]) as usize;
                    let len = len.min(TEXT_MAX_LEN);
                    let text = String::from_utf8_lossy(&data[offset + 2..offset + 2 + len]);
                    values.push(Value::Text(text.into_owned()));
                }
            }
            offset += field.byte_width();
        }
        Ok(Tuple::new(values))
    }
}
