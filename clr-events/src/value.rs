use std::fmt::{self, Display};

use crate::layout::read_unsigned;
use crate::raw::RawRecord;
use crate::schema::FieldType;
use crate::Guid;

/// A decoded field, as returned by the reflective accessors.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    F64(f64),
    Bool(bool),
    Address(u64),
    Guid(Guid),
    String(String),
    Bytes(&'a [u8]),
    /// A repeated group; elements are read through `RecordView::group`.
    Array { count: usize },
}

impl<'a> FieldValue<'a> {
    /// Reads a value of type `ty` at `offset`. Callers check readability.
    pub(crate) fn read(raw: &RawRecord<'a>, ty: FieldType, offset: usize) -> Self {
        match ty {
            FieldType::U8 => FieldValue::U8(raw.read_u8(offset)),
            FieldType::U16 => FieldValue::U16(raw.read_u16(offset)),
            FieldType::U32 => FieldValue::U32(raw.read_u32(offset)),
            FieldType::U64 => FieldValue::U64(raw.read_u64(offset)),
            FieldType::I32 => FieldValue::I32(raw.read_i32(offset)),
            FieldType::I64 => FieldValue::I64(raw.read_i64(offset)),
            FieldType::F64 => FieldValue::F64(raw.read_f64(offset)),
            FieldType::Bool => FieldValue::Bool(read_unsigned(raw, ty, offset) != 0),
            FieldType::Address => FieldValue::Address(raw.read_address(offset)),
            FieldType::Guid => FieldValue::Guid(raw.read_guid(offset)),
            FieldType::UnicodeString => FieldValue::String(raw.read_utf16_string(offset)),
            FieldType::Utf8String => FieldValue::String(raw.read_utf8_string(offset)),
            FieldType::Bytes(n) => FieldValue::Bytes(raw.bytes(offset, n)),
            FieldType::Array(_) => FieldValue::Array { count: 0 },
        }
    }

    /// The value an absent or truncated field reports.
    pub fn default_for(ty: FieldType) -> Self {
        match ty {
            FieldType::U8 => FieldValue::U8(0),
            FieldType::U16 => FieldValue::U16(0),
            FieldType::U32 => FieldValue::U32(0),
            FieldType::U64 => FieldValue::U64(0),
            FieldType::I32 => FieldValue::I32(0),
            FieldType::I64 => FieldValue::I64(0),
            FieldType::F64 => FieldValue::F64(0.0),
            FieldType::Bool => FieldValue::Bool(false),
            FieldType::Address => FieldValue::Address(0),
            FieldType::Guid => FieldValue::Guid(Guid::ZERO),
            FieldType::UnicodeString | FieldType::Utf8String => FieldValue::String(String::new()),
            FieldType::Bytes(_) => FieldValue::Bytes(&[]),
            FieldType::Array(_) => FieldValue::Array { count: 0 },
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::U8(v) => Some(v as u64),
            FieldValue::U16(v) => Some(v as u64),
            FieldValue::U32(v) => Some(v as u64),
            FieldValue::U64(v) | FieldValue::Address(v) => Some(v),
            FieldValue::I32(v) => Some(v as u32 as u64),
            FieldValue::I64(v) => Some(v as u64),
            FieldValue::Bool(v) => Some(v as u64),
            FieldValue::Array { count } => Some(count as u64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::U8(v) => write!(f, "{}", v),
            FieldValue::U16(v) => write!(f, "{}", v),
            FieldValue::U32(v) => write!(f, "{}", v),
            FieldValue::U64(v) => write!(f, "{}", v),
            FieldValue::I32(v) => write!(f, "{}", v),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Address(v) => write!(f, "0x{:x}", v),
            FieldValue::Guid(g) => write!(f, "{}", g),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Bytes(bytes) => {
                for b in bytes.iter() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            FieldValue::Array { count } => write!(f, "[{}]", count),
        }
    }
}
