//! Offset resolution for versioned layouts.
//!
//! Every offset is recomputed from the payload on demand: the walk visits
//! the fields present at the record's version in physical order, sizing
//! strings by scanning for their terminator and arrays by their count field.

use crate::raw::RawRecord;
use crate::schema::{ArraySpec, Count, Element, FieldSpec, FieldType};

/// Upper bound on fields in one field list; checked when a catalog is built.
pub const MAX_FIELDS: usize = 32;

const ABSENT: usize = usize::MAX;

/// Where a field sits in one particular payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub offset: usize,
    pub end: usize,
}

impl Slot {
    pub fn size(&self) -> usize {
        self.end - self.offset
    }

    /// A field is readable when all of its bytes are inside the payload.
    pub fn readable(&self, raw: &RawRecord) -> bool {
        self.end <= raw.len()
    }
}

/// Walks the fields of `fields` present at `version`, starting at `start`.
///
/// `visit` sees each present field with its slot and returns `true` to stop
/// the walk early. Returns the offset just past the last visited field.
pub fn walk(
    raw: &RawRecord,
    fields: &[FieldSpec],
    version: u8,
    start: usize,
    mut visit: impl FnMut(&FieldSpec, Slot) -> bool,
) -> usize {
    debug_assert!(fields.len() <= MAX_FIELDS);
    let mut offsets = [ABSENT; MAX_FIELDS];
    let mut offset = start;
    for (index, spec) in fields.iter().enumerate().take(MAX_FIELDS) {
        if !spec.present_in(version) {
            continue;
        }
        offsets[index] = offset;
        let end = field_end(raw, fields, &offsets, spec, offset);
        let slot = Slot { index, offset, end };
        offset = end;
        if visit(spec, slot) {
            break;
        }
    }
    offset
}

/// Finds the first field called `name` that is present at `version`.
pub fn resolve(raw: &RawRecord, fields: &[FieldSpec], version: u8, name: &str) -> Option<Slot> {
    locate(raw, fields, version, 0, name).map(|(_, slot)| slot)
}

/// Like `resolve`, for a field list laid out from `start` (a group element).
pub fn locate<'f>(
    raw: &RawRecord,
    fields: &'f [FieldSpec],
    version: u8,
    start: usize,
    name: &str,
) -> Option<(&'f FieldSpec, Slot)> {
    let mut found = None;
    walk(raw, fields, version, start, |spec, slot| {
        if spec.name == name {
            found = Some(slot);
            true
        } else {
            false
        }
    });
    let slot = found?;
    Some((&fields[slot.index], slot))
}

/// Index and start offset of the first field called `name` present at
/// `version`. Only the fields before it are sized, so finding where a group
/// starts never scans the group itself.
pub fn locate_start<'f>(
    raw: &RawRecord,
    fields: &'f [FieldSpec],
    version: u8,
    start: usize,
    name: &str,
) -> Option<(&'f FieldSpec, usize, usize)> {
    debug_assert!(fields.len() <= MAX_FIELDS);
    let mut offsets = [ABSENT; MAX_FIELDS];
    let mut offset = start;
    for (index, spec) in fields.iter().enumerate().take(MAX_FIELDS) {
        if !spec.present_in(version) {
            continue;
        }
        if spec.name == name {
            return Some((spec, index, offset));
        }
        offsets[index] = offset;
        offset = field_end(raw, fields, &offsets, spec, offset);
    }
    None
}

/// Slot of the `n`th field present at `version`.
pub fn resolve_nth(raw: &RawRecord, fields: &[FieldSpec], version: u8, n: usize) -> Option<Slot> {
    let mut found = None;
    let mut seen = 0;
    walk(raw, fields, version, 0, |_, slot| {
        if seen == n {
            found = Some(slot);
            return true;
        }
        seen += 1;
        false
    });
    found
}

/// The payload length the layout predicts for this record's version.
pub fn predicted_len(raw: &RawRecord, fields: &[FieldSpec], version: u8) -> usize {
    walk(raw, fields, version, 0, |_, _| false)
}

fn field_end(
    raw: &RawRecord,
    fields: &[FieldSpec],
    offsets: &[usize],
    spec: &FieldSpec,
    offset: usize,
) -> usize {
    match spec.ty {
        FieldType::UnicodeString => raw.skip_utf16_string(offset),
        FieldType::Utf8String => raw.skip_utf8_string(offset),
        FieldType::Array(array) => {
            let count = count_in(raw, fields, offsets, array.count);
            array_end(raw, array, offset, count)
        }
        ty => offset.saturating_add(ty.fixed_size(raw.pointer_width().bytes()).unwrap_or(0)),
    }
}

fn count_in(raw: &RawRecord, fields: &[FieldSpec], offsets: &[usize], count: Count) -> u64 {
    match count {
        Count::Fixed(n) => n as u64,
        Count::Field(name) => fields
            .iter()
            .zip(offsets)
            .find(|(spec, offset)| spec.name == name && **offset != ABSENT)
            .map_or(0, |(spec, offset)| read_unsigned(raw, spec.ty, *offset)),
    }
}

/// Element count of the array described by `array` inside `fields`.
pub fn array_count(
    raw: &RawRecord,
    fields: &[FieldSpec],
    version: u8,
    start: usize,
    array: &ArraySpec,
) -> u64 {
    match array.count {
        Count::Fixed(n) => n as u64,
        Count::Field(name) => {
            let mut count = 0;
            walk(raw, fields, version, start, |spec, slot| {
                if spec.name == name {
                    count = read_unsigned(raw, spec.ty, slot.offset);
                    true
                } else {
                    false
                }
            });
            count
        }
    }
}

/// Offset just past `count` elements starting at `start`.
pub fn array_end(raw: &RawRecord, array: &ArraySpec, start: usize, count: u64) -> usize {
    if let Some(stride) = array.fixed_stride(raw.pointer_width().bytes()) {
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        return start.saturating_add(stride.saturating_mul(count));
    }
    let mut offset = start;
    for _ in 0..count {
        if offset >= raw.len() {
            // Count disagrees with the payload; the length wins.
            return raw.len().max(offset);
        }
        let next = element_end(raw, &array.element, offset);
        if next <= offset {
            break;
        }
        offset = next;
    }
    offset
}

#[cfg(test)]
thread_local! {
    /// Elements sized by `element_end` on this thread.
    pub(crate) static ELEMENT_SCANS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Offset just past one element starting at `offset`.
pub fn element_end(raw: &RawRecord, element: &Element, offset: usize) -> usize {
    #[cfg(test)]
    ELEMENT_SCANS.with(|scans| scans.set(scans.get() + 1));
    match element {
        Element::Scalar(FieldType::UnicodeString) => raw.skip_utf16_string(offset),
        Element::Scalar(FieldType::Utf8String) => raw.skip_utf8_string(offset),
        Element::Scalar(ty) => {
            offset.saturating_add(ty.fixed_size(raw.pointer_width().bytes()).unwrap_or(0))
        }
        Element::Struct(fields) => walk(raw, fields, raw.version(), offset, |_, _| false),
    }
}

/// Reads an integer-like field zero-extended to 64 bits, or 0 when it does
/// not fit in the payload.
pub fn read_unsigned(raw: &RawRecord, ty: FieldType, offset: usize) -> u64 {
    let Some(size) = ty.fixed_size(raw.pointer_width().bytes()) else {
        return 0;
    };
    if !raw.contains(offset, size) {
        return 0;
    }
    match ty {
        FieldType::U8 => raw.read_u8(offset) as u64,
        FieldType::U16 => raw.read_u16(offset) as u64,
        FieldType::U32 | FieldType::Bool => raw.read_u32(offset) as u64,
        FieldType::I32 => raw.read_i32(offset) as u32 as u64,
        FieldType::U64 | FieldType::I64 => raw.read_u64(offset),
        FieldType::Address => raw.read_address(offset),
        _ => 0,
    }
}
