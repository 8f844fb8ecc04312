//! Lazy typed access to one record payload.

use std::cell::Cell;
use std::fmt;

use crate::bulk::{Group, GroupCursor};
use crate::catalog::RecordKind;
use crate::layout::{self, read_unsigned, Slot};
use crate::raw::{PointerWidth, RawRecord};
use crate::schema::{FieldSpec, FieldType};
use crate::validate::{self, Validation};
use crate::value::FieldValue;
use crate::Guid;

/// Named field access shared by whole records and group elements.
///
/// Every getter recomputes the field's offset from the payload. A field
/// that is absent at the record's version, or whose bytes run past the end
/// of the payload, reads as the type's default: `0`, `false`, an empty
/// string or the zero GUID.
pub trait FieldAccess<'a> {
    fn raw(&self) -> RawRecord<'a>;

    /// The field called `name` and its slot, if present at this version.
    fn locate(&self, name: &str) -> Option<(&'static FieldSpec, Slot)>;

    /// The repeated group called `name`.
    fn group(&self, name: &str) -> Option<Group<'_, 'a>>;

    /// Present and fully inside the payload.
    fn has(&self, name: &str) -> bool {
        self.readable(name).is_some()
    }

    fn readable(&self, name: &str) -> Option<(&'static FieldSpec, Slot)> {
        let raw = self.raw();
        self.locate(name).filter(|(_, slot)| slot.readable(&raw))
    }

    fn u64(&self, name: &str) -> u64 {
        let raw = self.raw();
        self.readable(name)
            .map_or(0, |(spec, slot)| read_unsigned(&raw, spec.ty, slot.offset))
    }

    fn u32(&self, name: &str) -> u32 {
        self.u64(name) as u32
    }

    fn u16(&self, name: &str) -> u16 {
        self.u64(name) as u16
    }

    fn u8(&self, name: &str) -> u8 {
        self.u64(name) as u8
    }

    fn i32(&self, name: &str) -> i32 {
        self.u64(name) as u32 as i32
    }

    fn i64(&self, name: &str) -> i64 {
        self.u64(name) as i64
    }

    fn bool(&self, name: &str) -> bool {
        self.u64(name) != 0
    }

    /// A pointer-sized field, zero-extended.
    fn address(&self, name: &str) -> u64 {
        self.u64(name)
    }

    fn f64(&self, name: &str) -> f64 {
        match self.readable(name) {
            Some((spec, slot)) if matches!(spec.ty, FieldType::F64) => {
                self.raw().read_f64(slot.offset)
            }
            _ => 0.0,
        }
    }

    fn guid(&self, name: &str) -> Guid {
        match self.readable(name) {
            Some((spec, slot)) if matches!(spec.ty, FieldType::Guid) => {
                self.raw().read_guid(slot.offset)
            }
            _ => Guid::ZERO,
        }
    }

    fn string(&self, name: &str) -> String {
        let raw = self.raw();
        match self.readable(name) {
            Some((spec, slot)) => match spec.ty {
                FieldType::UnicodeString => raw.read_utf16_string(slot.offset),
                FieldType::Utf8String => raw.read_utf8_string(slot.offset),
                _ => String::new(),
            },
            None => String::new(),
        }
    }

    /// Generic access. `None` only when the field does not exist at this
    /// version; a truncated field yields its default.
    fn value(&self, name: &str) -> Option<FieldValue<'a>> {
        let (spec, slot) = self.locate(name)?;
        let raw = self.raw();
        Some(match spec.ty {
            FieldType::Array(_) => FieldValue::Array {
                count: self.group(name).map_or(0, |g| g.len()),
            },
            ty if slot.readable(&raw) => FieldValue::read(&raw, ty, slot.offset),
            ty => FieldValue::default_for(ty),
        })
    }
}

/// A record kind bound to one payload.
///
/// The view borrows the payload for the duration of a dispatch callback.
/// It carries a forward cursor for variable-stride groups, so it is not
/// `Sync`; use [`RecordView::deep_clone`] to keep a record past the callback.
#[derive(Clone)]
pub struct RecordView<'a> {
    kind: &'a RecordKind,
    raw: RawRecord<'a>,
    cursor: Cell<GroupCursor>,
}

impl<'a> RecordView<'a> {
    pub fn new(kind: &'a RecordKind, raw: RawRecord<'a>) -> Self {
        Self {
            kind,
            raw,
            cursor: Cell::new(GroupCursor::default()),
        }
    }

    /// Points the view at a new payload and forgets any cached group position.
    pub fn rebind(&mut self, raw: RawRecord<'a>) {
        self.raw = raw;
        self.cursor.set(GroupCursor::default());
    }

    pub fn kind(&self) -> &'a RecordKind {
        self.kind
    }

    pub fn version(&self) -> u8 {
        self.raw.version()
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.raw.pointer_width()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Names of the fields present at this record's version, in wire order.
    pub fn payload_names(&self) -> Vec<&'static str> {
        let version = self.version();
        self.kind
            .fields
            .iter()
            .filter(|f| f.present_in(version))
            .map(|f| f.name)
            .collect()
    }

    /// Value of the `index`th entry of `payload_names`.
    pub fn payload_value(&self, index: usize) -> Option<FieldValue<'a>> {
        let slot = layout::resolve_nth(&self.raw, self.kind.fields, self.version(), index)?;
        self.value(self.kind.fields[slot.index].name)
    }

    /// Payload length the kind's layout predicts for this version.
    pub fn predicted_len(&self) -> usize {
        layout::predicted_len(&self.raw, self.kind.fields, self.version())
    }

    pub fn validate(&self) -> Validation {
        validate::check(self)
    }

    /// Deep copy of the payload that can outlive the dispatch callback.
    pub fn deep_clone(&self) -> OwnedRecord {
        OwnedRecord {
            kind: self.kind.clone(),
            data: self.raw.data().to_vec(),
            version: self.raw.version(),
            pointer_width: self.raw.pointer_width(),
        }
    }
}

impl<'a> FieldAccess<'a> for RecordView<'a> {
    fn raw(&self) -> RawRecord<'a> {
        self.raw
    }

    fn locate(&self, name: &str) -> Option<(&'static FieldSpec, Slot)> {
        layout::locate(&self.raw, self.kind.fields, self.version(), 0, name)
    }

    fn group(&self, name: &str) -> Option<Group<'_, 'a>> {
        let (spec, index, offset) =
            layout::locate_start(&self.raw, self.kind.fields, self.version(), 0, name)?;
        let FieldType::Array(array) = spec.ty else {
            return None;
        };
        let count = layout::array_count(&self.raw, self.kind.fields, self.version(), 0, array);
        let count = if validate::is_legacy_shape(self.kind, &self.raw) {
            log::debug!(
                "{}: payload of {} bytes has the legacy shape, reading no elements",
                self.kind.event_name,
                self.raw.len()
            );
            0
        } else {
            count
        };
        Some(Group::new(
            self.raw,
            array,
            index,
            offset,
            count,
            Some(&self.cursor),
        ))
    }
}

impl fmt::Debug for RecordView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordView")
            .field("event", &self.kind.event_name)
            .field("raw", &self.raw)
            .finish()
    }
}

/// A record whose payload has been copied out of the dispatch buffer.
#[derive(Debug, Clone)]
pub struct OwnedRecord {
    kind: RecordKind,
    data: Vec<u8>,
    version: u8,
    pointer_width: PointerWidth,
}

impl OwnedRecord {
    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn view(&self) -> RecordView<'_> {
        RecordView::new(
            &self.kind,
            RawRecord::new(&self.data, self.version, self.pointer_width),
        )
    }
}
