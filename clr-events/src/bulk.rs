//! Repeated groups ("bulk" payloads).
//!
//! A group is `count` elements laid out back to back after a header. When
//! every element has the same size the offset of element `i` is closed
//! form. When elements embed strings or nested arrays, the offset is found
//! by scanning forward from the last element resolved on the same view,
//! which keeps ascending access amortized O(1) per element.

use std::cell::Cell;

use crate::layout::{self, element_end, Slot};
use crate::raw::RawRecord;
use crate::record::FieldAccess;
use crate::schema::{ArraySpec, Element, FieldSpec, FieldType};
use crate::value::FieldValue;

const NO_FIELD: usize = usize::MAX;

/// Last element resolved by a variable-stride group of a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupCursor {
    field: usize,
    index: usize,
    offset: usize,
}

impl Default for GroupCursor {
    fn default() -> Self {
        GroupCursor {
            field: NO_FIELD,
            index: 0,
            offset: 0,
        }
    }
}

#[derive(Clone, Copy)]
pub struct Group<'v, 'a> {
    raw: RawRecord<'a>,
    element: Element,
    field: usize,
    start: usize,
    count: usize,
    stride: Option<usize>,
    cursor: Option<&'v Cell<GroupCursor>>,
}

impl<'v, 'a> Group<'v, 'a> {
    /// `count` is the value of the count field; it is clamped here to what
    /// the payload can actually hold.
    pub(crate) fn new(
        raw: RawRecord<'a>,
        array: &ArraySpec,
        field: usize,
        start: usize,
        count: u64,
        cursor: Option<&'v Cell<GroupCursor>>,
    ) -> Self {
        let stride = array.fixed_stride(raw.pointer_width().bytes());
        let available = raw.len().saturating_sub(start);
        let min_size = match stride {
            Some(stride) => stride,
            None => min_element_size(&array.element),
        };
        let fits = if min_size == 0 {
            count
        } else {
            (available / min_size) as u64
        };
        let count = if count > fits {
            log::debug!(
                "group count {} exceeds the {} elements the payload can hold",
                count,
                fits
            );
            fits
        } else {
            count
        };
        Group {
            raw,
            element: array.element,
            field,
            start,
            count: usize::try_from(count).unwrap_or(usize::MAX),
            stride,
            cursor,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Offset of the first element.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Size of every element, if constant.
    pub fn stride(&self) -> Option<usize> {
        self.stride
    }

    /// Offset of element `index`.
    pub fn element_offset(&self, index: usize) -> Option<usize> {
        if index >= self.count {
            return None;
        }
        if let Some(stride) = self.stride {
            return Some(self.start + index * stride);
        }

        let cached = self.cursor.map(Cell::get).unwrap_or_default();
        let (mut at, mut offset) = if cached.field == self.field && index >= cached.index {
            (cached.index, cached.offset)
        } else {
            (0, self.start)
        };
        while at < index {
            offset = element_end(&self.raw, &self.element, offset);
            at += 1;
        }
        if let Some(cursor) = self.cursor {
            cursor.set(GroupCursor {
                field: self.field,
                index,
                offset,
            });
        }
        Some(offset)
    }

    pub fn element(&self, index: usize) -> Option<GroupElement<'a>> {
        let offset = self.element_offset(index)?;
        Some(GroupElement {
            raw: self.raw,
            element: self.element,
            offset,
        })
    }

    /// Offset just past the last element.
    pub fn end(&self) -> usize {
        match self.stride {
            Some(stride) => self.start + self.count * stride,
            None => match self.count.checked_sub(1).and_then(|last| self.element(last)) {
                Some(last) => last.end(),
                None => self.start,
            },
        }
    }

    pub fn iter(&self) -> GroupIter<'v, 'a> {
        GroupIter {
            group: *self,
            index: 0,
            offset: self.start,
        }
    }
}

impl<'v, 'a> IntoIterator for &Group<'v, 'a> {
    type Item = GroupElement<'a>;
    type IntoIter = GroupIter<'v, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iteration. Carries its own position so it never rescans.
pub struct GroupIter<'v, 'a> {
    group: Group<'v, 'a>,
    index: usize,
    offset: usize,
}

impl<'a> Iterator for GroupIter<'_, 'a> {
    type Item = GroupElement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.group.count {
            return None;
        }
        let element = GroupElement {
            raw: self.group.raw,
            element: self.group.element,
            offset: self.offset,
        };
        if let (None, Some(cursor)) = (self.group.stride, self.group.cursor) {
            cursor.set(GroupCursor {
                field: self.group.field,
                index: self.index,
                offset: self.offset,
            });
        }
        self.offset = element.end();
        self.index += 1;
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.group.count - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for GroupIter<'_, '_> {}

/// One element of a group.
#[derive(Clone, Copy)]
pub struct GroupElement<'a> {
    raw: RawRecord<'a>,
    element: Element,
    offset: usize,
}

impl<'a> GroupElement<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn end(&self) -> usize {
        element_end(&self.raw, &self.element, self.offset)
    }

    /// Payload bytes of the element, clamped to the payload.
    pub fn bytes(&self) -> &'a [u8] {
        self.raw.bytes(self.offset, self.end() - self.offset)
    }

    /// Value of a scalar element; `None` for struct elements.
    pub fn scalar(&self) -> Option<FieldValue<'a>> {
        let Element::Scalar(ty) = self.element else {
            return None;
        };
        let size = self.end() - self.offset;
        Some(if self.raw.contains(self.offset, size) {
            FieldValue::read(&self.raw, ty, self.offset)
        } else {
            FieldValue::default_for(ty)
        })
    }

    /// Scalar element as an integer, 0 when it is not one.
    pub fn as_u64(&self) -> u64 {
        match self.element {
            Element::Scalar(ty) => layout::read_unsigned(&self.raw, ty, self.offset),
            Element::Struct(_) => 0,
        }
    }

    /// Names of the fields of a struct element, in wire order.
    pub fn field_names(&self) -> Vec<&'static str> {
        match self.element {
            Element::Scalar(_) => Vec::new(),
            Element::Struct(fields) => fields
                .iter()
                .filter(|f| f.present_in(self.raw.version()))
                .map(|f| f.name)
                .collect(),
        }
    }
}

impl<'a> FieldAccess<'a> for GroupElement<'a> {
    fn raw(&self) -> RawRecord<'a> {
        self.raw
    }

    fn locate(&self, name: &str) -> Option<(&'static FieldSpec, Slot)> {
        match self.element {
            Element::Struct(fields) => {
                layout::locate(&self.raw, fields, self.raw.version(), self.offset, name)
            }
            Element::Scalar(_) => None,
        }
    }

    fn group(&self, name: &str) -> Option<Group<'_, 'a>> {
        let Element::Struct(fields) = self.element else {
            return None;
        };
        let version = self.raw.version();
        let (spec, index, offset) =
            layout::locate_start(&self.raw, fields, version, self.offset, name)?;
        let FieldType::Array(array) = spec.ty else {
            return None;
        };
        let count = layout::array_count(&self.raw, fields, version, self.offset, array);
        Some(Group::new(self.raw, array, index, offset, count, None))
    }
}

/// Lower bound on the size of one element, used to reject absurd counts.
fn min_element_size(element: &Element) -> usize {
    match element {
        Element::Scalar(ty) => scalar_min_size(ty),
        Element::Struct(fields) => fields.iter().map(|f| scalar_min_size(&f.ty)).sum(),
    }
}

fn scalar_min_size(ty: &FieldType) -> usize {
    match ty {
        FieldType::UnicodeString => 2,
        FieldType::Utf8String => 1,
        FieldType::Array(_) => 0,
        // Address may be 4 bytes in a 32-bit capture.
        FieldType::Address => 4,
        ty => ty.fixed_size(4).unwrap_or(0),
    }
}
