//! Declarative field metadata.
//!
//! A record kind is a `&'static [FieldSpec]` in physical order. Offsets are
//! not stored: they are derived on access by walking the fields present at
//! the record's version (see `layout`), so a field inserted at version N
//! shifts everything after it only for versions >= N.

use std::fmt;

/// Maps a raw integer to the name of the enumerator it encodes.
pub type EnumLookup = fn(u64) -> Option<&'static str>;

#[derive(Clone, Copy, Debug)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    I32,
    I64,
    F64,
    /// `win:Boolean`, 4 bytes on the wire.
    Bool,
    /// Pointer-sized, 4 or 8 bytes depending on the capture.
    Address,
    Guid,
    /// Null-terminated UTF-16.
    UnicodeString,
    /// Null-terminated UTF-8.
    Utf8String,
    Bytes(usize),
    Array(&'static ArraySpec),
}

impl FieldType {
    /// Size in bytes when it does not depend on payload contents.
    pub fn fixed_size(&self, pointer_size: usize) -> Option<usize> {
        Some(match self {
            FieldType::U8 => 1,
            FieldType::U16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::Bool => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
            FieldType::Address => pointer_size,
            FieldType::Guid => 16,
            FieldType::Bytes(n) => *n,
            FieldType::UnicodeString | FieldType::Utf8String | FieldType::Array(_) => {
                return None
            }
        })
    }

    /// True for types that may serve as an array element count.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldType::U8 | FieldType::U16 | FieldType::U32 | FieldType::U64
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::UnicodeString | FieldType::Utf8String)
    }
}

/// Where a repeated group takes its element count from.
#[derive(Clone, Copy, Debug)]
pub enum Count {
    /// An earlier integer field of the same field list.
    Field(&'static str),
    Fixed(u32),
}

#[derive(Clone, Copy, Debug)]
pub enum Element {
    Scalar(FieldType),
    Struct(&'static [FieldSpec]),
}

#[derive(Clone, Copy, Debug)]
pub struct ArraySpec {
    pub count: Count,
    pub element: Element,
}

impl ArraySpec {
    /// Stride of one element when every element has the same size.
    pub fn fixed_stride(&self, pointer_size: usize) -> Option<usize> {
        match self.element {
            Element::Scalar(ty) => ty.fixed_size(pointer_size),
            Element::Struct(fields) => fields
                .iter()
                .map(|f| f.ty.fixed_size(pointer_size))
                .sum(),
        }
    }
}

/// One field of a record layout.
#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// First version that carries the field.
    pub since: u8,
    /// First version that no longer carries the field, if any.
    pub until: Option<u8>,
    pub lookup: Option<EnumLookup>,
    pub hex: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        FieldSpec {
            name,
            ty,
            since: 0,
            until: None,
            lookup: None,
            hex: false,
        }
    }

    pub const fn since(mut self, version: u8) -> Self {
        self.since = version;
        self
    }

    pub const fn until(mut self, version: u8) -> Self {
        self.until = Some(version);
        self
    }

    pub const fn lookup(mut self, lookup: EnumLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Render as hexadecimal.
    pub const fn hex(mut self) -> Self {
        self.hex = true;
        self
    }

    pub fn present_in(&self, version: u8) -> bool {
        version >= self.since && self.until.map_or(true, |until| version < until)
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("since", &self.since)
            .field("until", &self.until)
            .finish()
    }
}

/// Shorthand constructors used by the catalog tables.
pub mod fields {
    use super::{ArraySpec, FieldSpec, FieldType};

    pub const fn u8(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::U8)
    }
    pub const fn u16(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::U16)
    }
    pub const fn u32(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::U32)
    }
    pub const fn u64(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::U64)
    }
    pub const fn i32(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::I32)
    }
    pub const fn f64(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::F64)
    }
    pub const fn boolean(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::Bool)
    }
    pub const fn address(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::Address).hex()
    }
    pub const fn guid(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::Guid)
    }
    pub const fn string(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::UnicodeString)
    }
    pub const fn utf8(name: &'static str) -> FieldSpec {
        FieldSpec::new(name, FieldType::Utf8String)
    }
    pub const fn array(name: &'static str, spec: &'static ArraySpec) -> FieldSpec {
        FieldSpec::new(name, FieldType::Array(spec))
    }
    pub const fn clr_instance_id() -> FieldSpec {
        FieldSpec::new("ClrInstanceID", FieldType::U16)
    }
}

#[cfg(test)]
mod tests {
    use super::fields::*;
    use super::*;

    const ROOT_EDGE_VALUE: &[FieldSpec] = &[
        address("RootedNodeAddress"),
        u8("GCRootKind"),
        u32("GCRootFlag"),
        address("GCRootID"),
    ];
    const ROOT_EDGE: ArraySpec = ArraySpec {
        count: Count::Field("Count"),
        element: Element::Struct(ROOT_EDGE_VALUE),
    };

    const NAMED_VALUE: &[FieldSpec] = &[u64("TypeID"), string("TypeName")];
    const NAMED: ArraySpec = ArraySpec {
        count: Count::Field("Count"),
        element: Element::Struct(NAMED_VALUE),
    };

    #[test]
    fn test_version_gating() {
        let depth = u32("Depth").since(1);
        assert!(!depth.present_in(0));
        assert!(depth.present_in(1));
        assert!(depth.present_in(7));

        let old_depth = u16("Depth").until(1);
        assert!(old_depth.present_in(0));
        assert!(!old_depth.present_in(1));
    }

    #[test]
    fn test_fixed_stride() {
        assert_eq!(ROOT_EDGE.fixed_stride(4), Some(13));
        assert_eq!(ROOT_EDGE.fixed_stride(8), Some(21));
        assert_eq!(NAMED.fixed_stride(8), None);
    }
}
