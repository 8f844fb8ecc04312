//! Record kinds and the catalogs that hold them.

mod clr;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::keywords::ClrKeywords;
use crate::layout::MAX_FIELDS;
use crate::schema::{Count, Element, FieldSpec, FieldType};
use crate::Guid;

pub use clr::{
    CLR_NATIVE_PROVIDER_GUID, CLR_PROVIDER_GUID, CLR_PROVIDER_NAME, CONTENTION_TASK_GUID,
    EXCEPTION_TASK_GUID, GC_TASK_GUID, LOADER_TASK_GUID, METHOD_TASK_GUID,
    RUNTIME_INFORMATION_TASK_GUID, STACK_TASK_GUID, TYPE_TASK_GUID,
};

/// Event id of kinds that can only be matched by task and opcode.
pub const ILLEGAL_EVENT_ID: u16 = 0xFFFF;

/// The identity and layout of one logical event type.
#[derive(Debug, Clone)]
pub struct RecordKind {
    pub event_id: u16,
    pub event_name: &'static str,
    pub task: u16,
    pub task_name: &'static str,
    pub task_guid: Guid,
    pub opcode: u8,
    pub opcode_name: &'static str,
    pub provider_guid: Guid,
    pub provider_name: &'static str,
    pub keywords: ClrKeywords,
    /// Newest version the layout describes. Newer payloads may only append.
    pub max_version: u8,
    pub fields: &'static [FieldSpec],
    /// Payload lengths of unrelated historical events that reused this id.
    pub legacy_lengths: &'static [usize],
}

impl RecordKind {
    pub fn has_event_id(&self) -> bool {
        self.event_id != ILLEGAL_EVENT_ID
    }

    /// Two kinds are the same dispatch target if they share
    /// `(event_id, provider_guid)` or `(opcode, task_guid)`.
    pub fn equivalent(&self, other: &RecordKind) -> bool {
        (self.has_event_id()
            && self.event_id == other.event_id
            && self.provider_guid == other.provider_guid)
            || (self.opcode == other.opcode && self.task_guid == other.task_guid)
    }

    /// The same kind under another provider identity.
    pub fn with_provider(&self, provider_guid: Guid) -> RecordKind {
        RecordKind {
            provider_guid,
            ..self.clone()
        }
    }

    fn check(&self) -> Result<()> {
        check_fields(self.event_name, self.fields)
    }
}

fn check_fields(kind: &'static str, fields: &'static [FieldSpec]) -> Result<()> {
    let invalid = |reason: String| Error::InvalidSchema { kind, reason };
    if fields.len() > MAX_FIELDS {
        return Err(invalid(format!(
            "{} fields, at most {} supported",
            fields.len(),
            MAX_FIELDS
        )));
    }
    for (index, field) in fields.iter().enumerate() {
        if let Some(until) = field.until {
            if until <= field.since {
                return Err(invalid(format!("field {} is never present", field.name)));
            }
        }
        let FieldType::Array(array) = field.ty else {
            continue;
        };
        if let Count::Field(count) = array.count {
            let earlier = fields[..index]
                .iter()
                .find(|f| f.name == count)
                .ok_or_else(|| {
                    invalid(format!(
                        "array {} counted by {}, which is not an earlier field",
                        field.name, count
                    ))
                })?;
            if !earlier.ty.is_integer() {
                return Err(invalid(format!(
                    "array {} counted by non-integer field {}",
                    field.name, count
                )));
            }
        }
        if let Element::Struct(element) = array.element {
            check_fields(kind, element)?;
        }
    }
    Ok(())
}

/// An immutable, ordered table of record kinds.
///
/// Declaration order matters: when two kinds are equivalent for dispatch,
/// the first declared one wins.
#[derive(Debug)]
pub struct Catalog {
    kinds: Vec<RecordKind>,
    native_provider: Option<Guid>,
}

static CLR: Lazy<Catalog> = Lazy::new(|| {
    Catalog::new(clr::kinds())
        .expect("the built-in CLR catalog is well formed")
        .with_native_alias(CLR_NATIVE_PROVIDER_GUID)
});

impl Catalog {
    pub fn new(kinds: Vec<RecordKind>) -> Result<Catalog> {
        for kind in &kinds {
            kind.check()?;
        }
        Ok(Catalog {
            kinds,
            native_provider: None,
        })
    }

    /// The runtime provider's catalog, built on first use.
    pub fn clr() -> &'static Catalog {
        &CLR
    }

    /// Also yield every kind under `provider`, which carries the same wire
    /// format under a second identity.
    pub fn with_native_alias(mut self, provider: Guid) -> Catalog {
        self.native_provider = Some(provider);
        self
    }

    pub fn native_provider(&self) -> Option<Guid> {
        self.native_provider
    }

    /// Every declared kind, duplicates included.
    pub fn declared(&self) -> &[RecordKind] {
        &self.kinds
    }

    /// First declared kind called `event_name`.
    pub fn kind(&self, event_name: &str) -> Option<&RecordKind> {
        self.kinds.iter().find(|k| k.event_name == event_name)
    }

    /// Calls `on_kind` with every distinct kind whose `(provider_name,
    /// event_name)` passes `filter`, in declaration order. A kind equivalent
    /// to one already yielded is skipped. Each yielded kind with a real event
    /// id is followed by its native-provider alias.
    pub fn enumerate(
        &self,
        mut filter: impl FnMut(&str, &str) -> bool,
        mut on_kind: impl FnMut(&RecordKind),
    ) {
        let mut yielded: Vec<&RecordKind> = Vec::with_capacity(self.kinds.len());
        for kind in &self.kinds {
            if !filter(kind.provider_name, kind.event_name) {
                continue;
            }
            if yielded.iter().any(|seen| seen.equivalent(kind)) {
                log::trace!("skipping duplicate definition of {}", kind.event_name);
                continue;
            }
            yielded.push(kind);
            on_kind(kind);
            if let Some(native) = self.native_provider {
                if kind.has_event_id() {
                    on_kind(&kind.with_provider(native));
                }
            }
        }
    }

    /// Collects what `enumerate` yields.
    pub fn kinds(&self, filter: impl FnMut(&str, &str) -> bool) -> Vec<RecordKind> {
        let mut out = Vec::new();
        self.enumerate(filter, |kind| out.push(kind.clone()));
        out
    }

    /// Keywords that must be enabled to receive every kind passing `filter`.
    pub fn keywords_for(&self, filter: impl FnMut(&str, &str) -> bool) -> ClrKeywords {
        let mut keywords = ClrKeywords::empty();
        self.enumerate(filter, |kind| keywords |= kind.keywords);
        keywords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fields::*;
    use crate::schema::ArraySpec;

    const EMPTY: &[FieldSpec] = &[];
    const BAD_VALUES: ArraySpec = ArraySpec {
        count: Count::Field("Count"),
        element: Element::Scalar(FieldType::U64),
    };
    const BAD: &[FieldSpec] = &[array("Values", &BAD_VALUES), u32("Count")];

    fn kind(event_id: u16, opcode: u8, fields: &'static [FieldSpec]) -> RecordKind {
        RecordKind {
            event_id,
            event_name: "Test",
            task: 1,
            task_name: "Task",
            task_guid: GC_TASK_GUID,
            opcode,
            opcode_name: "Op",
            provider_guid: CLR_PROVIDER_GUID,
            provider_name: CLR_PROVIDER_NAME,
            keywords: ClrKeywords::GC,
            max_version: 0,
            fields,
            legacy_lengths: &[],
        }
    }

    #[test]
    fn test_count_must_precede_array() {
        let err = Catalog::new(vec![kind(1, 1, BAD)]).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { kind: "Test", .. }));
    }

    #[test]
    fn test_equivalence() {
        let a = kind(1, 1, EMPTY);
        assert!(a.equivalent(&kind(1, 7, EMPTY)));
        assert!(a.equivalent(&kind(9, 1, EMPTY)));
        assert!(!a.equivalent(&kind(9, 7, EMPTY)));

        // Illegal ids never match by id.
        let classic = kind(ILLEGAL_EVENT_ID, 3, EMPTY);
        assert!(!classic.equivalent(&kind(ILLEGAL_EVENT_ID, 4, EMPTY)));
    }

    #[test]
    fn test_builtin_catalog_builds() {
        let catalog = Catalog::clr();
        assert!(catalog.kind("GCStart").is_some());
        assert_eq!(catalog.native_provider(), Some(CLR_NATIVE_PROVIDER_GUID));
    }
}
