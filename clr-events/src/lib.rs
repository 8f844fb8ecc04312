// Decoding of CoreCLR runtime event payloads.
//
// A record kind's layout is declarative metadata (see `catalog`); one
// generic engine (`layout`, `record`, `bulk`) decodes any kind lazily
// from the raw payload bytes.

mod guid;

pub mod bulk;
pub mod catalog;
pub mod context;
pub mod enums;
pub mod error;
pub mod events;
pub mod history;
pub mod keywords;
pub mod layout;
pub mod raw;
pub mod record;
pub mod registry;
pub mod render;
pub mod schema;
pub mod validate;
pub mod value;

pub use bulk::{Group, GroupElement};
pub use catalog::{Catalog, RecordKind, ILLEGAL_EVENT_ID};
pub use context::DecodeContext;
pub use error::{Error, Result};
pub use guid::Guid;
pub use history::{HistoryMap, TypeNameHistory};
pub use keywords::{provider_enable_string, ClrKeywords, TraceLevel};
pub use raw::{PointerWidth, RawRecord};
pub use record::{FieldAccess, OwnedRecord, RecordView};
pub use registry::{Registry, RegistryOptions, SubscriptionHandle};
pub use validate::Validation;
pub use value::FieldValue;

/// Identity and timing of one delivered event, as reported by the trace
/// source.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventHeader {
    pub provider_guid: Guid,
    pub event_id: u16,
    pub task_guid: Guid,
    pub opcode: u8,
    pub version: u8,
    pub pointer_width: PointerWidth,
    pub timestamp: u64,
    pub process_id: u32,
    pub thread_id: u32,
}

/// An event as handed over by the trace source. The payload is only valid
/// for the duration of the dispatch.
#[derive(Debug, Clone, Copy)]
pub struct RawEvent<'a> {
    pub header: EventHeader,
    pub payload: &'a [u8],
}

impl<'a> RawEvent<'a> {
    pub fn new(header: EventHeader, payload: &'a [u8]) -> Self {
        Self { header, payload }
    }

    pub fn raw(&self) -> RawRecord<'a> {
        RawRecord::new(self.payload, self.header.version, self.header.pointer_width)
    }
}
