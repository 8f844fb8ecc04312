use crate::catalog::{Catalog, RecordKind, CLR_NATIVE_PROVIDER_GUID, CLR_PROVIDER_GUID};
use crate::events::BulkType;
use crate::history::TypeNameHistory;
use crate::record::RecordView;
use crate::{EventHeader, RawEvent};

/// State carried from one record to the next, handed to every dispatch.
#[derive(Debug, Default)]
pub struct DecodeContext {
    type_names: TypeNameHistory,
}

impl DecodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a previously persisted type name store.
    pub fn with_type_names(type_names: TypeNameHistory) -> Self {
        Self { type_names }
    }

    pub fn type_names(&self) -> &TypeNameHistory {
        &self.type_names
    }

    pub fn type_names_mut(&mut self) -> &mut TypeNameHistory {
        &mut self.type_names
    }

    pub fn into_type_names(self) -> TypeNameHistory {
        self.type_names
    }

    /// Name of `type_id` in `process_id` as of `timestamp`.
    pub fn type_name(&self, type_id: u64, process_id: u32, timestamp: u64) -> Option<&str> {
        self.type_names.lookup(type_id, process_id, timestamp)
    }

    /// Learns what it can from `event`. Returns the number of type names
    /// recorded.
    pub fn observe(&mut self, event: &RawEvent) -> usize {
        let Some(kind) = bulk_type_kind(&event.header) else {
            return 0;
        };
        let view = RecordView::new(kind, event.raw());
        let header = &event.header;
        let mut recorded = 0;
        for entry in BulkType::new(&view).types() {
            if entry.name.is_empty() {
                continue;
            }
            self.type_names
                .add(entry.type_id, header.process_id, header.timestamp, entry.name);
            recorded += 1;
        }
        log::trace!("recorded {} type names", recorded);
        recorded
    }
}

fn bulk_type_kind(header: &EventHeader) -> Option<&'static RecordKind> {
    let kind = Catalog::clr().kind(BulkType::EVENT_NAME)?;
    let by_id = kind.event_id == header.event_id
        && (header.provider_guid == CLR_PROVIDER_GUID
            || header.provider_guid == CLR_NATIVE_PROVIDER_GUID);
    let by_opcode = kind.opcode == header.opcode && kind.task_guid == header.task_guid;
    (by_id || by_opcode).then_some(kind)
}
