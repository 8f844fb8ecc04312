// Strongly typed views over the generic record engine for the events most
// consumers care about. Each view borrows a `RecordView` and reads fields on
// access; version-gated fields read as their defaults on older payloads.

use crate::context::DecodeContext;
use crate::enums::*;
use crate::record::{FieldAccess, RecordView};
use crate::{EventHeader, Guid};

macro_rules! typed_view {
    ($(#[$meta:meta])* $name:ident, $event:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name<'v, 'a> {
            view: &'v RecordView<'a>,
        }

        impl<'v, 'a> $name<'v, 'a> {
            pub const EVENT_NAME: &'static str = $event;

            pub fn new(view: &'v RecordView<'a>) -> Self {
                Self { view }
            }

            pub fn view(&self) -> &'v RecordView<'a> {
                self.view
            }

            pub fn clr_instance_id(&self) -> u16 {
                self.view.u16("ClrInstanceID")
            }
        }
    };
}

typed_view!(GcStart, "GCStart");

impl GcStart<'_, '_> {
    pub fn count(&self) -> u32 {
        self.view.u32("Count")
    }

    /// Generation being collected; 0 before version 1.
    pub fn depth(&self) -> u32 {
        self.view.u32("Depth")
    }

    pub fn reason(&self) -> GcReason {
        decode_or(self.view.u64("Reason"), GcReason::AllocSmall, "GcReason")
    }

    pub fn gc_type(&self) -> GcType {
        decode_or(self.view.u64("Type"), GcType::Blocking, "GcType")
    }

    pub fn client_sequence_number(&self) -> u64 {
        self.view.u64("ClientSequenceNumber")
    }
}

typed_view!(GcEnd, "GCEnd");

impl GcEnd<'_, '_> {
    pub fn count(&self) -> u32 {
        self.view.u32("Count")
    }

    /// 16 bits wide in version 0, 32 bits afterwards.
    pub fn depth(&self) -> u32 {
        self.view.u32("Depth")
    }
}

typed_view!(GcTriggered, "GCTriggered");

impl GcTriggered<'_, '_> {
    pub fn reason(&self) -> GcReason {
        decode_or(self.view.u64("Reason"), GcReason::AllocSmall, "GcReason")
    }
}

typed_view!(GcAllocationTick, "GCAllocationTick");

impl GcAllocationTick<'_, '_> {
    /// Bytes allocated since the previous tick. Version 2 added a 64-bit
    /// amount; the 32-bit one saturates.
    pub fn allocation_amount(&self) -> u64 {
        if self.view.has("AllocationAmount64") {
            self.view.u64("AllocationAmount64")
        } else {
            self.view.u64("AllocationAmount")
        }
    }

    pub fn kind(&self) -> GcAllocationKind {
        decode_or(
            self.view.u64("AllocationKind"),
            GcAllocationKind::Small,
            "GcAllocationKind",
        )
    }

    pub fn type_id(&self) -> u64 {
        self.view.address("TypeID")
    }

    /// The name embedded in the event, empty before version 2.
    pub fn embedded_type_name(&self) -> String {
        self.view.string("TypeName")
    }

    pub fn heap_index(&self) -> u32 {
        self.view.u32("HeapIndex")
    }

    pub fn address(&self) -> u64 {
        self.view.address("Address")
    }

    pub fn object_size(&self) -> u64 {
        self.view.u64("ObjectSize")
    }

    /// The embedded name, or the name the context knew for the type id at
    /// the time of the event.
    pub fn type_name(&self, header: &EventHeader, ctx: &DecodeContext) -> Option<String> {
        let embedded = self.embedded_type_name();
        if !embedded.is_empty() {
            return Some(embedded);
        }
        ctx.type_name(self.type_id(), header.process_id, header.timestamp)
            .map(str::to_owned)
    }
}

typed_view!(GcSampledObjectAllocation, "GCSampledObjectAllocationHigh");

impl GcSampledObjectAllocation<'_, '_> {
    pub fn address(&self) -> u64 {
        self.view.address("Address")
    }

    pub fn type_id(&self) -> u64 {
        self.view.address("TypeID")
    }

    pub fn object_count_for_type_sample(&self) -> u32 {
        self.view.u32("ObjectCountForTypeSample")
    }

    pub fn total_size_for_type_sample(&self) -> u64 {
        self.view.u64("TotalSizeForTypeSample")
    }

    pub fn type_name<'c>(&self, header: &EventHeader, ctx: &'c DecodeContext) -> Option<&'c str> {
        ctx.type_name(self.type_id(), header.process_id, header.timestamp)
    }
}

typed_view!(
    /// Any of the method load and unload events, verbose or not.
    MethodLoad,
    "MethodLoadVerbose"
);

impl MethodLoad<'_, '_> {
    pub fn method_id(&self) -> u64 {
        self.view.u64("MethodID")
    }

    pub fn module_id(&self) -> u64 {
        self.view.u64("ModuleID")
    }

    pub fn start_address(&self) -> u64 {
        self.view.u64("MethodStartAddress")
    }

    pub fn size(&self) -> u32 {
        self.view.u32("MethodSize")
    }

    pub fn token(&self) -> u32 {
        self.view.u32("MethodToken")
    }

    pub fn flags(&self) -> MethodFlags {
        MethodFlags::from_bits_retain(self.view.u32("MethodFlags"))
    }

    pub fn tier(&self) -> MethodCompilationTier {
        self.flags().into()
    }

    /// Empty for the non-verbose events.
    pub fn namespace(&self) -> String {
        self.view.string("MethodNamespace")
    }

    pub fn name(&self) -> String {
        self.view.string("MethodName")
    }

    pub fn signature(&self) -> String {
        self.view.string("MethodSignature")
    }

    /// Name to display, falling back to the code address for methods the
    /// runtime did not name.
    pub fn display_name(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            format!("JIT[0x{:x}]", self.start_address())
        } else {
            name
        }
    }

    pub fn rejit_id(&self) -> u64 {
        self.view.u64("ReJITID")
    }
}

typed_view!(
    /// ModuleLoad or ModuleUnload.
    ModuleLoad,
    "ModuleLoad"
);

impl ModuleLoad<'_, '_> {
    pub fn module_id(&self) -> u64 {
        self.view.u64("ModuleID")
    }

    pub fn assembly_id(&self) -> u64 {
        self.view.u64("AssemblyID")
    }

    pub fn flags(&self) -> ModuleFlags {
        ModuleFlags::from_bits_retain(self.view.u32("ModuleFlags"))
    }

    pub fn il_path(&self) -> String {
        self.view.string("ModuleILPath")
    }

    pub fn native_path(&self) -> String {
        self.view.string("ModuleNativePath")
    }

    pub fn managed_pdb_signature(&self) -> Guid {
        self.view.guid("ManagedPdbSignature")
    }

    pub fn managed_pdb_age(&self) -> u32 {
        self.view.u32("ManagedPdbAge")
    }

    pub fn managed_pdb_build_path(&self) -> String {
        self.view.string("ManagedPdbBuildPath")
    }

    pub fn native_pdb_signature(&self) -> Guid {
        self.view.guid("NativePdbSignature")
    }

    pub fn native_pdb_age(&self) -> u32 {
        self.view.u32("NativePdbAge")
    }

    pub fn native_pdb_build_path(&self) -> String {
        self.view.string("NativePdbBuildPath")
    }
}

typed_view!(BulkType, "BulkType");

/// One type described by a BulkType record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkTypeEntry {
    pub type_id: u64,
    pub module_id: u64,
    pub type_name_id: u32,
    pub flags: TypeFlags,
    pub cor_element_type: u8,
    pub name: String,
    pub type_parameters: Vec<u64>,
}

impl BulkType<'_, '_> {
    pub fn count(&self) -> usize {
        self.view.group("Values").map_or(0, |g| g.len())
    }

    /// Entry `index`. Ascending access is cheap; see `bulk`.
    pub fn entry(&self, index: usize) -> Option<BulkTypeEntry> {
        let values = self.view.group("Values")?;
        values.element(index).map(|e| entry(&e))
    }

    /// Every entry, in payload order.
    pub fn types(&self) -> Vec<BulkTypeEntry> {
        self.view
            .group("Values")
            .map(|values| values.iter().map(|e| entry(&e)).collect())
            .unwrap_or_default()
    }
}

fn entry(element: &crate::bulk::GroupElement) -> BulkTypeEntry {
    BulkTypeEntry {
        type_id: element.u64("TypeID"),
        module_id: element.u64("ModuleID"),
        type_name_id: element.u32("TypeNameID"),
        flags: TypeFlags::from_bits_retain(element.u32("Flags")),
        cor_element_type: element.u8("CorElementType"),
        name: element.string("TypeName"),
        type_parameters: element
            .group("TypeParameters")
            .map(|g| g.iter().map(|p| p.as_u64()).collect())
            .unwrap_or_default(),
    }
}

/// A record view resolved to its typed view, where there is one.
#[derive(Clone, Copy)]
pub enum ClrEvent<'v, 'a> {
    GcStart(GcStart<'v, 'a>),
    GcEnd(GcEnd<'v, 'a>),
    GcTriggered(GcTriggered<'v, 'a>),
    GcAllocationTick(GcAllocationTick<'v, 'a>),
    GcSampledObjectAllocation(GcSampledObjectAllocation<'v, 'a>),
    MethodLoad(MethodLoad<'v, 'a>),
    MethodUnload(MethodLoad<'v, 'a>),
    ModuleLoad(ModuleLoad<'v, 'a>),
    ModuleUnload(ModuleLoad<'v, 'a>),
    BulkType(BulkType<'v, 'a>),
    Other(&'v RecordView<'a>),
}

impl<'v, 'a> ClrEvent<'v, 'a> {
    pub fn from_view(view: &'v RecordView<'a>) -> Self {
        match view.kind().event_name {
            "GCStart" => ClrEvent::GcStart(GcStart::new(view)),
            "GCEnd" => ClrEvent::GcEnd(GcEnd::new(view)),
            "GCTriggered" => ClrEvent::GcTriggered(GcTriggered::new(view)),
            "GCAllocationTick" => ClrEvent::GcAllocationTick(GcAllocationTick::new(view)),
            "GCSampledObjectAllocationHigh" => {
                ClrEvent::GcSampledObjectAllocation(GcSampledObjectAllocation::new(view))
            }
            "MethodLoad" | "MethodLoadVerbose" => ClrEvent::MethodLoad(MethodLoad::new(view)),
            "MethodUnload" | "MethodUnloadVerbose" => {
                ClrEvent::MethodUnload(MethodLoad::new(view))
            }
            "ModuleLoad" => ClrEvent::ModuleLoad(ModuleLoad::new(view)),
            "ModuleUnload" => ClrEvent::ModuleUnload(ModuleLoad::new(view)),
            "BulkType" => ClrEvent::BulkType(BulkType::new(view)),
            _ => ClrEvent::Other(view),
        }
    }

    pub fn view(&self) -> &'v RecordView<'a> {
        match self {
            ClrEvent::GcStart(e) => e.view(),
            ClrEvent::GcEnd(e) => e.view(),
            ClrEvent::GcTriggered(e) => e.view(),
            ClrEvent::GcAllocationTick(e) => e.view(),
            ClrEvent::GcSampledObjectAllocation(e) => e.view(),
            ClrEvent::MethodLoad(e) | ClrEvent::MethodUnload(e) => e.view(),
            ClrEvent::ModuleLoad(e) | ClrEvent::ModuleUnload(e) => e.view(),
            ClrEvent::BulkType(e) => e.view(),
            ClrEvent::Other(view) => *view,
        }
    }
}
