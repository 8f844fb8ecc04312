// Layouts of the Microsoft-Windows-DotNETRuntime provider.
//
// Kinds are declared in dispatch priority order: when two declarations are
// equivalent (same id, or same task and opcode) the earlier one wins.

use super::{RecordKind, ILLEGAL_EVENT_ID};
use crate::enums::{GcAllocationKind, GcReason, GcRootKind, GcSegmentType, GcSuspendEeReason, GcType};
use crate::keywords::ClrKeywords;
use crate::schema::fields::*;
use crate::schema::{ArraySpec, Count, Element, FieldSpec, FieldType};
use crate::Guid;

pub const CLR_PROVIDER_NAME: &str = "Microsoft-Windows-DotNETRuntime";

pub const CLR_PROVIDER_GUID: Guid = Guid::from_fields(
    0xe13c0d23,
    0xccbc,
    0x4e12,
    [0x93, 0x1b, 0xd9, 0xcc, 0x2e, 0xee, 0x27, 0xe4],
);

/// Ahead-of-time compiled runtimes log the same events under this GUID.
pub const CLR_NATIVE_PROVIDER_GUID: Guid = Guid::from_fields(
    0x47c3ba0c,
    0x77f1,
    0x4eb0,
    [0x8d, 0x4d, 0xae, 0xf4, 0x47, 0xf1, 0x6a, 0x85],
);

pub const GC_TASK_GUID: Guid = Guid::from_fields(
    0x044973cd,
    0x251f,
    0x4dff,
    [0xa3, 0xe9, 0x9d, 0x63, 0x07, 0x28, 0x6b, 0x05],
);
pub const EXCEPTION_TASK_GUID: Guid = Guid::from_fields(
    0x300ce105,
    0x86d1,
    0x41f8,
    [0xb9, 0xd2, 0x83, 0xfc, 0xbf, 0xf3, 0x2d, 0x99],
);
pub const CONTENTION_TASK_GUID: Guid = Guid::from_fields(
    0x561410f5,
    0xa138,
    0x4ab3,
    [0x94, 0x5e, 0x51, 0x64, 0x83, 0xcd, 0xdf, 0xbc],
);
pub const METHOD_TASK_GUID: Guid = Guid::from_fields(
    0x3044f61a,
    0x99b0,
    0x4c21,
    [0xb2, 0x03, 0xd3, 0x94, 0x23, 0xc7, 0x3b, 0x00],
);
pub const LOADER_TASK_GUID: Guid = Guid::from_fields(
    0xd00792da,
    0x07b7,
    0x40f5,
    [0x97, 0xeb, 0x5d, 0x97, 0x4e, 0x05, 0x47, 0x40],
);
pub const STACK_TASK_GUID: Guid = Guid::from_fields(
    0xd3363dc0,
    0x243a,
    0x4620,
    [0xa4, 0xd0, 0x8a, 0x07, 0xd7, 0x72, 0xf5, 0x33],
);
pub const RUNTIME_INFORMATION_TASK_GUID: Guid = Guid::from_fields(
    0xcd7d3e32,
    0x65fe,
    0x40cd,
    [0x92, 0x25, 0xa2, 0x57, 0x7d, 0x20, 0x3f, 0xc3],
);
pub const TYPE_TASK_GUID: Guid = Guid::from_fields(
    0x003e5a9b,
    0x4757,
    0x4d3e,
    [0xb4, 0xa1, 0xe4, 0x7b, 0xfb, 0x48, 0x94, 0x08],
);

struct Task {
    task: u16,
    name: &'static str,
    guid: Guid,
}

const GC: Task = Task {
    task: 1,
    name: "GarbageCollection",
    guid: GC_TASK_GUID,
};
const EXCEPTION: Task = Task {
    task: 7,
    name: "Exception",
    guid: EXCEPTION_TASK_GUID,
};
const CONTENTION: Task = Task {
    task: 8,
    name: "Contention",
    guid: CONTENTION_TASK_GUID,
};
const METHOD: Task = Task {
    task: 9,
    name: "CLRMethod",
    guid: METHOD_TASK_GUID,
};
const LOADER: Task = Task {
    task: 10,
    name: "CLRLoader",
    guid: LOADER_TASK_GUID,
};
const STACK: Task = Task {
    task: 11,
    name: "CLRStack",
    guid: STACK_TASK_GUID,
};
const RUNTIME_INFORMATION: Task = Task {
    task: 19,
    name: "CLRRuntimeInformation",
    guid: RUNTIME_INFORMATION_TASK_GUID,
};
const TYPE: Task = Task {
    task: 21,
    name: "Type",
    guid: TYPE_TASK_GUID,
};

// GarbageCollection

const GC_START: &[FieldSpec] = &[
    u32("Count"),
    u32("Depth").since(1),
    u32("Reason").lookup(GcReason::lookup),
    u32("Type").since(1).lookup(GcType::lookup),
    clr_instance_id().since(1),
    u64("ClientSequenceNumber").since(2),
];

const GC_END: &[FieldSpec] = &[
    u32("Count"),
    u16("Depth").until(1),
    u32("Depth").since(1),
    clr_instance_id().since(1),
];

const GC_CLR_INSTANCE_ONLY: &[FieldSpec] = &[clr_instance_id().since(1)];

const GC_HEAP_STATS: &[FieldSpec] = &[
    u64("GenerationSize0"),
    u64("TotalPromotedSize0"),
    u64("GenerationSize1"),
    u64("TotalPromotedSize1"),
    u64("GenerationSize2"),
    u64("TotalPromotedSize2"),
    u64("GenerationSize3"),
    u64("TotalPromotedSize3"),
    u64("FinalizationPromotedSize"),
    u64("FinalizationPromotedCount"),
    u32("PinnedObjectCount"),
    u32("SinkBlockCount"),
    u32("GCHandleCount"),
    clr_instance_id().since(1),
    u64("GenerationSize4").since(2),
    u64("TotalPromotedSize4").since(2),
];

const GC_CREATE_SEGMENT: &[FieldSpec] = &[
    u64("Address").hex(),
    u64("Size"),
    u32("Type").lookup(GcSegmentType::lookup),
    clr_instance_id().since(1),
];

const GC_FREE_SEGMENT: &[FieldSpec] = &[u64("Address").hex(), clr_instance_id().since(1)];

const GC_SUSPEND_EE_BEGIN: &[FieldSpec] = &[
    u16("Reason").until(1).lookup(GcSuspendEeReason::lookup),
    u32("Reason").since(1).lookup(GcSuspendEeReason::lookup),
    u32("Count").since(1),
    clr_instance_id().since(1),
];

const GC_ALLOCATION_TICK: &[FieldSpec] = &[
    u32("AllocationAmount"),
    u32("AllocationKind").lookup(GcAllocationKind::lookup),
    clr_instance_id().since(1),
    u64("AllocationAmount64").since(2),
    address("TypeID").since(2),
    string("TypeName").since(2),
    u32("HeapIndex").since(2),
    address("Address").since(3),
    u64("ObjectSize").since(4),
];

const GC_FINALIZERS_END: &[FieldSpec] = &[u32("Count"), clr_instance_id().since(1)];

const GC_TRIGGERED: &[FieldSpec] = &[
    u32("Reason").lookup(GcReason::lookup),
    clr_instance_id(),
];

const ROOT_EDGE_VALUE: &[FieldSpec] = &[
    address("RootedNodeAddress"),
    u8("GCRootKind").lookup(GcRootKind::lookup),
    u32("GCRootFlag").hex(),
    address("GCRootID"),
];
const ROOT_EDGE_VALUES: ArraySpec = ArraySpec {
    count: Count::Field("Count"),
    element: Element::Struct(ROOT_EDGE_VALUE),
};
const GC_BULK_ROOT_EDGE: &[FieldSpec] = &[
    u32("Index"),
    u32("Count"),
    clr_instance_id(),
    array("Values", &ROOT_EDGE_VALUES),
];

/// A pre-release runtime logged an unrelated 8-byte event under the id of
/// GCBulkRootEdge.
const GC_BULK_ROOT_EDGE_LEGACY_LENGTHS: &[usize] = &[8];

const NODE_VALUE: &[FieldSpec] = &[
    address("Address"),
    u64("Size"),
    u64("TypeID"),
    u64("EdgeCount"),
];
const NODE_VALUES: ArraySpec = ArraySpec {
    count: Count::Field("Count"),
    element: Element::Struct(NODE_VALUE),
};
const GC_BULK_NODE: &[FieldSpec] = &[
    u32("Index"),
    u32("Count"),
    clr_instance_id(),
    array("Values", &NODE_VALUES),
];

const EDGE_VALUE: &[FieldSpec] = &[address("Value"), u32("ReferencingFieldID")];
const EDGE_VALUES: ArraySpec = ArraySpec {
    count: Count::Field("Count"),
    element: Element::Struct(EDGE_VALUE),
};
const GC_BULK_EDGE: &[FieldSpec] = &[
    u32("Index"),
    u32("Count"),
    clr_instance_id(),
    array("Values", &EDGE_VALUES),
];

const GC_SAMPLED_OBJECT_ALLOCATION: &[FieldSpec] = &[
    address("Address"),
    address("TypeID"),
    u32("ObjectCountForTypeSample"),
    u64("TotalSizeForTypeSample"),
    clr_instance_id(),
];

const STATIC_VAR_VALUE: &[FieldSpec] = &[
    u64("GCRootID").hex(),
    u64("ObjectID").hex(),
    u64("TypeID").hex(),
    u32("Flags").hex(),
    string("FieldName"),
];
const STATIC_VAR_VALUES: ArraySpec = ArraySpec {
    count: Count::Field("Count"),
    element: Element::Struct(STATIC_VAR_VALUE),
};
const GC_BULK_ROOT_STATIC_VAR: &[FieldSpec] = &[
    u32("Count"),
    u64("AppDomainID").hex(),
    clr_instance_id(),
    array("Values", &STATIC_VAR_VALUES),
];

const EMPTY: &[FieldSpec] = &[];

// Type

const TYPE_PARAMETERS: ArraySpec = ArraySpec {
    count: Count::Field("TypeParameterCount"),
    element: Element::Scalar(FieldType::U64),
};
const BULK_TYPE_VALUE: &[FieldSpec] = &[
    u64("TypeID").hex(),
    u64("ModuleID").hex(),
    u32("TypeNameID"),
    u32("Flags").hex(),
    u8("CorElementType"),
    string("TypeName"),
    u32("TypeParameterCount"),
    array("TypeParameters", &TYPE_PARAMETERS),
];
const BULK_TYPE_VALUES: ArraySpec = ArraySpec {
    count: Count::Field("Count"),
    element: Element::Struct(BULK_TYPE_VALUE),
};
const BULK_TYPE: &[FieldSpec] = &[
    u32("Count"),
    clr_instance_id(),
    array("Values", &BULK_TYPE_VALUES),
];

// CLRMethod

const METHOD_LOAD_UNLOAD: &[FieldSpec] = &[
    u64("MethodID").hex(),
    u64("ModuleID").hex(),
    u64("MethodStartAddress").hex(),
    u32("MethodSize"),
    u32("MethodToken").hex(),
    u32("MethodFlags").hex(),
    clr_instance_id().since(1),
    u64("ReJITID").since(2),
];

const METHOD_LOAD_UNLOAD_VERBOSE: &[FieldSpec] = &[
    u64("MethodID").hex(),
    u64("ModuleID").hex(),
    u64("MethodStartAddress").hex(),
    u32("MethodSize"),
    u32("MethodToken").hex(),
    u32("MethodFlags").hex(),
    string("MethodNamespace"),
    string("MethodName"),
    string("MethodSignature"),
    clr_instance_id().since(1),
    u64("ReJITID").since(2),
];

const METHOD_JITTING_STARTED: &[FieldSpec] = &[
    u64("MethodID").hex(),
    u64("ModuleID").hex(),
    u32("MethodToken").hex(),
    u32("MethodILSize"),
    string("MethodNamespace"),
    string("MethodName"),
    string("MethodSignature"),
    clr_instance_id().since(1),
];

const IL_OFFSETS: ArraySpec = ArraySpec {
    count: Count::Field("CountOfMapEntries"),
    element: Element::Scalar(FieldType::U32),
};
const NATIVE_OFFSETS: ArraySpec = ArraySpec {
    count: Count::Field("CountOfMapEntries"),
    element: Element::Scalar(FieldType::U32),
};
const METHOD_IL_TO_NATIVE_MAP: &[FieldSpec] = &[
    u64("MethodID").hex(),
    u64("ReJITID"),
    u8("MethodExtent"),
    u16("CountOfMapEntries"),
    array("ILOffsets", &IL_OFFSETS),
    array("NativeOffsets", &NATIVE_OFFSETS),
    clr_instance_id(),
];

// CLRLoader

const DOMAIN_MODULE_LOAD: &[FieldSpec] = &[
    u64("ModuleID").hex(),
    u64("AssemblyID").hex(),
    u64("AppDomainID").hex(),
    u32("ModuleFlags").hex(),
    u32("Reserved1"),
    string("ModuleILPath"),
    string("ModuleNativePath"),
    clr_instance_id().since(1),
];

const MODULE_LOAD_UNLOAD: &[FieldSpec] = &[
    u64("ModuleID").hex(),
    u64("AssemblyID").hex(),
    u32("ModuleFlags").hex(),
    u32("Reserved1"),
    string("ModuleILPath"),
    string("ModuleNativePath"),
    clr_instance_id().since(1),
    guid("ManagedPdbSignature").since(2),
    u32("ManagedPdbAge").since(2),
    string("ManagedPdbBuildPath").since(2),
    guid("NativePdbSignature").since(2),
    u32("NativePdbAge").since(2),
    string("NativePdbBuildPath").since(2),
];

const ASSEMBLY_LOAD: &[FieldSpec] = &[
    u64("AssemblyID").hex(),
    u64("AppDomainID").hex(),
    u64("BindingID").since(1).hex(),
    u32("AssemblyFlags").hex(),
    string("FullyQualifiedAssemblyName"),
    clr_instance_id().since(1),
];

// CLRStack

const STACK_FRAMES: ArraySpec = ArraySpec {
    count: Count::Field("FrameCount"),
    element: Element::Scalar(FieldType::Address),
};
const CLR_STACK_WALK: &[FieldSpec] = &[
    clr_instance_id(),
    u8("Reserved1"),
    u8("Reserved2"),
    u32("FrameCount"),
    array("Stack", &STACK_FRAMES),
];

// Exception

const EXCEPTION_THROWN: &[FieldSpec] = &[
    string("ExceptionType").since(1),
    string("ExceptionMessage").since(1),
    address("ExceptionEIP").since(1),
    u32("ExceptionHRESULT").since(1).hex(),
    u16("ExceptionFlags").since(1).hex(),
    clr_instance_id().since(1),
];

// Contention

const CONTENTION_START: &[FieldSpec] = &[
    u8("ContentionFlags").since(1),
    clr_instance_id().since(1),
    address("LockID").since(2),
    address("AssociatedObjectID").since(2),
    u64("LockOwnerThreadID").since(2),
];

const CONTENTION_STOP: &[FieldSpec] = &[
    u8("ContentionFlags"),
    clr_instance_id(),
    f64("DurationNs").since(1),
];

// CLRRuntimeInformation

const RUNTIME_INFORMATION_START: &[FieldSpec] = &[
    clr_instance_id(),
    u16("Sku"),
    u16("BclMajorVersion"),
    u16("BclMinorVersion"),
    u16("BclBuildNumber"),
    u16("BclQfeNumber"),
    u16("VMMajorVersion"),
    u16("VMMinorVersion"),
    u16("VMBuildNumber"),
    u16("VMQfeNumber"),
    u32("StartupFlags").hex(),
    u8("StartupMode"),
    string("CommandLine"),
    guid("ComObjectGuid"),
    string("RuntimeDllPath"),
];

#[allow(clippy::too_many_arguments)]
fn kind(
    task: &Task,
    event_id: u16,
    event_name: &'static str,
    opcode: u8,
    opcode_name: &'static str,
    keywords: ClrKeywords,
    max_version: u8,
    fields: &'static [FieldSpec],
) -> RecordKind {
    RecordKind {
        event_id,
        event_name,
        task: task.task,
        task_name: task.name,
        task_guid: task.guid,
        opcode,
        opcode_name,
        provider_guid: CLR_PROVIDER_GUID,
        provider_name: CLR_PROVIDER_NAME,
        keywords,
        max_version,
        fields,
        legacy_lengths: &[],
    }
}

pub(super) fn kinds() -> Vec<RecordKind> {
    let gc = ClrKeywords::GC;
    let heap_dump = ClrKeywords::GC_HEAP_DUMP;
    let method = ClrKeywords::JIT | ClrKeywords::NGEN;
    let loader = ClrKeywords::LOADER;

    vec![
        kind(&GC, 1, "GCStart", 1, "win:Start", gc, 2, GC_START),
        kind(&GC, 2, "GCEnd", 2, "win:Stop", gc, 1, GC_END),
        kind(&GC, 3, "GCRestartEEEnd", 132, "GCRestartEEEnd", gc, 1, GC_CLR_INSTANCE_ONLY),
        kind(&GC, 4, "GCHeapStats", 133, "GCHeapStats", gc, 2, GC_HEAP_STATS),
        kind(&GC, 5, "GCCreateSegment", 134, "GCCreateSegment", gc, 1, GC_CREATE_SEGMENT),
        kind(&GC, 6, "GCFreeSegment", 135, "GCFreeSegment", gc, 1, GC_FREE_SEGMENT),
        kind(&GC, 7, "GCRestartEEBegin", 136, "GCRestartEEBegin", gc, 1, GC_CLR_INSTANCE_ONLY),
        kind(&GC, 8, "GCSuspendEEEnd", 137, "GCSuspendEEEnd", gc, 1, GC_CLR_INSTANCE_ONLY),
        kind(&GC, 9, "GCSuspendEEBegin", 10, "GCSuspendEEBegin", gc, 1, GC_SUSPEND_EE_BEGIN),
        kind(&GC, 10, "GCAllocationTick", 11, "GCAllocationTick", gc, 4, GC_ALLOCATION_TICK),
        kind(&GC, 13, "GCFinalizersEnd", 15, "GCFinalizersEnd", gc, 1, GC_FINALIZERS_END),
        kind(&GC, 14, "GCFinalizersBegin", 19, "GCFinalizersBegin", gc, 1, GC_CLR_INSTANCE_ONLY),
        RecordKind {
            legacy_lengths: GC_BULK_ROOT_EDGE_LEGACY_LENGTHS,
            ..kind(&GC, 16, "GCBulkRootEdge", 20, "GCBulkRootEdge", heap_dump, 0, GC_BULK_ROOT_EDGE)
        },
        kind(&GC, 18, "GCBulkNode", 22, "GCBulkNode", heap_dump, 0, GC_BULK_NODE),
        kind(&GC, 19, "GCBulkEdge", 23, "GCBulkEdge", heap_dump, 0, GC_BULK_EDGE),
        kind(
            &GC,
            20,
            "GCSampledObjectAllocationHigh",
            24,
            "GCSampledObjectAllocation",
            ClrKeywords::GC_SAMPLED_OBJECT_ALLOCATION_HIGH,
            0,
            GC_SAMPLED_OBJECT_ALLOCATION,
        ),
        kind(&GC, 35, "GCTriggered", 35, "Triggered", gc, 0, GC_TRIGGERED),
        kind(
            &GC,
            38,
            "GCBulkRootStaticVar",
            40,
            "GCBulkRootStaticVar",
            heap_dump,
            0,
            GC_BULK_ROOT_STATIC_VAR,
        ),
        // Only classic (pre-manifest) runtimes log this, and only by opcode.
        kind(&GC, ILLEGAL_EVENT_ID, "GCPerHeapHistory", 204, "PerHeapHistory", gc, 0, EMPTY),
        kind(&TYPE, 15, "BulkType", 10, "BulkType", ClrKeywords::TYPE, 0, BULK_TYPE),
        kind(&METHOD, 141, "MethodLoad", 33, "MethodLoad", method, 2, METHOD_LOAD_UNLOAD),
        kind(&METHOD, 142, "MethodUnload", 34, "MethodUnload", method, 2, METHOD_LOAD_UNLOAD),
        kind(
            &METHOD,
            143,
            "MethodLoadVerbose",
            37,
            "MethodLoadVerbose",
            method,
            2,
            METHOD_LOAD_UNLOAD_VERBOSE,
        ),
        kind(
            &METHOD,
            144,
            "MethodUnloadVerbose",
            38,
            "MethodUnloadVerbose",
            method,
            2,
            METHOD_LOAD_UNLOAD_VERBOSE,
        ),
        kind(
            &METHOD,
            145,
            "MethodJittingStarted",
            42,
            "MethodJittingStarted",
            ClrKeywords::JIT,
            1,
            METHOD_JITTING_STARTED,
        ),
        kind(
            &METHOD,
            190,
            "MethodILToNativeMap",
            87,
            "MethodILToNativeMap",
            ClrKeywords::JIT_TO_NATIVE_METHOD_MAP,
            0,
            METHOD_IL_TO_NATIVE_MAP,
        ),
        kind(&LOADER, 151, "DomainModuleLoad", 45, "DomainModuleLoad", loader, 1, DOMAIN_MODULE_LOAD),
        kind(&LOADER, 152, "ModuleLoad", 33, "ModuleLoad", loader, 2, MODULE_LOAD_UNLOAD),
        kind(&LOADER, 153, "ModuleUnload", 34, "ModuleUnload", loader, 2, MODULE_LOAD_UNLOAD),
        kind(&LOADER, 154, "AssemblyLoad", 37, "AssemblyLoad", loader, 1, ASSEMBLY_LOAD),
        kind(&STACK, 82, "CLRStackWalk", 82, "CLRStackWalk", ClrKeywords::STACK, 0, CLR_STACK_WALK),
        kind(
            &EXCEPTION,
            80,
            "ExceptionThrown",
            1,
            "win:Start",
            ClrKeywords::EXCEPTION,
            1,
            EXCEPTION_THROWN,
        ),
        // Older manifests name the same event ExceptionStart.
        kind(
            &EXCEPTION,
            80,
            "ExceptionStart",
            1,
            "win:Start",
            ClrKeywords::EXCEPTION,
            1,
            EXCEPTION_THROWN,
        ),
        kind(
            &CONTENTION,
            81,
            "ContentionStart",
            1,
            "win:Start",
            ClrKeywords::CONTENTION,
            2,
            CONTENTION_START,
        ),
        kind(
            &CONTENTION,
            91,
            "ContentionStop",
            2,
            "win:Stop",
            ClrKeywords::CONTENTION,
            1,
            CONTENTION_STOP,
        ),
        kind(
            &RUNTIME_INFORMATION,
            187,
            "RuntimeInformationStart",
            1,
            "win:Start",
            ClrKeywords::empty(),
            0,
            RUNTIME_INFORMATION_START,
        ),
    ]
}
