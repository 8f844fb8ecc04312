use bitflags::bitflags;

use std::fmt::Display;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Decodes a raw enumerator, falling back to `default` (with a warning) for
/// values this crate does not know.
pub(crate) fn decode_or<T: FromPrimitive + Copy>(raw: u64, default: T, what: &str) -> T {
    T::from_u64(raw).unwrap_or_else(|| {
        log::warn!("unknown {} value {}", what, raw);
        default
    })
}

#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum GcReason {
    AllocSmall = 0,
    Induced = 1,
    LowMemory = 2,
    Empty = 3,
    AllocLargeObjectHeap = 4,
    OutOfSpaceSmallObjectHeap = 5,
    OutOfSpaceLargeObjectHeap = 6,
    InducedNotForced = 7,
    Stress = 8,
    InducedLowMemory = 9,
    InducedCompacting = 10,
    LowMemoryHost = 11,
    PmFullGc = 12,
    LowMemoryHostBlocking = 13,
}

impl GcReason {
    pub fn name(self) -> &'static str {
        match self {
            GcReason::AllocSmall => "Small object heap allocation",
            GcReason::Induced => "Induced",
            GcReason::LowMemory => "Low memory",
            GcReason::Empty => "Empty",
            GcReason::AllocLargeObjectHeap => "Large object heap allocation",
            GcReason::OutOfSpaceSmallObjectHeap => "Out of space (for small object heap)",
            GcReason::OutOfSpaceLargeObjectHeap => "Out of space (for large object heap)",
            GcReason::InducedNotForced => "Induced but not forced as blocking",
            GcReason::Stress => "Stress",
            GcReason::InducedLowMemory => "Induced low memory",
            GcReason::InducedCompacting => "Induced compacting",
            GcReason::LowMemoryHost => "Low memory (host)",
            GcReason::PmFullGc => "Provisional mode full GC",
            GcReason::LowMemoryHostBlocking => "Low memory (host, blocking)",
        }
    }

    pub fn lookup(raw: u64) -> Option<&'static str> {
        GcReason::from_u64(raw).map(GcReason::name)
    }
}

impl Display for GcReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum GcAllocationKind {
    Small = 0,
    Large = 1,
    Pinned = 2,
}

impl GcAllocationKind {
    pub fn name(self) -> &'static str {
        match self {
            GcAllocationKind::Small => "Small",
            GcAllocationKind::Large => "Large",
            GcAllocationKind::Pinned => "Pinned",
        }
    }

    pub fn lookup(raw: u64) -> Option<&'static str> {
        GcAllocationKind::from_u64(raw).map(GcAllocationKind::name)
    }
}

impl Display for GcAllocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum GcType {
    Blocking = 0,
    Background = 1,
    BlockingDuringBackground = 2,
}

impl GcType {
    pub fn name(self) -> &'static str {
        match self {
            GcType::Blocking => "Blocking GC",
            GcType::Background => "Background GC",
            GcType::BlockingDuringBackground => "Blocking GC during background GC",
        }
    }

    pub fn lookup(raw: u64) -> Option<&'static str> {
        GcType::from_u64(raw).map(GcType::name)
    }
}

impl Display for GcType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum GcSuspendEeReason {
    Other = 0,
    GC = 1,
    AppDomainShutdown = 2,
    CodePitching = 3,
    Shutdown = 4,
    Debugger = 5,
    GcPrep = 6,
    DebuggerSweep = 7,
}

impl GcSuspendEeReason {
    pub fn name(self) -> &'static str {
        match self {
            GcSuspendEeReason::Other => "Other",
            GcSuspendEeReason::GC => "GC",
            GcSuspendEeReason::AppDomainShutdown => "AppDomain shutdown",
            GcSuspendEeReason::CodePitching => "Code pitching",
            GcSuspendEeReason::Shutdown => "Shutdown",
            GcSuspendEeReason::Debugger => "Debugger",
            GcSuspendEeReason::GcPrep => "GC prep",
            GcSuspendEeReason::DebuggerSweep => "Debugger sweep",
        }
    }

    pub fn lookup(raw: u64) -> Option<&'static str> {
        GcSuspendEeReason::from_u64(raw).map(GcSuspendEeReason::name)
    }
}

impl Display for GcSuspendEeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum GcSegmentType {
    SmallObjectHeap = 0,
    LargeObjectHeap = 1,
    ReadOnlyHeap = 2,
    PinnedObjectHeap = 3,
}

impl GcSegmentType {
    pub fn name(self) -> &'static str {
        match self {
            GcSegmentType::SmallObjectHeap => "Small object heap",
            GcSegmentType::LargeObjectHeap => "Large object heap",
            GcSegmentType::ReadOnlyHeap => "Read-only heap",
            GcSegmentType::PinnedObjectHeap => "Pinned object heap",
        }
    }

    pub fn lookup(raw: u64) -> Option<&'static str> {
        GcSegmentType::from_u64(raw).map(GcSegmentType::name)
    }
}

#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum GcRootKind {
    Stack = 0,
    Finalizer = 1,
    Handle = 2,
    Older = 3,
    SizedRef = 4,
    Overflow = 5,
}

impl GcRootKind {
    pub fn name(self) -> &'static str {
        match self {
            GcRootKind::Stack => "Stack",
            GcRootKind::Finalizer => "Finalizer",
            GcRootKind::Handle => "Handle",
            GcRootKind::Older => "Older",
            GcRootKind::SizedRef => "SizedRef",
            GcRootKind::Overflow => "Overflow",
        }
    }

    pub fn lookup(raw: u64) -> Option<&'static str> {
        GcRootKind::from_u64(raw).map(GcRootKind::name)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodFlags: u32 {
        const dynamic = 0x1;
        const generic = 0x2;
        const has_shared_generic_code = 0x4;
        const jitted = 0x8;
        const jit_helper = 0x10;
        const profiler_rejected_precompiled_code = 0x20;
        const ready_to_run_rejected_precompiled_code = 0x40;

        // next three bits are the tiered compilation level
        const opttier_bit0 = 0x80;
        const opttier_bit1 = 0x100;
        const opttier_bit2 = 0x200;

        // extent flags/value (hot/cold)
        const extent_bit_0 = 0x10000000; // 0x1 == cold, 0x0 = hot
        const extent_bit_1 = 0x20000000;
        const extent_bit_2 = 0x40000000;
        const extent_bit_3 = 0x80000000;

        const _ = !0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleFlags: u32 {
        const domain_neutral = 0x1;
        const native = 0x2;
        const dynamic = 0x4;
        const manifest = 0x8;
        const ibc_optimized = 0x10;
        const ready_to_run = 0x20;
        const partial_ready_to_run = 0x40;

        const _ = !0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u32 {
        const delegate = 0x1;
        const finalizable = 0x2;
        const externally_implemented_com_object = 0x4;
        const array = 0x8;

        // array rank, when `array` is set
        const array_rank_bit0 = 0x100;
        const array_rank_bit1 = 0x200;
        const array_rank_bit2 = 0x400;
        const array_rank_bit3 = 0x800;
        const array_rank_bit4 = 0x1000;
        const array_rank_bit5 = 0x2000;

        const _ = !0;
    }
}

impl TypeFlags {
    pub fn array_rank(self) -> u32 {
        (self.bits() >> 8) & 0x3f
    }
}

/// Tiered compilation level packed into `MethodFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCompilationTier {
    Unknown,
    MinOptJitted,
    Optimized,
    QuickJitted,
    OptimizedTier1,
    OptimizedTier1OSR,
    InstrumentedTier,
    InstrumentedTierOptimized,
}

impl From<MethodFlags> for MethodCompilationTier {
    fn from(flags: MethodFlags) -> Self {
        match (flags.bits() >> 7) & 0x7 {
            1 => MethodCompilationTier::MinOptJitted,
            2 => MethodCompilationTier::Optimized,
            3 => MethodCompilationTier::QuickJitted,
            4 => MethodCompilationTier::OptimizedTier1,
            5 => MethodCompilationTier::OptimizedTier1OSR,
            6 => MethodCompilationTier::InstrumentedTier,
            7 => MethodCompilationTier::InstrumentedTierOptimized,
            _ => MethodCompilationTier::Unknown,
        }
    }
}
