use bitflags::bitflags;

bitflags! {
    /// Keyword bits of the runtime provider. A record kind is delivered only
    /// when one of its keywords is enabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClrKeywords: u64 {
        // https://learn.microsoft.com/en-us/dotnet/fundamentals/diagnostics/runtime-garbage-collection-events
        const GC = 0x1;
        const GC_HANDLE = 0x2;
        const BINDER = 0x4;
        const LOADER = 0x8;
        const JIT = 0x10;
        const NGEN = 0x20;
        const RUNDOWN_START = 0x40;
        const INTEROP = 0x2000;
        const CONTENTION = 0x4000;
        const EXCEPTION = 0x8000;
        const THREADING = 0x10000;
        const JIT_TO_NATIVE_METHOD_MAP = 0x20000;
        const TYPE = 0x80000;
        const GC_HEAP_DUMP = 0x100000;
        const GC_SAMPLED_OBJECT_ALLOCATION_HIGH = 0x200000;
        const GC_HEAP_AND_TYPE_NAMES = 0x1000000;
        const GC_SAMPLED_OBJECT_ALLOCATION_LOW = 0x2000000;
        // Every event is followed by a stack walk event when set.
        const STACK = 0x40000000;
        const COMPILATION = 0x1000000000;
        const COMPILATION_DIAGNOSTIC = 0x2000000000;
        const TYPE_DIAGNOSTIC = 0x8000000000;
    }
}

/// ETW trace level; `Verbose` is needed for the method and type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    Critical = 1,
    Error = 2,
    Warning = 3,
    Informational = 4,
    Verbose = 5,
}

/// Formats a `provider:0xkeywords:level` string as accepted by xperf and
/// dotnet-trace.
pub fn provider_enable_string(provider: &str, keywords: ClrKeywords, level: TraceLevel) -> String {
    format!("{}:0x{:x}:{}", provider, keywords.bits(), level as u8)
}
