pub use raw_cpuid::{CpuIdReader, CpuIdResult};

/// Highest standard leaf and vendor id
pub const LEAF_VENDOR: u32 = 0x0;
/// Feature flags, initial APIC id and addressable logical processors
pub const LEAF_FEATURES: u32 = 0x1;
/// Deterministic cache parameters (Intel)
pub const LEAF_CACHE_PARAMS: u32 = 0x4;
/// Highest extended leaf
pub const LEAF_EXT_MAX: u32 = 0x8000_0000;
/// First of the three processor brand string leaves
pub const LEAF_BRAND_FIRST: u32 = 0x8000_0002;
/// Last of the three processor brand string leaves
pub const LEAF_BRAND_LAST: u32 = 0x8000_0004;
/// L2 cache and TLB identifiers
pub const LEAF_L2_CACHE: u32 = 0x8000_0006;
/// Address sizes and core count (AMD)
pub const LEAF_ADDRESS_SIZES: u32 = 0x8000_0008;

/// Reader backed by the `cpuid` instruction of the host processor
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn native_reader() -> impl CpuIdReader {
    raw_cpuid::CpuIdReaderNative
}

/// Hosts without the instruction answer every leaf with zeros; callers gate on
/// [`cpuid_available`] before reading.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn native_reader() -> impl CpuIdReader {
    |_leaf: u32, _subleaf: u32| CpuIdResult {
        eax: 0,
        ebx: 0,
        ecx: 0,
        edx: 0,
    }
}

/// Whether the identification instruction exists on this processor
pub fn cpuid_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        true
    }
    #[cfg(target_arch = "x86")]
    {
        // Toggling EFLAGS.ID only sticks on processors that implement cpuid.
        core::arch::x86::has_cpuid()
    }
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}

/// Issue a single query and trace the raw registers
pub fn query<R: CpuIdReader>(reader: &R, leaf: u32, subleaf: u32) -> CpuIdResult {
    let regs = reader.cpuid2(leaf, subleaf);
    log::trace!(
        "cpuid {leaf:#010x}/{subleaf}: eax={:#010x} ebx={:#010x} ecx={:#010x} edx={:#010x}",
        regs.eax,
        regs.ebx,
        regs.ecx,
        regs.edx
    );
    regs
}
