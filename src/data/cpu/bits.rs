use serde::Serialize;

/// Mask covering the low `width` bits; widths of 32 and above saturate.
pub fn mask_of_width(width: u32) -> u32 {
    if width >= u32::BITS {
        u32::MAX
    } else {
        !(u32::MAX << width)
    }
}

/// Number of set bits
pub fn popcount(value: u32) -> u32 {
    value.count_ones()
}

/// Extract bits `[low, low + width)` of `value`
pub fn field(value: u32, low: u32, width: u32) -> u32 {
    value.checked_shr(low).unwrap_or(0) & mask_of_width(width)
}

/// Whether bit `index` of `value` is set
pub fn bit(value: u32, index: u32) -> bool {
    field(value, index, 1) != 0
}

/// Position of a logical processor within the legacy three-level topology
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApicLayout {
    /// 1-based thread index within the core, 0 without hyper-threading
    pub smt_id: u32,
    /// 1-based core index within the package
    pub core_id: u32,
    pub package_id: u32,
}

/// Split an initial APIC id into thread, core and package sub-fields.
///
/// The thread field is as wide as the number of hyper-threading logical
/// processors, the core field as wide as the number of physical cores, and
/// whatever remains above them identifies the package.
pub fn decompose_apic_id(apic_id: u32, ht_logical: u32, physical_cores: u32) -> ApicLayout {
    let mut layout = ApicLayout::default();
    let mut rest = apic_id;

    if ht_logical > 0 {
        let smt_mask = mask_of_width(ht_logical);
        layout.smt_id = (rest & smt_mask) + 1;
        rest = rest.checked_shr(popcount(smt_mask)).unwrap_or(0);
    }

    if physical_cores > 0 {
        let core_mask = mask_of_width(physical_cores);
        layout.core_id = (rest & core_mask) + 1;
        rest = rest.checked_shr(popcount(core_mask)).unwrap_or(0);
    }

    layout.package_id = rest;
    layout
}
