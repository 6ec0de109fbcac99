//! Processor topology derived from the identification instruction.
//!
//! The leaves are read in a fixed order and any of them may end the walk
//! early. Whatever was decoded up to that point is kept in the report; fields
//! past the stopping point keep their defaults. A package's hardware
//! capability (what the silicon can address) may differ from its
//! configuration (what is enabled), so the raw per-package counts are
//! reconciled before anything is derived from them.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use super::bits::{ApicLayout, bit, decompose_apic_id, field};
use super::brand::read_processor_name;
use super::cache::L2Cache;
use super::registers::{
    CpuIdReader, LEAF_ADDRESS_SIZES, LEAF_BRAND_LAST, LEAF_CACHE_PARAMS, LEAF_EXT_MAX,
    LEAF_FEATURES, LEAF_L2_CACHE, LEAF_VENDOR, cpuid_available, native_reader, query,
};
use super::vendor::{Vendor, decode_vendor_id};
use crate::data::os::{HostProcessors, OsProcessors};

/// Standard range at or below which an extended range past the brand leaves is suspect
const RESTRICTED_STANDARD_MAX: u32 = 4;

/// Why a report stops short of a full topology
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyIssue {
    InstructionUnavailable,
    RestrictedExecution,
    UnrecognizedVendor,
}

impl fmt::Display for TopologyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TopologyIssue::InstructionUnavailable => "cpuid instruction unavailable",
            TopologyIssue::RestrictedExecution => "cpuid execution restricted",
            TopologyIssue::UnrecognizedVendor => "unrecognized processor vendor",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterrogateOptions {
    /// Flag the extended range as untrustworthy when it reaches past the brand
    /// leaves while the standard range stops at leaf 4. Best effort only.
    pub restricted_check: bool,
}

impl Default for InterrogateOptions {
    fn default() -> Self {
        Self {
            restricted_check: true,
        }
    }
}

/// Topology of the package the caller runs on
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopologyReport {
    pub instruction_available: bool,
    pub instruction_restricted: bool,
    pub vendor_unrecognized: bool,
    pub vendor_id: String,
    pub vendor: Vendor,
    pub max_standard_leaf: u32,
    pub max_extended_leaf: u32,
    /// Silicon can address more than one logical processor per package
    pub hardware_threading_capable: bool,
    pub hyper_threading_enabled: bool,
    pub physical_cores_per_package: u32,
    pub logical_processors_per_package: u32,
    /// Logical processors sharing the first cache level, 0 when unknown
    pub logical_processors_sharing_cache: u32,
    pub hyper_threading_logical_processors: u32,
    /// The raw logical count fell below the physical count and was raised
    pub inconsistent_reading_corrected: bool,
    pub initial_apic_id: u32,
    pub os_max_logical_processors: u32,
    pub os_online_logical_processors: u32,
    pub estimated_package_count: u32,
    pub l2_cache_size_bytes: u32,
    pub l2_cache_line_bytes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apic_layout: Option<ApicLayout>,
}

impl Default for TopologyReport {
    fn default() -> Self {
        Self {
            instruction_available: false,
            instruction_restricted: false,
            vendor_unrecognized: false,
            vendor_id: String::new(),
            vendor: Vendor::Unknown,
            max_standard_leaf: 0,
            max_extended_leaf: 0,
            hardware_threading_capable: false,
            hyper_threading_enabled: false,
            physical_cores_per_package: 1,
            logical_processors_per_package: 1,
            logical_processors_sharing_cache: 0,
            hyper_threading_logical_processors: 0,
            inconsistent_reading_corrected: false,
            initial_apic_id: 0,
            os_max_logical_processors: 0,
            os_online_logical_processors: 0,
            estimated_package_count: 1,
            l2_cache_size_bytes: 0,
            l2_cache_line_bytes: 0,
            processor_name: None,
            apic_layout: None,
        }
    }
}

impl TopologyReport {
    /// First condition that cut the interrogation short, if any
    pub fn issue(&self) -> Option<TopologyIssue> {
        if !self.instruction_available {
            Some(TopologyIssue::InstructionUnavailable)
        } else if self.instruction_restricted {
            Some(TopologyIssue::RestrictedExecution)
        } else if self.vendor_unrecognized {
            Some(TopologyIssue::UnrecognizedVendor)
        } else {
            None
        }
    }

    pub fn l2_cache(&self) -> L2Cache {
        L2Cache {
            size_bytes: self.l2_cache_size_bytes,
            line_bytes: self.l2_cache_line_bytes,
        }
    }
}

/// Interrogate the host processor with default options
pub fn interrogate() -> TopologyReport {
    interrogate_host(InterrogateOptions::default())
}

/// Interrogate the host processor
pub fn interrogate_host(options: InterrogateOptions) -> TopologyReport {
    interrogate_probed(cpuid_available(), &native_reader(), &HostProcessors, options)
}

/// Interrogate through an arbitrary reader and OS view.
///
/// The reader is taken to implement the instruction; use [`interrogate`] to
/// probe the host for it.
pub fn interrogate_with<R, O>(reader: &R, os: &O, options: InterrogateOptions) -> TopologyReport
where
    R: CpuIdReader,
    O: OsProcessors + ?Sized,
{
    interrogate_probed(true, reader, os, options)
}

fn interrogate_probed<R, O>(
    available: bool,
    reader: &R,
    os: &O,
    options: InterrogateOptions,
) -> TopologyReport
where
    R: CpuIdReader,
    O: OsProcessors + ?Sized,
{
    let mut report = TopologyReport {
        instruction_available: available,
        ..TopologyReport::default()
    };
    read_os_counts(&mut report, os);
    if available {
        decode(&mut report, reader, options);
    } else {
        debug!("cpuid unavailable; topology left at defaults");
    }
    report
}

fn read_os_counts<O: OsProcessors + ?Sized>(report: &mut TopologyReport, os: &O) {
    report.os_max_logical_processors = os.configured();
    report.os_online_logical_processors = os.online();
}

fn decode<R: CpuIdReader>(report: &mut TopologyReport, reader: &R, options: InterrogateOptions) {
    let regs = query(reader, LEAF_VENDOR, 0);
    report.max_standard_leaf = regs.eax;
    report.vendor_id = decode_vendor_id(regs.ebx, regs.edx, regs.ecx);
    report.vendor = Vendor::from_id(&report.vendor_id);
    debug!(
        "vendor {:?}, standard leaves up to {:#x}",
        report.vendor_id, report.max_standard_leaf
    );

    report.max_extended_leaf = query(reader, LEAF_EXT_MAX, 0).eax;
    if options.restricted_check
        && report.max_standard_leaf <= RESTRICTED_STANDARD_MAX
        && report.max_extended_leaf > LEAF_BRAND_LAST
    {
        warn!(
            "extended leaves up to {:#x} with standard leaves only up to {:#x}; treating cpuid as restricted",
            report.max_extended_leaf, report.max_standard_leaf
        );
        report.instruction_restricted = true;
        return;
    }

    if report.max_extended_leaf >= LEAF_BRAND_LAST {
        report.processor_name = read_processor_name(reader);
    }
    if report.max_extended_leaf >= LEAF_L2_CACHE {
        let l2 = L2Cache::read(reader);
        report.l2_cache_size_bytes = l2.size_bytes;
        report.l2_cache_line_bytes = l2.line_bytes;
    }

    let features = query(reader, LEAF_FEATURES, 0);
    report.hardware_threading_capable = bit(features.edx, 28);
    report.initial_apic_id = field(features.ebx, 24, 8);
    if !report.hardware_threading_capable {
        debug!("no hardware threading: one core, one thread per package");
        return;
    }

    match report.vendor {
        Vendor::Intel => {
            report.logical_processors_per_package = field(features.ebx, 16, 8);
            if report.max_standard_leaf >= LEAF_CACHE_PARAMS {
                let cache = query(reader, LEAF_CACHE_PARAMS, 0);
                report.physical_cores_per_package = field(cache.eax, 26, 6) + 1;
                report.logical_processors_sharing_cache = field(cache.eax, 14, 12) + 1;
                if report.physical_cores_per_package > 1 {
                    report.hardware_threading_capable = true;
                }
            } else {
                debug!("leaf 4 unsupported; cache sharing unknown");
            }
        }
        Vendor::Amd => {
            let sizes = query(reader, LEAF_ADDRESS_SIZES, 0);
            let core_id_size = field(sizes.ecx, 12, 4);
            report.logical_processors_per_package = field(sizes.ecx, 0, 8) + 1;
            report.physical_cores_per_package = if core_id_size == 0 {
                report.logical_processors_per_package
            } else {
                1 << core_id_size
            };
        }
        Vendor::Unknown => {
            warn!("unrecognized vendor {:?}; topology left at defaults", report.vendor_id);
            report.vendor_unrecognized = true;
            return;
        }
    }

    reconcile(report);
    report.apic_layout = Some(decompose_apic_id(
        report.initial_apic_id,
        report.hyper_threading_logical_processors,
        report.physical_cores_per_package,
    ));

    if report.os_max_logical_processors > report.logical_processors_per_package {
        report.estimated_package_count =
            report.os_max_logical_processors / report.logical_processors_per_package;
    }
    debug!(
        "{} cores, {} logical processors per package, ~{} packages",
        report.physical_cores_per_package,
        report.logical_processors_per_package,
        report.estimated_package_count
    );
}

fn reconcile(report: &mut TopologyReport) {
    let physical = report.physical_cores_per_package;
    let logical = report.logical_processors_per_package;

    if logical < physical {
        warn!("{logical} logical processors below {physical} physical cores; using the core count");
        report.logical_processors_per_package = physical;
        report.inconsistent_reading_corrected = true;
        return;
    }

    let extra = logical - physical;
    if extra == 0 {
        return;
    }

    report.hyper_threading_enabled = true;
    let sharing = report.logical_processors_sharing_cache;
    report.hyper_threading_logical_processors = if report.vendor == Vendor::Intel && sharing > 0 {
        physical.saturating_mul(sharing - 1)
    } else {
        extra
    };
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::data::cpu::registers::CpuIdResult;
    use crate::data::os::FixedProcessors;

    const INTEL: (u32, u32, u32) = (0x756E_6547, 0x4965_6E69, 0x6C65_746E);
    const AMD: (u32, u32, u32) = (0x6874_7541, 0x6974_6E65, 0x444D_4163);
    const HTT: u32 = 1 << 28;

    fn regs(eax: u32, ebx: u32, ecx: u32, edx: u32) -> CpuIdResult {
        CpuIdResult { eax, ebx, ecx, edx }
    }

    /// Fabricated processor answering from a leaf table and logging every query
    struct FakeCpu {
        leaves: HashMap<u32, CpuIdResult>,
        queries: RefCell<Vec<u32>>,
    }

    impl FakeCpu {
        fn new(max_leaf: u32, vendor: (u32, u32, u32), max_ext: u32) -> Self {
            let mut leaves = HashMap::new();
            leaves.insert(LEAF_VENDOR, regs(max_leaf, vendor.0, vendor.2, vendor.1));
            leaves.insert(LEAF_EXT_MAX, regs(max_ext, 0, 0, 0));
            Self {
                leaves,
                queries: RefCell::new(Vec::new()),
            }
        }

        fn with(mut self, leaf: u32, value: CpuIdResult) -> Self {
            self.leaves.insert(leaf, value);
            self
        }

        fn reader(&self) -> impl CpuIdReader + '_ {
            move |leaf: u32, _subleaf: u32| {
                self.queries.borrow_mut().push(leaf);
                self.leaves
                    .get(&leaf)
                    .copied()
                    .unwrap_or(regs(0, 0, 0, 0))
            }
        }

        fn queried(&self, leaf: u32) -> bool {
            self.queries.borrow().contains(&leaf)
        }
    }

    fn os(configured: u32) -> FixedProcessors {
        FixedProcessors {
            configured,
            online: configured,
        }
    }

    fn run(cpu: &FakeCpu, configured: u32) -> TopologyReport {
        interrogate_with(&cpu.reader(), &os(configured), InterrogateOptions::default())
    }

    /// Quad-core Intel part with two threads per core
    fn intel_quad_ht() -> FakeCpu {
        FakeCpu::new(0xD, INTEL, 0x8000_0008)
            .with(LEAF_FEATURES, regs(0x306C3, (3 << 24) | (8 << 16), 0, HTT))
            .with(LEAF_CACHE_PARAMS, regs((3 << 26) | (1 << 14) | 0x121, 0, 0, 0))
            .with(LEAF_L2_CACHE, regs(0, 0, 0x0100_6040, 0))
    }

    fn assert_invariants(report: &TopologyReport) {
        assert!(report.logical_processors_per_package >= report.physical_cores_per_package);
        assert_eq!(
            report.hyper_threading_enabled,
            report.logical_processors_per_package > report.physical_cores_per_package
        );
    }

    #[test]
    fn intel_with_hyper_threading() {
        let cpu = intel_quad_ht();
        let report = run(&cpu, 8);
        assert_eq!(report.issue(), None);
        assert_eq!(report.vendor_id, "GenuineIntel");
        assert_eq!(report.vendor, Vendor::Intel);
        assert!(report.hardware_threading_capable);
        assert!(report.hyper_threading_enabled);
        assert_eq!(report.physical_cores_per_package, 4);
        assert_eq!(report.logical_processors_per_package, 8);
        assert_eq!(report.logical_processors_sharing_cache, 2);
        assert_eq!(report.hyper_threading_logical_processors, 4);
        assert_eq!(report.estimated_package_count, 1);
        assert_eq!(report.l2_cache_size_bytes, 256 * 1024);
        assert_eq!(report.l2_cache_line_bytes, 64);
        assert_eq!(report.initial_apic_id, 3);
        assert_invariants(&report);
    }

    #[test]
    fn intel_two_packages_from_os_count() {
        let report = run(&intel_quad_ht(), 16);
        assert_eq!(report.os_max_logical_processors, 16);
        assert_eq!(report.estimated_package_count, 2);
    }

    #[test]
    fn package_estimate_floors() {
        let report = run(&intel_quad_ht(), 20);
        assert_eq!(report.estimated_package_count, 2);
    }

    #[test]
    fn amd_cores_from_apic_id_size() {
        let cpu = FakeCpu::new(0x10, AMD, 0x8000_001E)
            .with(LEAF_FEATURES, regs(0, 16 << 16, 0, HTT))
            .with(LEAF_ADDRESS_SIZES, regs(0x3030, 0, (3 << 12) | 15, 0));
        let report = run(&cpu, 16);
        assert_eq!(report.vendor, Vendor::Amd);
        assert_eq!(report.physical_cores_per_package, 8);
        assert_eq!(report.logical_processors_per_package, 16);
        assert!(report.hyper_threading_enabled);
        assert_eq!(report.logical_processors_sharing_cache, 0);
        assert_eq!(report.hyper_threading_logical_processors, 8);
        assert!(!cpu.queried(LEAF_CACHE_PARAMS));
        assert_invariants(&report);
    }

    #[test]
    fn amd_legacy_single_core_assumption() {
        let cpu = FakeCpu::new(0x5, AMD, 0x8000_0008)
            .with(LEAF_FEATURES, regs(0, 2 << 16, 0, HTT))
            .with(LEAF_ADDRESS_SIZES, regs(0, 0, 1, 0));
        let report = run(&cpu, 2);
        assert_eq!(report.physical_cores_per_package, 2);
        assert_eq!(report.logical_processors_per_package, 2);
        assert!(!report.hyper_threading_enabled);
        assert_eq!(report.hyper_threading_logical_processors, 0);
        assert_invariants(&report);
    }

    #[test]
    fn missing_instruction_leaves_defaults() {
        let cpu = intel_quad_ht();
        let options = InterrogateOptions::default();
        let report = interrogate_probed(false, &cpu.reader(), &os(8), options);
        assert!(cpu.queries.borrow().is_empty());
        let expected = TopologyReport {
            os_max_logical_processors: 8,
            os_online_logical_processors: 8,
            ..TopologyReport::default()
        };
        assert_eq!(report, expected);
        assert_eq!(report.issue(), Some(TopologyIssue::InstructionUnavailable));
        assert_invariants(&report);
    }

    #[test]
    fn default_report_is_unavailable() {
        let report = TopologyReport::default();
        assert_eq!(report.issue(), Some(TopologyIssue::InstructionUnavailable));
        assert_eq!(report.physical_cores_per_package, 1);
        assert_eq!(report.logical_processors_per_package, 1);
        assert_eq!(report.estimated_package_count, 1);
        assert_eq!(report.hyper_threading_logical_processors, 0);
        assert_invariants(&report);
    }

    #[test]
    fn restricted_execution_stops_before_topology() {
        let cpu = FakeCpu::new(0x3, INTEL, 0x8000_0008)
            .with(LEAF_FEATURES, regs(0, 8 << 16, 0, HTT));
        let report = run(&cpu, 8);
        assert!(report.instruction_restricted);
        assert_eq!(report.issue(), Some(TopologyIssue::RestrictedExecution));
        assert_eq!(report.vendor_id, "GenuineIntel");
        assert_eq!(report.physical_cores_per_package, 1);
        assert_eq!(report.logical_processors_per_package, 1);
        assert_eq!(report.estimated_package_count, 1);
        assert_eq!(report.processor_name, None);
        assert!(!cpu.queried(LEAF_FEATURES));
        assert_invariants(&report);
    }

    #[test]
    fn restricted_check_can_be_disabled() {
        let cpu = FakeCpu::new(0x4, INTEL, 0x8000_0008)
            .with(LEAF_FEATURES, regs(0, 2 << 16, 0, HTT))
            .with(LEAF_CACHE_PARAMS, regs(1 << 26, 0, 0, 0));
        let options = InterrogateOptions {
            restricted_check: false,
        };
        let report = interrogate_with(&cpu.reader(), &os(2), options);
        assert!(!report.instruction_restricted);
        assert_eq!(report.physical_cores_per_package, 2);
        assert_eq!(report.logical_processors_per_package, 2);
        assert!(!report.hyper_threading_enabled);
    }

    #[test]
    fn extended_range_ending_at_brand_leaves_is_not_restricted() {
        let cpu = FakeCpu::new(0x2, INTEL, LEAF_BRAND_LAST);
        let report = run(&cpu, 1);
        assert!(!report.instruction_restricted);
        assert!(cpu.queried(LEAF_FEATURES));
        assert!(!cpu.queried(LEAF_L2_CACHE));
    }

    #[test]
    fn no_threading_halts_before_vendor_branch() {
        let cpu = FakeCpu::new(0xD, INTEL, 0x8000_0008)
            .with(LEAF_FEATURES, regs(0, 8 << 16, 0, 0))
            .with(LEAF_CACHE_PARAMS, regs(3 << 26, 0, 0, 0));
        let report = run(&cpu, 4);
        assert!(!report.hardware_threading_capable);
        assert_eq!(report.physical_cores_per_package, 1);
        assert_eq!(report.logical_processors_per_package, 1);
        assert_eq!(report.apic_layout, None);
        assert_eq!(report.estimated_package_count, 1);
        assert!(!cpu.queried(LEAF_CACHE_PARAMS));
        assert_invariants(&report);
    }

    #[test]
    fn unknown_vendor_sets_flag_and_keeps_defaults() {
        let cpu = FakeCpu::new(0xD, (0x4141_4141, 0x4242_4242, 0x4343_4343), 0x8000_0008)
            .with(LEAF_FEATURES, regs(0, 8 << 16, 0, HTT));
        let report = run(&cpu, 8);
        assert!(report.vendor_unrecognized);
        assert_eq!(report.issue(), Some(TopologyIssue::UnrecognizedVendor));
        assert_eq!(report.vendor_id, "AAAABBBBCCCC");
        assert_eq!(report.physical_cores_per_package, 1);
        assert_eq!(report.logical_processors_per_package, 1);
        assert_eq!(report.logical_processors_sharing_cache, 0);
        assert_eq!(report.hyper_threading_logical_processors, 0);
        assert_eq!(report.estimated_package_count, 1);
        assert!(!report.hyper_threading_enabled);
        assert!(!cpu.queried(LEAF_CACHE_PARAMS));
        assert!(!cpu.queried(LEAF_ADDRESS_SIZES));
    }

    #[test]
    fn low_logical_count_is_raised_to_core_count() {
        let cpu = FakeCpu::new(0xB, INTEL, 0x8000_0008)
            .with(LEAF_FEATURES, regs(0, 2 << 16, 0, HTT))
            .with(LEAF_CACHE_PARAMS, regs((3 << 26) | (1 << 14), 0, 0, 0));
        let report = run(&cpu, 4);
        assert!(report.inconsistent_reading_corrected);
        assert_eq!(report.physical_cores_per_package, 4);
        assert_eq!(report.logical_processors_per_package, 4);
        assert!(!report.hyper_threading_enabled);
        assert_eq!(report.hyper_threading_logical_processors, 0);
        assert_invariants(&report);
    }

    #[test]
    fn intel_without_leaf_four_falls_back_to_difference() {
        let cpu = FakeCpu::new(0x2, INTEL, 0x8000_0004)
            .with(LEAF_FEATURES, regs(0, 2 << 16, 0, HTT));
        let report = run(&cpu, 2);
        assert!(!cpu.queried(LEAF_CACHE_PARAMS));
        assert_eq!(report.logical_processors_sharing_cache, 0);
        assert_eq!(report.physical_cores_per_package, 1);
        assert!(report.hyper_threading_enabled);
        assert_eq!(report.hyper_threading_logical_processors, 1);
        assert_invariants(&report);
    }

    #[test]
    fn apic_layout_follows_reconciled_counts() {
        let report = run(&intel_quad_ht(), 8);
        // apic id 3: smt width 4, core width 4
        assert_eq!(
            report.apic_layout,
            Some(ApicLayout {
                smt_id: 4,
                core_id: 1,
                package_id: 0,
            })
        );
    }

    #[test]
    fn repeated_interrogation_is_identical() {
        let cpu = intel_quad_ht();
        assert_eq!(run(&cpu, 8), run(&cpu, 8));
        assert_eq!(interrogate(), interrogate());
    }

    #[test]
    fn vendor_matches_raw_cpuid_decoding() {
        let cpu = intel_quad_ht();
        let report = run(&cpu, 8);
        let cpuid = raw_cpuid::CpuId::with_cpuid_reader(cpu.reader());
        let vendor = cpuid.get_vendor_info().map(|v| v.as_str().to_string());
        assert_eq!(vendor.as_deref(), Some(report.vendor_id.as_str()));
    }
}
