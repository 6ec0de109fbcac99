mod bits;
mod brand;
mod cache;
pub mod registers;
mod topology;
mod vendor;

pub use bits::{ApicLayout, decompose_apic_id, mask_of_width, popcount};
pub use brand::read_processor_name;
pub use cache::L2Cache;
pub use registers::{CpuIdReader, CpuIdResult, cpuid_available, native_reader};
pub use topology::{
    InterrogateOptions, TopologyIssue, TopologyReport, interrogate, interrogate_host,
    interrogate_with,
};
pub use vendor::{AMD_VENDOR_ID, INTEL_VENDOR_ID, Vendor, decode_vendor_id};
