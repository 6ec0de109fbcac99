pub mod cpu;
pub mod os;

pub use cpu::{
    InterrogateOptions, TopologyIssue, TopologyReport, Vendor, interrogate, interrogate_host,
    interrogate_with,
};
pub use os::{FixedProcessors, HostProcessors, OsProcessors};
