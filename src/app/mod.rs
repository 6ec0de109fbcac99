mod config;
mod output;

pub use config::Config;
pub use output::{HostContext, OutputFormat, render, write_report};
