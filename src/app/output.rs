use std::io::Write;

use crate::data::TopologyReport;
use crate::error::Result;
use crate::utils::{label_line, yes_no};

const LABEL_WIDTH: usize = 36;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Toml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Text,
        OutputFormat::Json,
        OutputFormat::Yaml,
        OutputFormat::Toml,
    ];

    /// Accepted names joined for help and error text (e.g. "text | json")
    pub fn choices() -> String {
        Self::ALL.map(Self::label).join(" | ")
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "txt" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            "toml" => Some(OutputFormat::Toml),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Toml => "toml",
        }
    }
}

/// Extra context shown next to the report in text mode
#[derive(Clone, Debug, Default)]
pub struct HostContext {
    /// Physical cores as counted by the OS, for comparison with cpuid
    pub os_physical_cores: Option<usize>,
}

impl HostContext {
    pub fn detect() -> Self {
        Self {
            os_physical_cores: sysinfo::System::physical_core_count(),
        }
    }
}

pub fn render(report: &TopologyReport, format: OutputFormat, host: &HostContext) -> Result<String> {
    log::debug!("rendering report as {}", format.label());
    let rendered = match format {
        OutputFormat::Text => render_text(report, host),
        OutputFormat::Json => serde_json::to_string_pretty(report)? + "\n",
        OutputFormat::Yaml => serde_yaml_ng::to_string(report)?,
        OutputFormat::Toml => toml::to_string_pretty(report)?,
    };
    Ok(rendered)
}

pub fn write_report<W: Write>(
    out: &mut W,
    report: &TopologyReport,
    format: OutputFormat,
    host: &HostContext,
) -> Result<()> {
    let rendered = render(report, format, host)?;
    out.write_all(rendered.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn render_text(report: &TopologyReport, host: &HostContext) -> String {
    let line = |label: &str, value: &dyn std::fmt::Display| label_line(label, value, LABEL_WIDTH);
    let issue = report
        .issue()
        .map(|issue| issue.to_string())
        .unwrap_or_else(|| "none".to_string());
    let name = report.processor_name.as_deref().unwrap_or("N/A");
    let os_cores = host
        .os_physical_cores
        .map(|n| n.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut lines = vec![
        "An OS views physical cores and hardware threads as logical processors".to_string(),
        "in a multi-package, multi-core, multi-threading environment.".to_string(),
        String::new(),
        line("issue", &issue),
        line("cpuid present", &yes_no(report.instruction_available)),
        line("cpuid restricted", &yes_no(report.instruction_restricted)),
        line("vendor", &report.vendor),
        line("vendor id", &report.vendor_id),
        line("processor name", &name),
        line(
            "hardware threading supported",
            &yes_no(report.hardware_threading_capable),
        ),
        line("hyper-threading enabled", &yes_no(report.hyper_threading_enabled)),
        line("online logical processors", &report.os_online_logical_processors),
        line("maximum logical processors", &report.os_max_logical_processors),
        line("physical processors (estimated)", &report.estimated_package_count),
        line("physical cores per package", &report.physical_cores_per_package),
        line(
            "logical processors per package",
            &report.logical_processors_per_package,
        ),
        line(
            "logical processors sharing cache",
            &report.logical_processors_sharing_cache,
        ),
        line(
            "hyper-threading processors",
            &report.hyper_threading_logical_processors,
        ),
        line("L2 cache", &report.l2_cache().format()),
        line("initial APIC id", &report.initial_apic_id),
    ];

    if let Some(layout) = report.apic_layout {
        lines.push(line(
            "APIC smt/core/package id",
            &format!("{}/{}/{}", layout.smt_id, layout.core_id, layout.package_id),
        ));
    }
    if report.inconsistent_reading_corrected {
        lines.push(line("logical count corrected", &"yes"));
    }
    lines.push(line("OS physical cores (sysinfo)", &os_cores));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
