use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::Deserialize;

use super::output::OutputFormat;
use crate::data::InterrogateOptions;
use crate::error::{ProctopoError, Result};

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub format: OutputFormat,
    pub options: InterrogateOptions,
    pub log_level: LevelFilter,
}

/// File-based configuration (TOML)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    general: GeneralConfig,
    detection: DetectionConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeneralConfig {
    format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DetectionConfig {
    restricted_check: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            restricted_check: true,
        }
    }
}

impl Config {
    pub fn from_args() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();

        // An explicit --config must load; the default location is optional
        let file_config = match explicit_config_path(&args)? {
            Some(path) => load_config_file(&path)?,
            None => config_path()
                .filter(|path| path.exists())
                .and_then(|path| load_config_file(&path).ok())
                .unwrap_or_default(),
        };

        // Start with file config values
        let mut format = OutputFormat::parse(&file_config.general.format).ok_or_else(|| {
            ProctopoError::config(format!(
                "Unknown output format: {} (expected {})",
                file_config.general.format,
                OutputFormat::choices()
            ))
        })?;
        let mut restricted_check = file_config.detection.restricted_check;
        let mut verbosity = 0u8;

        // Override with CLI args
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(ProctopoError::help(usage())),
                "--format" | "-f" => {
                    let value = args.next().ok_or_else(|| {
                        ProctopoError::invalid_argument(format!(
                            "Missing value for --format\n\n{}",
                            usage()
                        ))
                    })?;
                    format = OutputFormat::parse(&value).ok_or_else(|| {
                        ProctopoError::invalid_argument(format!(
                            "Invalid format: {value} (expected {})\n\n{}",
                            OutputFormat::choices(),
                            usage()
                        ))
                    })?;
                }
                "--json" => format = OutputFormat::Json,
                "--no-restricted-check" => restricted_check = false,
                "--config" => {
                    // already loaded above
                    args.next();
                }
                "--verbose" => verbosity = verbosity.saturating_add(1),
                flag if is_verbose_cluster(flag) => {
                    let count = u8::try_from(flag.len() - 1).unwrap_or(u8::MAX);
                    verbosity = verbosity.saturating_add(count);
                }
                _ => {
                    return Err(ProctopoError::invalid_argument(format!(
                        "Unknown argument: {arg}\n\n{}",
                        usage()
                    )));
                }
            }
        }

        Ok(Self {
            format,
            options: InterrogateOptions { restricted_check },
            log_level: level_for_verbosity(verbosity),
        })
    }
}

fn explicit_config_path(args: &[String]) -> Result<Option<PathBuf>> {
    let Some(index) = args.iter().position(|arg| arg == "--config") else {
        return Ok(None);
    };
    args.get(index + 1)
        .map(|path| Some(PathBuf::from(path)))
        .ok_or_else(|| {
            ProctopoError::invalid_argument(format!("Missing value for --config\n\n{}", usage()))
        })
}

fn is_verbose_cluster(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v')
}

fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("proctopo").join("config.toml"))
}

fn load_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .map_err(|_| ProctopoError::config_not_found(path.to_path_buf()))?;
    toml::from_str(&content)
        .map_err(|err| ProctopoError::config_invalid(path.to_path_buf(), err.to_string()))
}

fn usage() -> String {
    let config_location = config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/proctopo/config.toml".to_string());

    [
        "Usage: proctopo [options]",
        "",
        "Report the processor vendor, cores, threads and packages of this host.",
        "",
        "Options:",
        &format!(
            "  -f, --format <fmt>      {} (default: text)",
            OutputFormat::choices()
        ),
        "  --json                  Same as --format json",
        "  --no-restricted-check   Trust the extended cpuid range even when the",
        "                          standard range looks truncated",
        "  --config <path>         Read configuration from <path>",
        "  -v, --verbose           Log decoding steps (repeat for more detail)",
        "  -h, --help              Show this help",
        "",
        &format!("Config file: {config_location}"),
        "",
        "Example config.toml:",
        "  [general]",
        "  format = \"text\"",
        "",
        "  [detection]",
        "  restricted_check = true",
    ]
    .join("\n")
}
