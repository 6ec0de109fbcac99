use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for proctopo.
///
/// Interrogating the processor never fails; these cover configuration and
/// report output only.
#[derive(Debug, Error)]
pub enum ProctopoError {
    /// Writing the report failed
    #[error("Output error: {0}")]
    Output(#[from] io::Error),

    /// Configuration parsing failed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration file is invalid
    #[error("Invalid configuration file {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument}")]
    InvalidArgument { argument: String },

    /// Serializing the report failed
    #[error("Cannot render report as {format}: {message}")]
    Serialize {
        format: &'static str,
        message: String,
    },

    /// Usage text was requested
    #[error("{usage}")]
    Help { usage: String },
}

impl ProctopoError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ProctopoError::Config {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: PathBuf) -> Self {
        ProctopoError::ConfigNotFound { path }
    }

    /// Create a config invalid error
    pub fn config_invalid(path: PathBuf, reason: impl Into<String>) -> Self {
        ProctopoError::ConfigInvalid {
            path,
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(argument: impl Into<String>) -> Self {
        ProctopoError::InvalidArgument {
            argument: argument.into(),
        }
    }

    /// Create a serialization error
    pub fn serialize(format: &'static str, message: impl Into<String>) -> Self {
        ProctopoError::Serialize {
            format,
            message: message.into(),
        }
    }

    /// Create a help request carrying the usage text
    pub fn help(usage: impl Into<String>) -> Self {
        ProctopoError::Help {
            usage: usage.into(),
        }
    }

    pub fn is_help(&self) -> bool {
        matches!(self, ProctopoError::Help { .. })
    }
}

/// Result type alias for proctopo operations
pub type Result<T> = std::result::Result<T, ProctopoError>;

impl From<toml::de::Error> for ProctopoError {
    fn from(err: toml::de::Error) -> Self {
        ProctopoError::Config {
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ProctopoError {
    fn from(err: toml::ser::Error) -> Self {
        ProctopoError::serialize("toml", err.to_string())
    }
}

impl From<serde_json::Error> for ProctopoError {
    fn from(err: serde_json::Error) -> Self {
        ProctopoError::serialize("json", err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for ProctopoError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ProctopoError::serialize("yaml", err.to_string())
    }
}
