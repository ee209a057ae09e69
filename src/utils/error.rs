use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to access module file {}: {source}", .path.display())]
    ModuleIoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Submitted code is not valid URL-safe base64: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Submitted code is not valid UTF-8: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("Source does not contain a bare `@page()` declaration")]
    MissingMarkerError,

    #[error("Source contains {count} bare `@page()` declarations, expected exactly one")]
    AmbiguousMarkerError { count: usize },

    #[error("{module}:{line}: {message}")]
    ScriptError {
        module: String,
        line: usize,
        message: String,
    },

    #[error("Page path {path} registered by module {module} is already taken")]
    DuplicatePathError { path: String, module: String },

    #[error("Missing request parameter: {field}")]
    MissingParameterError { field: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request itself was incomplete.
    Input,
    /// The submitted page source could not be decoded, rewritten, or executed.
    Source,
    /// Reading or writing module files failed.
    Storage,
    Configuration,
}

impl RunnerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RunnerError::MissingParameterError { .. } => ErrorCategory::Input,
            RunnerError::DecodeError(_)
            | RunnerError::Utf8Error(_)
            | RunnerError::MissingMarkerError
            | RunnerError::AmbiguousMarkerError { .. }
            | RunnerError::ScriptError { .. }
            | RunnerError::DuplicatePathError { .. } => ErrorCategory::Source,
            RunnerError::IoError(_) | RunnerError::ModuleIoError { .. } => ErrorCategory::Storage,
            RunnerError::ConfigError { .. } | RunnerError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn script(module: &str, line: usize, message: impl Into<String>) -> Self {
        RunnerError::ScriptError {
            module: module.to_string(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
