//! Unified error types for audiobatch
//!
//! Error strategy:
//! - Unsupported content: recoverable, the caller falls through to the next plugin
//! - Invalid configuration: rejected before any file I/O starts
//! - Processing failures: abort that file's unit of work, then the whole batch

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for audiobatch operations
#[derive(Debug, Error)]
pub enum AudioError {
    // =========================================================================
    // Recoverable errors - try the next plugin for the same content
    // =========================================================================
    #[error("Content of '{path}' is not supported by this plugin: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    // =========================================================================
    // Configuration errors - rejected synchronously, before any I/O
    // =========================================================================
    #[error("Unknown setting '{key}'\n  Tip: Check the plugin's setting info for the keys it accepts")]
    UnknownSetting { key: String },

    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Invalid template '{template}': '{{{identifier}}}' is not a metadata field")]
    InvalidTemplate { template: String, identifier: String },

    #[error("No {kind} plugin named '{name}' is registered")]
    PluginNotFound { kind: String, name: String },

    // =========================================================================
    // Per-file processing errors - abort the batch once in-flight work settles
    // =========================================================================
    #[error("Unsupported audio format for '{path}': no registered plugin accepts '.{extension}' content")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Output file already exists: '{0}'\n  Tip: Enable overwrite to replace it")]
    OutputExists(PathBuf),

    #[error("Failed to decode audio file '{path}': {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Failed to encode '{path}': {reason}")]
    EncodeError { path: PathBuf, reason: String },

    #[error("Analysis failed for '{path}': {reason}")]
    AnalysisError { path: PathBuf, reason: String },

    #[error("Failed to read or write tags of '{path}': {reason}")]
    MetadataError { path: PathBuf, reason: String },

    #[error("Group result requested but a member of the group did not complete")]
    GroupIncomplete,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for audiobatch operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl AudioError {
    /// Returns true if a plugin declined the content and the next candidate should be tried
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AudioError::Unsupported { .. })
    }

    /// Returns true if this error is a configuration problem detected before any I/O
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AudioError::UnknownSetting { .. }
                | AudioError::InvalidSetting { .. }
                | AudioError::InvalidTemplate { .. }
                | AudioError::PluginNotFound { .. }
        )
    }

    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AudioError::Unsupported {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AudioError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_setting(key: impl Into<String>, reason: impl Into<String>) -> Self {
        AudioError::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Fill in the file path of errors raised by plugins, which only see streams
    pub fn with_path(self, file: &std::path::Path) -> Self {
        match self {
            AudioError::Unsupported { path, reason } if path.as_os_str().is_empty() => {
                AudioError::Unsupported { path: file.to_path_buf(), reason }
            }
            AudioError::DecodeError { path, reason } if path.as_os_str().is_empty() => {
                AudioError::DecodeError { path: file.to_path_buf(), reason }
            }
            AudioError::EncodeError { path, reason } if path.as_os_str().is_empty() => {
                AudioError::EncodeError { path: file.to_path_buf(), reason }
            }
            AudioError::AnalysisError { path, reason } if path.as_os_str().is_empty() => {
                AudioError::AnalysisError { path: file.to_path_buf(), reason }
            }
            AudioError::MetadataError { path, reason } if path.as_os_str().is_empty() => {
                AudioError::MetadataError { path: file.to_path_buf(), reason }
            }
            other => other,
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "Directory does not exist: {}",
                    path.parent().map(|p| p.display().to_string()).unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        AudioError::OutputError { path, reason }
    }
}
