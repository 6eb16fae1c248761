//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}", path.display())]
    Read {
        /// Settings file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid JSON or has a field of the wrong type.
    #[error("invalid settings in {}", path.display())]
    Parse {
        /// Settings file.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// The compiled defaults could not be converted for merging.
    #[error("failed to encode default settings")]
    Defaults(#[source] serde_json::Error),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
