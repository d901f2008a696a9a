//! Error types for nativeconf

use std::path::PathBuf;
use thiserror::Error;

/// nativeconf error type
#[derive(Error, Debug)]
pub enum Error {
    /// The compiler or a probe binary exited unsuccessfully.
    #[error("{command} failed:\n{output}")]
    ExternalToolFailure { command: String, output: String },

    /// Probe output did not follow the expected line grammar.
    #[error("unexpected output from probe {probe}: {reason}: {line:?}")]
    FormatMismatch {
        probe: String,
        line: String,
        reason: String,
    },

    #[error("could not find marker {marker:?} in {}", path.display())]
    MissingMarker { path: PathBuf, marker: String },

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn format_mismatch(
        probe: impl Into<String>,
        line: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::FormatMismatch {
            probe: probe.into(),
            line: line.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for nativeconf
pub type Result<T> = std::result::Result<T, Error>;
