//! CLI error types.

use forage_codec::CodecError;
use forage_core::ForageError;
use forage_host::HostError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors a command can report.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storage operation failed.
    #[error(transparent)]
    Forage(#[from] ForageError),

    /// Host storage could not be opened.
    #[error("cannot open host storage: {0}")]
    Host(#[from] HostError),

    /// A value could not be rendered.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Argument is not valid JSON.
    #[error("invalid JSON value: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    ConfigFile {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}
