//! Error types for Forage.

use forage_codec::CodecError;
use forage_host::HostError;
use thiserror::Error;

/// Result type for Forage operations.
pub type ForageResult<T> = Result<T, ForageError>;

/// Errors surfaced by a storage instance.
///
/// A selection failure is delivered to every operation waiting on the
/// instance, so errors are `Clone`. Host and codec errors pass through
/// unchanged.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForageError {
    /// No candidate driver is supported by the host.
    #[error("No available storage method found.")]
    NoAvailableDriver,

    /// A driver name was never registered.
    #[error("driver not found: {name}")]
    DriverNotFound {
        /// The requested driver name.
        name: String,
    },

    /// A custom driver definition is malformed.
    #[error("custom driver {name:?} is not compliant: {reason}")]
    DriverConfiguration {
        /// The driver name, possibly empty.
        name: String,
        /// What is wrong with the definition.
        reason: String,
    },

    /// A custom driver tried to take a built-in driver's name.
    #[error("custom driver name {name:?} is reserved by a built-in driver")]
    DriverNameConflict {
        /// The conflicting name.
        name: String,
    },

    /// The configuration was changed after the instance started resolving.
    #[error("configuration cannot be changed after the instance has been used")]
    ConfigLocked,

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },

    /// An operation was called with unusable arguments.
    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        /// What is wrong.
        message: String,
    },

    /// The host storage API failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A value could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A custom driver reported a failure.
    #[error("driver error: {message}")]
    Driver {
        /// The driver's message.
        message: String,
    },

    /// The operation was submitted outside an async runtime.
    #[error("no async runtime is available to run the operation")]
    NoRuntime,

    /// The operation was abandoned before it settled.
    #[error("operation was dropped before it settled")]
    Dropped,
}

impl ForageError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a driver error.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }
}
