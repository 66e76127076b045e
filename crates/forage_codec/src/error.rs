//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while cloning, serializing or deserializing values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value cannot be represented by the target encoding.
    #[error("value is not serializable: {message}")]
    NotSerializable {
        /// Why the value was rejected.
        message: String,
    },

    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode stored bytes or text.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// A binary payload carried a type code this codec does not know.
    #[error("unknown binary type: {code}")]
    UnknownBinaryType {
        /// The type code found in the payload.
        code: String,
    },

    /// A typed-array payload is not a whole number of elements.
    #[error("{kind} payload of {len} bytes is not a multiple of {width}")]
    MisalignedBinary {
        /// Name of the typed-array kind.
        kind: &'static str,
        /// Payload length in bytes.
        len: usize,
        /// Element width in bytes.
        width: usize,
    },
}

impl CodecError {
    /// Create a not-serializable error.
    pub fn not_serializable(message: impl Into<String>) -> Self {
        Self::NotSerializable {
            message: message.into(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
