//! Dynamic value type stored by every driver.

use crate::error::{CodecError, CodecResult};
use std::collections::BTreeMap;

/// A dynamic, structurally cloneable value.
///
/// This is the value type accepted by `setItem` and returned by `getItem`.
/// Maps are keyed by strings and kept in key order so that two equal maps
/// always encode to the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Double-precision float.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Binary payload (array buffer, blob or typed array).
    Binary(Binary),
    /// Array of values.
    Array(Vec<Value>),
    /// String-keyed map of values.
    Map(BTreeMap<String, Value>),
}

/// The flavour of a binary payload.
///
/// Each kind has a four character type code used by the string serializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    /// Raw bytes.
    ArrayBuffer,
    /// Bytes with a MIME content type.
    Blob {
        /// MIME type of the blob, possibly empty.
        content_type: String,
    },
    /// Signed 8-bit elements.
    Int8Array,
    /// Unsigned 8-bit elements.
    Uint8Array,
    /// Unsigned 8-bit elements, clamped on write.
    Uint8ClampedArray,
    /// Signed 16-bit elements.
    Int16Array,
    /// Unsigned 16-bit elements.
    Uint16Array,
    /// Signed 32-bit elements.
    Int32Array,
    /// Unsigned 32-bit elements.
    Uint32Array,
    /// 32-bit float elements.
    Float32Array,
    /// 64-bit float elements.
    Float64Array,
}

impl BinaryKind {
    /// Returns the four character type code for this kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            BinaryKind::ArrayBuffer => "arbf",
            BinaryKind::Blob { .. } => "blob",
            BinaryKind::Int8Array => "si08",
            BinaryKind::Uint8Array => "ui08",
            BinaryKind::Uint8ClampedArray => "uic8",
            BinaryKind::Int16Array => "si16",
            BinaryKind::Uint16Array => "ur16",
            BinaryKind::Int32Array => "si32",
            BinaryKind::Uint32Array => "ui32",
            BinaryKind::Float32Array => "fl32",
            BinaryKind::Float64Array => "fl64",
        }
    }

    /// Resolves a type code back to a kind.
    ///
    /// Blobs come back with an empty content type; callers that carry the
    /// content type separately fill it in afterwards.
    pub fn from_code(code: &str) -> CodecResult<Self> {
        let kind = match code {
            "arbf" => BinaryKind::ArrayBuffer,
            "blob" => BinaryKind::Blob {
                content_type: String::new(),
            },
            "si08" => BinaryKind::Int8Array,
            "ui08" => BinaryKind::Uint8Array,
            "uic8" => BinaryKind::Uint8ClampedArray,
            "si16" => BinaryKind::Int16Array,
            "ur16" => BinaryKind::Uint16Array,
            "si32" => BinaryKind::Int32Array,
            "ui32" => BinaryKind::Uint32Array,
            "fl32" => BinaryKind::Float32Array,
            "fl64" => BinaryKind::Float64Array,
            other => {
                return Err(CodecError::UnknownBinaryType {
                    code: other.to_string(),
                })
            }
        };
        Ok(kind)
    }

    /// Width in bytes of one element of this kind.
    #[must_use]
    pub fn element_width(&self) -> usize {
        match self {
            BinaryKind::Int16Array | BinaryKind::Uint16Array => 2,
            BinaryKind::Int32Array | BinaryKind::Uint32Array | BinaryKind::Float32Array => 4,
            BinaryKind::Float64Array => 8,
            _ => 1,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BinaryKind::ArrayBuffer => "ArrayBuffer",
            BinaryKind::Blob { .. } => "Blob",
            BinaryKind::Int8Array => "Int8Array",
            BinaryKind::Uint8Array => "Uint8Array",
            BinaryKind::Uint8ClampedArray => "Uint8ClampedArray",
            BinaryKind::Int16Array => "Int16Array",
            BinaryKind::Uint16Array => "Uint16Array",
            BinaryKind::Int32Array => "Int32Array",
            BinaryKind::Uint32Array => "Uint32Array",
            BinaryKind::Float32Array => "Float32Array",
            BinaryKind::Float64Array => "Float64Array",
        }
    }
}

/// A binary payload together with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    kind: BinaryKind,
    data: Vec<u8>,
}

impl Binary {
    /// Creates a binary payload, checking that typed arrays hold whole elements.
    pub fn new(kind: BinaryKind, data: Vec<u8>) -> CodecResult<Self> {
        let width = kind.element_width();
        if data.len() % width != 0 {
            return Err(CodecError::MisalignedBinary {
                kind: kind.name(),
                len: data.len(),
                width,
            });
        }
        Ok(Self { kind, data })
    }

    /// Creates an `ArrayBuffer` payload.
    #[must_use]
    pub fn array_buffer(data: Vec<u8>) -> Self {
        Self {
            kind: BinaryKind::ArrayBuffer,
            data,
        }
    }

    /// Creates a `Blob` payload with the given content type.
    #[must_use]
    pub fn blob(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind: BinaryKind::Blob {
                content_type: content_type.into(),
            },
            data,
        }
    }

    /// Returns the payload kind.
    #[must_use]
    pub fn kind(&self) -> &BinaryKind {
        &self.kind
    }

    /// Returns the raw payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the payload, returning its bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl Value {
    /// Build a map value from key/value pairs.
    pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a binary payload, if it is one.
    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Look up a key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Returns true if this value, or anything nested in it, is binary.
    pub fn contains_binary(&self) -> bool {
        match self {
            Value::Binary(_) => true,
            Value::Array(items) => items.iter().any(Value::contains_binary),
            Value::Map(map) => map.values().any(Value::contains_binary),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Binary> for Value {
    fn from(b: Binary) -> Self {
        Value::Binary(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
