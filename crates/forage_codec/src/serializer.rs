//! String serializer for text-only backends.
//!
//! WebSQL columns and localStorage entries hold strings, so values are
//! written as JSON. Binary payloads cannot be expressed in JSON; a top-level
//! binary value is instead written as
//!
//! ```text
//! __lfsc__:<type code>[~~local_forage_type~<content type>~]<base64 payload>
//! ```
//!
//! where the bracketed blob header is present only for blobs. A text value
//! that happens to start with the marker is still written as a quoted JSON
//! string, so it can never be mistaken for a binary payload.

use crate::error::{CodecError, CodecResult};
use crate::value::{Binary, BinaryKind, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;

/// Prefix marking a serialized binary payload.
pub const SERIALIZED_MARKER: &str = "__lfsc__:";

/// Prefix of the blob content-type header.
pub const BLOB_TYPE_PREFIX: &str = "~~local_forage_type~";

const TYPE_CODE_LEN: usize = 4;

/// Serialize a value to its string form.
///
/// # Errors
///
/// Fails with [`CodecError::NotSerializable`] for non-finite floats and for
/// binary payloads nested inside arrays or maps.
pub fn serialize(value: &Value) -> CodecResult<String> {
    if let Value::Binary(binary) = value {
        return Ok(serialize_binary(binary));
    }

    let json = to_json(value)?;
    serde_json::to_string(&json).map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Deserialize a string produced by [`serialize`].
///
/// # Errors
///
/// Fails if the string is neither JSON nor a well-formed binary payload.
pub fn deserialize(text: &str) -> CodecResult<Value> {
    match text.strip_prefix(SERIALIZED_MARKER) {
        Some(rest) => deserialize_binary(rest),
        None => {
            let json: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
            Ok(from_json(json))
        }
    }
}

/// Convert a value to JSON.
///
/// # Errors
///
/// Fails for binary payloads and non-finite floats, which JSON cannot hold.
pub fn to_json(value: &Value) -> CodecResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| CodecError::not_serializable(format!("non-finite float {f}")))?,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Binary(_) => {
            return Err(CodecError::not_serializable(
                "binary data is only supported as a top-level value",
            ))
        }
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(to_json).collect::<CodecResult<Vec<_>>>()?,
        ),
        Value::Map(map) => {
            let mut object = serde_json::Map::new();
            for (k, v) in map {
                object.insert(k.clone(), to_json(v)?);
            }
            serde_json::Value::Object(object)
        }
    })
}

/// Convert JSON into a value.
///
/// Numbers that fit in an `i64` become integers; everything else numeric
/// becomes a float.
#[allow(clippy::cast_precision_loss)]
pub fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

fn serialize_binary(binary: &Binary) -> String {
    let mut out = String::from(SERIALIZED_MARKER);
    out.push_str(binary.kind().code());
    if let BinaryKind::Blob { content_type } = binary.kind() {
        out.push_str(BLOB_TYPE_PREFIX);
        out.push_str(content_type);
        out.push('~');
    }
    out.push_str(&STANDARD.encode(binary.data()));
    out
}

fn deserialize_binary(rest: &str) -> CodecResult<Value> {
    let (code, mut payload) = match (rest.get(..TYPE_CODE_LEN), rest.get(TYPE_CODE_LEN..)) {
        (Some(code), Some(payload)) => (code, payload),
        _ => return Err(CodecError::decoding_failed("truncated binary payload")),
    };
    let mut kind = BinaryKind::from_code(code)?;

    if let BinaryKind::Blob { content_type } = &mut kind {
        // Older payloads carry no content-type header.
        if let Some(header) = payload.strip_prefix(BLOB_TYPE_PREFIX) {
            let end = header
                .find('~')
                .ok_or_else(|| CodecError::decoding_failed("unterminated blob type"))?;
            *content_type = header[..end].to_string();
            payload = &header[end + 1..];
        }
    }

    let data = STANDARD
        .decode(payload)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    Binary::new(kind, data).map(Value::Binary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_are_json() {
        assert_eq!(serialize(&Value::Integer(1)).unwrap(), "1");
        assert_eq!(serialize(&Value::from("a")).unwrap(), "\"a\"");
        assert_eq!(serialize(&Value::Null).unwrap(), "null");
        assert_eq!(
            serialize(&Value::map([("b", Value::Bool(true))])).unwrap(),
            "{\"b\":true}"
        );
    }

    #[test]
    fn integers_and_floats_stay_distinct() {
        assert_eq!(deserialize("1").unwrap(), Value::Integer(1));
        let float = serialize(&Value::Float(1.0)).unwrap();
        assert_eq!(deserialize(&float).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn array_buffer_uses_marker() {
        let value = Value::Binary(Binary::array_buffer(vec![1, 2, 3]));
        let text = serialize(&value).unwrap();
        assert_eq!(text, "__lfsc__:arbfAQID");
        assert_eq!(deserialize(&text).unwrap(), value);
    }

    #[test]
    fn blob_keeps_content_type() {
        let value = Value::Binary(Binary::blob("text/plain", b"hi".to_vec()));
        let text = serialize(&value).unwrap();
        assert!(text.starts_with("__lfsc__:blob~~local_forage_type~text/plain~"));
        assert_eq!(deserialize(&text).unwrap(), value);
    }

    #[test]
    fn blob_without_type_header_decodes() {
        let value = deserialize("__lfsc__:blobaGk=").unwrap();
        assert_eq!(value, Value::Binary(Binary::blob("", b"hi".to_vec())));
    }

    #[test]
    fn marker_lookalike_text_round_trips() {
        let value = Value::from("__lfsc__:arbfAQID");
        let text = serialize(&value).unwrap();
        assert_eq!(deserialize(&text).unwrap(), value);
    }

    #[test]
    fn nested_binary_is_rejected() {
        let value = Value::Array(vec![Value::Binary(Binary::array_buffer(vec![1]))]);
        assert!(matches!(
            serialize(&value),
            Err(CodecError::NotSerializable { .. })
        ));
    }

    #[test]
    fn non_finite_float_is_rejected() {
        assert!(matches!(
            serialize(&Value::Float(f64::NAN)),
            Err(CodecError::NotSerializable { .. })
        ));
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        assert!(matches!(
            deserialize("__lfsc__:zzzzAQID"),
            Err(CodecError::UnknownBinaryType { .. })
        ));
    }

    #[test]
    fn misaligned_typed_array_is_rejected() {
        // Three bytes cannot be a Uint16Array.
        assert!(matches!(
            deserialize("__lfsc__:ur16AQID"),
            Err(CodecError::MisalignedBinary { .. })
        ));
    }
}
