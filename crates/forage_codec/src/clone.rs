//! Structured-clone codec.
//!
//! Drivers whose backend stores structured data (IndexedDB, the memory
//! driver) persist values as CBOR produced here. Every [`Value`] survives
//! the round trip, including binary payloads, which are carried as tagged
//! byte strings.

use crate::error::{CodecError, CodecResult};
use crate::value::{Binary, BinaryKind, Value};
use ciborium::value::{Integer, Value as Cbor};
use std::collections::BTreeMap;

/// First tag number used for binary kinds; each kind adds its ordinal.
const BINARY_TAG_BASE: u64 = 27_000;

const BINARY_CODES: [&str; 11] = [
    "arbf", "blob", "si08", "ui08", "uic8", "si16", "ur16", "si32", "ui32", "fl32", "fl64",
];

/// Encode a value to its structured-clone bytes.
///
/// # Errors
///
/// Returns an error only if the CBOR writer fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let cbor = to_cbor_value(value);
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&cbor, &mut bytes)
        .map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(bytes)
}

/// Decode structured-clone bytes back into a value.
///
/// # Errors
///
/// Returns an error if the bytes are not CBOR or use constructs this codec
/// never writes (non-text map keys, unknown tags, out-of-range integers).
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let cbor: Cbor = ciborium::de::from_reader(bytes)
        .map_err(|e| CodecError::decoding_failed(format!("{e:?}")))?;
    from_cbor_value(cbor)
}

/// Produce a deep copy of `value` by passing it through the codec.
///
/// This is the moral equivalent of a host's structured clone: the copy
/// shares nothing with the original.
pub fn structured_clone(value: &Value) -> CodecResult<Value> {
    from_cbor(&to_cbor(value)?)
}

fn binary_tag(kind: &BinaryKind) -> u64 {
    let ordinal = BINARY_CODES
        .iter()
        .position(|code| *code == kind.code())
        .unwrap_or_default();
    BINARY_TAG_BASE + ordinal as u64
}

fn to_cbor_value(value: &Value) -> Cbor {
    match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(n) => Cbor::Integer(Integer::from(*n)),
        Value::Float(f) => Cbor::Float(*f),
        Value::Text(s) => Cbor::Text(s.clone()),
        Value::Binary(binary) => {
            let tag = binary_tag(binary.kind());
            let payload = match binary.kind() {
                BinaryKind::Blob { content_type } => Cbor::Array(vec![
                    Cbor::Text(content_type.clone()),
                    Cbor::Bytes(binary.data().to_vec()),
                ]),
                _ => Cbor::Bytes(binary.data().to_vec()),
            };
            Cbor::Tag(tag, Box::new(payload))
        }
        Value::Array(items) => Cbor::Array(items.iter().map(to_cbor_value).collect()),
        Value::Map(map) => Cbor::Map(
            map.iter()
                .map(|(k, v)| (Cbor::Text(k.clone()), to_cbor_value(v)))
                .collect(),
        ),
    }
}

fn from_cbor_value(cbor: Cbor) -> CodecResult<Value> {
    match cbor {
        Cbor::Null => Ok(Value::Null),
        Cbor::Bool(b) => Ok(Value::Bool(b)),
        Cbor::Integer(n) => i64::try_from(n)
            .map(Value::Integer)
            .map_err(|_| CodecError::decoding_failed("integer out of range")),
        Cbor::Float(f) => Ok(Value::Float(f)),
        Cbor::Text(s) => Ok(Value::Text(s)),
        Cbor::Bytes(b) => Ok(Value::Binary(Binary::array_buffer(b))),
        Cbor::Array(items) => items
            .into_iter()
            .map(from_cbor_value)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        Cbor::Map(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let Cbor::Text(key) = key else {
                    return Err(CodecError::decoding_failed("map key is not text"));
                };
                map.insert(key, from_cbor_value(value)?);
            }
            Ok(Value::Map(map))
        }
        Cbor::Tag(tag, payload) => decode_binary(tag, *payload),
        other => Err(CodecError::decoding_failed(format!(
            "unsupported CBOR item: {other:?}"
        ))),
    }
}

fn decode_binary(tag: u64, payload: Cbor) -> CodecResult<Value> {
    let code = tag
        .checked_sub(BINARY_TAG_BASE)
        .and_then(|ordinal| BINARY_CODES.get(ordinal as usize))
        .ok_or_else(|| CodecError::decoding_failed(format!("unknown tag {tag}")))?;
    let kind = BinaryKind::from_code(code)?;

    let (kind, data) = match (kind, payload) {
        (BinaryKind::Blob { .. }, Cbor::Array(mut parts)) if parts.len() == 2 => {
            let data = parts.pop();
            let content_type = parts.pop();
            match (content_type, data) {
                (Some(Cbor::Text(content_type)), Some(Cbor::Bytes(data))) => {
                    (BinaryKind::Blob { content_type }, data)
                }
                _ => return Err(CodecError::decoding_failed("malformed blob payload")),
            }
        }
        (BinaryKind::Blob { .. }, _) => {
            return Err(CodecError::decoding_failed("malformed blob payload"))
        }
        (kind, Cbor::Bytes(data)) => (kind, data),
        (_, _) => return Err(CodecError::decoding_failed("binary payload is not bytes")),
    };

    Binary::new(kind, data).map(Value::Binary)
}
