//! # Forage Codec
//!
//! Value model and codecs shared by every Forage driver.
//!
//! Two encodings are provided:
//!
//! - **Structured clone** ([`to_cbor`] / [`from_cbor`]): CBOR bytes that
//!   preserve every [`Value`], binary payloads included. Used by backends
//!   that store structured data.
//! - **String serializer** ([`serialize`] / [`deserialize`]): JSON text,
//!   with a marker format for top-level binary payloads. Used by backends
//!   that only store strings.
//!
//! ## Usage
//!
//! ```
//! use forage_codec::{deserialize, serialize, Binary, Value};
//!
//! let value = Value::map([("count", Value::Integer(2))]);
//! let text = serialize(&value).unwrap();
//! assert_eq!(deserialize(&text).unwrap(), value);
//!
//! let raw = Value::Binary(Binary::array_buffer(vec![1, 2, 3]));
//! assert!(serialize(&raw).unwrap().starts_with("__lfsc__:arbf"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clone;
mod error;
mod serializer;
mod value;

pub use clone::{from_cbor, structured_clone, to_cbor};
pub use error::{CodecError, CodecResult};
pub use serializer::{
    deserialize, from_json, serialize, to_json, BLOB_TYPE_PREFIX, SERIALIZED_MARKER,
};
pub use value::{Binary, BinaryKind, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1_000_000i32..1_000_000).prop_map(|n| Value::Float(f64::from(n) / 4.0)),
            "[a-zA-Z0-9 _/:-]{0,24}".prop_map(Value::Text),
        ]
    }

    fn arb_json_value() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    fn arb_binary() -> impl Strategy<Value = Value> {
        prop_oneof![
            prop::collection::vec(any::<u8>(), 0..32)
                .prop_map(|data| Value::Binary(Binary::array_buffer(data))),
            ("[a-z]{0,8}/[a-z]{0,8}", prop::collection::vec(any::<u8>(), 0..32))
                .prop_map(|(ct, data)| Value::Binary(Binary::blob(ct, data))),
            prop::collection::vec(any::<u8>(), 0..8).prop_map(|half| {
                let data: Vec<u8> = half.iter().flat_map(|b| [*b, 0]).collect();
                Value::Binary(Binary::new(BinaryKind::Uint16Array, data).unwrap())
            }),
        ]
    }

    proptest! {
        #[test]
        fn serializer_preserves_json_values(value in arb_json_value()) {
            let text = serialize(&value).unwrap();
            prop_assert_eq!(deserialize(&text).unwrap(), value);
        }

        #[test]
        fn serializer_preserves_top_level_binary(value in arb_binary()) {
            let text = serialize(&value).unwrap();
            prop_assert!(text.starts_with(SERIALIZED_MARKER));
            prop_assert_eq!(deserialize(&text).unwrap(), value);
        }

        #[test]
        fn structured_clone_is_identity(
            value in prop_oneof![arb_json_value(), arb_binary()]
        ) {
            prop_assert_eq!(structured_clone(&value).unwrap(), value);
        }
    }
}
