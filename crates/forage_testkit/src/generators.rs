//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, values and operation
//! sequences.

use forage_codec::{Binary, Value};
use proptest::prelude::*;

/// Strategy for generating storage keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_.-]{1,16}").expect("Invalid regex")
}

/// Floats that survive a trip through decimal text unchanged.
fn float_strategy() -> impl Strategy<Value = f64> {
    (-1_000_000i32..1_000_000).prop_map(|n| f64::from(n) / 4.0)
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        float_strategy().prop_map(Value::Float),
        "[a-zA-Z0-9 _/:~-]{0,24}".prop_map(Value::Text),
    ]
}

/// Strategy for binary payloads: array buffers and blobs.
pub fn binary_strategy() -> impl Strategy<Value = Binary> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Binary::array_buffer),
        ("[a-z]{1,8}/[a-z]{1,8}", prop::collection::vec(any::<u8>(), 0..64))
            .prop_map(|(content_type, data)| Binary::blob(content_type, data)),
    ]
}

/// Strategy for values without binary data.
///
/// Every driver can store these, including the ones that serialize
/// values to text.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for values every driver can store: JSON-like values or a
/// top-level binary payload.
pub fn storable_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => json_value_strategy(),
        1 => binary_strategy().prop_map(Value::Binary),
    ]
}

/// Strategy for arbitrary values, with binary data at any depth.
///
/// Only structured-clone drivers (IndexedDB, memory) can store all of
/// these.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        4 => scalar_strategy(),
        1 => binary_strategy().prop_map(Value::Binary),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// One storage operation.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Write a value
    Set {
        /// Key
        key: String,
        /// Value
        value: Value,
    },
    /// Remove a value
    Remove {
        /// Key
        key: String,
    },
    /// Read a value
    Get {
        /// Key
        key: String,
    },
    /// Remove every value
    Clear,
}

/// Strategy for operations over a small key space, so that reads and
/// removals often hit written keys.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    let key = || "[a-d]".prop_map(String::from);
    prop_oneof![
        4 => (key(), storable_value_strategy())
            .prop_map(|(key, value)| StoreOperation::Set { key, value }),
        2 => key().prop_map(|key| StoreOperation::Remove { key }),
        3 => key().prop_map(|key| StoreOperation::Get { key }),
        1 => Just(StoreOperation::Clear),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
