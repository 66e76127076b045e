//! Benchmark utilities.

#![warn(missing_docs)]

use forage_codec::{Binary, Value};
use forage_core::{Config, DriverRegistry, LocalForage};
use forage_host::HostEnvironment;
use rand::Rng;
use std::sync::Arc;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// A small record as an application would store it.
pub fn record(id: i64) -> Value {
    Value::map([
        ("id", Value::Integer(id)),
        ("name", Value::from("Alice")),
        ("email", Value::from("alice@example.com")),
        ("tags", Value::Array(vec![Value::from("a"), Value::from("b")])),
    ])
}

/// A map nested `depth` levels deep with `width` entries per level.
pub fn nested(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::from("leaf")
    } else {
        Value::map((0..width).map(|i| (format!("key_{i}"), nested(depth - 1, width))))
    }
}

/// A top-level binary payload of `size` random bytes.
pub fn payload(size: usize) -> Value {
    Value::Binary(Binary::array_buffer(random_data(size)))
}

/// An in-memory instance pinned to one driver with a private registry.
pub fn instance(driver: &str) -> LocalForage {
    LocalForage::with_registry(
        HostEnvironment::in_memory(),
        Arc::new(DriverRegistry::new()),
        Config::new().name("bench").driver_order([driver]),
    )
    .expect("valid bench config")
}
