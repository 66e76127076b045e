//! # Forage Testkit
//!
//! Test utilities for Forage.
//!
//! This crate provides:
//! - Fixtures: host environments, on-disk hosts and instances
//! - Custom drivers with controllable behavior (map-backed, failing, slow)
//! - Property-based test generators using proptest
//! - A model harness checking any driver against a plain map
//!
//! Cross-crate scenario tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use forage_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_memdriver() {
//!     let registry = fresh_registry();
//!     registry.define_driver(Arc::new(MapDriver::new())).unwrap();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
