//! # Forage Core
//!
//! An asynchronous key/value store that runs over whichever storage
//! backend the host supports.
//!
//! This crate provides:
//! - [`LocalForage`], the storage facade every caller talks to
//! - [`DriverRegistry`] of built-in and custom drivers
//! - Driver selection over a preferred order ([`select_driver`])
//! - The ready gate that queues operations until a driver is initialized
//! - [`Config`], the per-instance configuration record
//!
//! Built-in drivers live in [`drivers`]: IndexedDB, WebSQL, localStorage
//! and an in-process memory driver. Custom drivers implement [`Driver`]
//! or are assembled from handlers with [`DriverTable`].
//!
//! ## Example
//!
//! ```no_run
//! use forage_core::{ConfigPatch, LocalForage};
//! use forage_host::HostEnvironment;
//!
//! # async fn demo() -> forage_core::ForageResult<()> {
//! let forage = LocalForage::new(HostEnvironment::in_memory());
//! forage.configure(&ConfigPatch::new().name("app").store_name("settings"))?;
//!
//! forage.set_item("theme", "dark").await?;
//! let theme = forage.get_item("theme").await?;
//! assert_eq!(theme, Some("dark".into()));
//! println!("stored with {:?}", forage.driver());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
pub mod drivers;
mod error;
mod gate;
mod instance;
mod registry;
mod request;
mod selector;
mod table;

pub use config::{
    sanitize_store_name, Config, ConfigKey, ConfigPatch, ConfigValue, DEFAULT_NAME, DEFAULT_SIZE,
    DEFAULT_STORE_NAME, DEFAULT_VERSION,
};
pub use driver::{
    Driver, DriverContext, DriverKind, DropScope, DropTarget, Primitive, Storage, Visitor,
};
pub use drivers::{DEFAULT_DRIVER_ORDER, INDEXEDDB, LOCALSTORAGE, MEMORY, WEBSQL};
pub use error::{ForageError, ForageResult};
pub use gate::{GateState, OperationKind};
pub use instance::LocalForage;
pub use registry::DriverRegistry;
pub use request::Request;
pub use selector::{select_driver, DriverOrder};
pub use table::DriverTable;

pub use forage_codec::{Binary, BinaryKind, Value};
pub use forage_host::HostEnvironment;
