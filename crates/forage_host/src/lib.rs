//! # Forage Host
//!
//! Models of the storage APIs a host environment may expose to Forage,
//! plus the capability probes that decide which of them are usable.
//!
//! - [`IndexedDb`]: versioned databases of object stores holding bytes.
//!   [`MemoryIndexedDb`] keeps them in memory.
//! - [`WebSql`]: SQL databases with atomic transactions.
//!   [`SqliteWebSql`] runs them on SQLite, in memory or on disk.
//! - [`LocalStorage`]: a synchronous string area.
//!   [`MemoryLocalStorage`] supports quotas and a blocked mode;
//!   [`FileLocalStorage`] persists to a JSON file.
//!
//! A [`HostEnvironment`] bundles whichever of these are present.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod env;
mod error;
mod indexeddb;
mod local_storage;
mod probe;
mod websql;

pub use env::{HostEnvironment, DEFAULT_USER_AGENT};
pub use error::{HostError, HostResult};
pub use indexeddb::{DatabaseInfo, IndexedDb, MemoryIndexedDb, OpenRequest};
pub use local_storage::{FileLocalStorage, LocalStorage, MemoryLocalStorage};
pub use probe::{
    is_buggy_safari_version, is_indexed_db_valid, is_local_storage_valid, is_safari,
    is_web_sql_valid,
};
pub use websql::{
    SqlDatabase, SqlResultSet, SqlRow, SqlStatement, SqlValue, SqliteDatabase, SqliteWebSql,
    WebSql,
};
