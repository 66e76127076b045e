//! Built-in drivers.
//!
//! | Constant        | Name                  | Backend                       |
//! |-----------------|-----------------------|-------------------------------|
//! | [`INDEXEDDB`]    | `asyncStorage`        | IndexedDB object store        |
//! | [`WEBSQL`]       | `webSQLStorage`       | WebSQL table                  |
//! | [`LOCALSTORAGE`] | `localStorageWrapper` | prefixed localStorage keys    |
//! | [`MEMORY`]       | `memoryStorageDriver` | process memory                |

mod indexeddb;
mod local_storage;
mod memory;
mod websql;

pub use indexeddb::IndexedDbDriver;
pub use local_storage::LocalStorageDriver;
pub use memory::MemoryDriver;
pub use websql::WebSqlDriver;

use crate::driver::Driver;
use std::sync::Arc;

/// Name of the IndexedDB driver.
pub const INDEXEDDB: &str = "asyncStorage";

/// Name of the WebSQL driver.
pub const WEBSQL: &str = "webSQLStorage";

/// Name of the localStorage driver.
pub const LOCALSTORAGE: &str = "localStorageWrapper";

/// Name of the in-process memory driver.
pub const MEMORY: &str = "memoryStorageDriver";

/// Order tried when a configuration names no drivers.
pub const DEFAULT_DRIVER_ORDER: [&str; 3] = [INDEXEDDB, WEBSQL, LOCALSTORAGE];

/// Returns true if `name` belongs to a built-in driver.
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    matches!(name, INDEXEDDB | WEBSQL | LOCALSTORAGE | MEMORY)
}

/// Fresh instances of every built-in driver.
pub(crate) fn builtin() -> Vec<Arc<dyn Driver>> {
    vec![
        Arc::new(IndexedDbDriver),
        Arc::new(WebSqlDriver),
        Arc::new(LocalStorageDriver),
        Arc::new(MemoryDriver::new()),
    ]
}
