//! On-disk host environment.

use crate::error::CliResult;
use forage_host::{FileLocalStorage, HostEnvironment, SqliteWebSql};
use std::path::Path;
use std::sync::Arc;

/// Subdirectory holding one SQLite file per WebSQL database.
pub const WEBSQL_DIR: &str = "websql";

/// File holding the localStorage area.
pub const LOCAL_STORAGE_FILE: &str = "localStorage.json";

/// Opens the host stored under `dir`, creating it if needed.
///
/// The host has WebSQL and localStorage but no IndexedDB.
pub fn open(dir: &Path) -> CliResult<HostEnvironment> {
    std::fs::create_dir_all(dir).map_err(forage_host::HostError::from)?;
    let web_sql = SqliteWebSql::open_dir(dir.join(WEBSQL_DIR))?;
    let local_storage = FileLocalStorage::open(dir.join(LOCAL_STORAGE_FILE))?;
    tracing::debug!(dir = %dir.display(), "opened host storage");

    Ok(HostEnvironment::empty()
        .with_web_sql(Arc::new(web_sql))
        .with_local_storage(Arc::new(local_storage)))
}
