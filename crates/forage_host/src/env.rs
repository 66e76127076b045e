//! The host environment an instance runs in.

use crate::indexeddb::{IndexedDb, MemoryIndexedDb};
use crate::local_storage::{LocalStorage, MemoryLocalStorage};
use crate::websql::{SqliteWebSql, WebSql};
use std::sync::Arc;

/// User agent reported by [`HostEnvironment::in_memory`].
pub const DEFAULT_USER_AGENT: &str = "forage";

/// The storage APIs and navigator facts a host exposes.
///
/// Any API may be absent. Cloning is cheap: clones share the same host
/// handles, so instances created from clones see the same data.
///
/// # Example
///
/// ```
/// use forage_host::{HostEnvironment, MemoryLocalStorage};
/// use std::sync::Arc;
///
/// let env = HostEnvironment::empty()
///     .with_local_storage(Arc::new(MemoryLocalStorage::new()));
/// assert!(env.indexed_db.is_none());
/// assert!(env.local_storage.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    /// IndexedDB-like API, if present.
    pub indexed_db: Option<Arc<dyn IndexedDb>>,
    /// WebSQL-like API, if present.
    pub web_sql: Option<Arc<dyn WebSql>>,
    /// localStorage-like API, if present.
    pub local_storage: Option<Arc<dyn LocalStorage>>,
    /// Navigator user agent string.
    pub user_agent: String,
    /// Navigator platform string.
    pub platform: String,
    /// Whether the host exposes `IDBKeyRange`.
    pub has_idb_key_range: bool,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self::empty()
    }
}

impl HostEnvironment {
    /// A host with no storage APIs at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            indexed_db: None,
            web_sql: None,
            local_storage: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            platform: String::new(),
            has_idb_key_range: true,
        }
    }

    /// A host with all three APIs, each backed by memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::empty()
            .with_indexed_db(Arc::new(MemoryIndexedDb::new()))
            .with_web_sql(Arc::new(SqliteWebSql::in_memory()))
            .with_local_storage(Arc::new(MemoryLocalStorage::new()))
    }

    /// Sets the IndexedDB API.
    #[must_use]
    pub fn with_indexed_db(mut self, api: Arc<dyn IndexedDb>) -> Self {
        self.indexed_db = Some(api);
        self
    }

    /// Sets the WebSQL API.
    #[must_use]
    pub fn with_web_sql(mut self, api: Arc<dyn WebSql>) -> Self {
        self.web_sql = Some(api);
        self
    }

    /// Sets the localStorage API.
    #[must_use]
    pub fn with_local_storage(mut self, api: Arc<dyn LocalStorage>) -> Self {
        self.local_storage = Some(api);
        self
    }

    /// Sets the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the platform string.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Sets whether `IDBKeyRange` is available.
    #[must_use]
    pub fn with_idb_key_range(mut self, present: bool) -> Self {
        self.has_idb_key_range = present;
        self
    }
}
