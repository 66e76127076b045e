//! IndexedDB-like host API.
//!
//! A host database is a named, versioned set of object stores. Each object
//! store maps string keys to opaque byte records and enumerates them in key
//! order. Stores can only be created while a database is being upgraded,
//! which happens when it is opened with a version higher than the stored one.

use crate::error::{HostError, HostResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Parameters for opening a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenRequest {
    /// Database name.
    pub name: String,
    /// Requested version. `None` opens the current version, creating the
    /// database at version 1 if it does not exist.
    pub version: Option<u32>,
    /// Object stores to create if this open performs an upgrade.
    pub create_stores: Vec<String>,
}

impl OpenRequest {
    /// Opens `name` at its current version.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Requests a specific version.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Creates `store` during the upgrade, if one happens.
    #[must_use]
    pub fn create_store(mut self, store: impl Into<String>) -> Self {
        self.create_stores.push(store.into());
        self
    }
}

/// Shape of a database after it has been opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Version the database is now at.
    pub version: u32,
    /// Object stores, in name order.
    pub stores: Vec<String>,
}

impl DatabaseInfo {
    /// Returns true if the database has an object store called `store`.
    #[must_use]
    pub fn has_store(&self, store: &str) -> bool {
        self.stores.iter().any(|s| s == store)
    }
}

/// An IndexedDB-like host API.
///
/// Every record operation fails with [`HostError::NotFound`] when the
/// database or object store does not exist.
#[async_trait]
pub trait IndexedDb: Send + Sync + Debug {
    /// Opens (and possibly creates or upgrades) a database.
    ///
    /// Fails with [`HostError::VersionError`] if the requested version is
    /// lower than the stored one.
    async fn open(&self, request: OpenRequest) -> HostResult<DatabaseInfo>;

    /// Reads one record.
    async fn get(&self, db: &str, store: &str, key: &str) -> HostResult<Option<Vec<u8>>>;

    /// Writes one record, replacing any existing value.
    async fn put(&self, db: &str, store: &str, key: &str, value: Vec<u8>) -> HostResult<()>;

    /// Deletes one record. Deleting a missing key succeeds.
    async fn delete(&self, db: &str, store: &str, key: &str) -> HostResult<()>;

    /// Deletes every record in a store.
    async fn clear(&self, db: &str, store: &str) -> HostResult<()>;

    /// Counts the records in a store.
    async fn count(&self, db: &str, store: &str) -> HostResult<usize>;

    /// Lists keys in key order.
    async fn keys(&self, db: &str, store: &str) -> HostResult<Vec<String>>;

    /// Lists records in key order.
    async fn entries(&self, db: &str, store: &str) -> HostResult<Vec<(String, Vec<u8>)>>;

    /// Deletes a whole database. Deleting a missing database succeeds.
    async fn delete_database(&self, db: &str) -> HostResult<()>;

    /// Deletes one object store, upgrading the database to do so.
    ///
    /// Returns the database version after the upgrade.
    async fn delete_object_store(&self, db: &str, store: &str) -> HostResult<u32>;
}

#[derive(Debug, Default)]
struct Database {
    version: u32,
    stores: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl Database {
    fn info(&self, name: &str) -> DatabaseInfo {
        DatabaseInfo {
            name: name.to_string(),
            version: self.version,
            stores: self.stores.keys().cloned().collect(),
        }
    }
}

/// An in-memory IndexedDB host.
///
/// Suitable for tests and for embedding Forage in a process without a
/// browser. A failing host can be built with [`MemoryIndexedDb::failing`]
/// to simulate an IndexedDB that is present but refuses to open.
#[derive(Debug, Default)]
pub struct MemoryIndexedDb {
    databases: RwLock<BTreeMap<String, Database>>,
    open_failure: Option<String>,
}

impl MemoryIndexedDb {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host whose `open` always fails with `InvalidState`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            databases: RwLock::default(),
            open_failure: Some(message.into()),
        }
    }

    /// Returns the names of all databases.
    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        self.databases.read().keys().cloned().collect()
    }

    fn with_store<T>(
        &self,
        db: &str,
        store: &str,
        f: impl FnOnce(&BTreeMap<String, Vec<u8>>) -> T,
    ) -> HostResult<T> {
        let databases = self.databases.read();
        let records = databases
            .get(db)
            .ok_or_else(|| HostError::NotFound(format!("database {db}")))?
            .stores
            .get(store)
            .ok_or_else(|| HostError::NotFound(format!("object store {store} in {db}")))?;
        Ok(f(records))
    }

    fn with_store_mut<T>(
        &self,
        db: &str,
        store: &str,
        f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> T,
    ) -> HostResult<T> {
        let mut databases = self.databases.write();
        let records = databases
            .get_mut(db)
            .ok_or_else(|| HostError::NotFound(format!("database {db}")))?
            .stores
            .get_mut(store)
            .ok_or_else(|| HostError::NotFound(format!("object store {store} in {db}")))?;
        Ok(f(records))
    }
}

#[async_trait]
impl IndexedDb for MemoryIndexedDb {
    async fn open(&self, request: OpenRequest) -> HostResult<DatabaseInfo> {
        if let Some(message) = &self.open_failure {
            return Err(HostError::InvalidState(message.clone()));
        }
        if request.version == Some(0) {
            return Err(HostError::VersionError("version must be at least 1".into()));
        }

        let mut databases = self.databases.write();
        let database = databases.entry(request.name.clone()).or_default();
        let current = database.version;
        let target = request.version.unwrap_or(current.max(1));

        if target < current {
            return Err(HostError::VersionError(format!(
                "requested version {target} is lower than stored version {current}"
            )));
        }
        if target > current {
            tracing::debug!(db = %request.name, from = current, to = target, "upgrading database");
            database.version = target;
            for store in request.create_stores {
                database.stores.entry(store).or_default();
            }
        }

        Ok(database.info(&request.name))
    }

    async fn get(&self, db: &str, store: &str, key: &str) -> HostResult<Option<Vec<u8>>> {
        self.with_store(db, store, |records| records.get(key).cloned())
    }

    async fn put(&self, db: &str, store: &str, key: &str, value: Vec<u8>) -> HostResult<()> {
        self.with_store_mut(db, store, |records| {
            records.insert(key.to_string(), value);
        })
    }

    async fn delete(&self, db: &str, store: &str, key: &str) -> HostResult<()> {
        self.with_store_mut(db, store, |records| {
            records.remove(key);
        })
    }

    async fn clear(&self, db: &str, store: &str) -> HostResult<()> {
        self.with_store_mut(db, store, BTreeMap::clear)
    }

    async fn count(&self, db: &str, store: &str) -> HostResult<usize> {
        self.with_store(db, store, BTreeMap::len)
    }

    async fn keys(&self, db: &str, store: &str) -> HostResult<Vec<String>> {
        self.with_store(db, store, |records| records.keys().cloned().collect())
    }

    async fn entries(&self, db: &str, store: &str) -> HostResult<Vec<(String, Vec<u8>)>> {
        self.with_store(db, store, |records| {
            records
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    async fn delete_database(&self, db: &str) -> HostResult<()> {
        self.databases.write().remove(db);
        Ok(())
    }

    async fn delete_object_store(&self, db: &str, store: &str) -> HostResult<u32> {
        let mut databases = self.databases.write();
        let database = databases
            .get_mut(db)
            .ok_or_else(|| HostError::NotFound(format!("database {db}")))?;
        if database.stores.remove(store).is_none() {
            return Err(HostError::NotFound(format!("object store {store} in {db}")));
        }
        database.version += 1;
        Ok(database.version)
    }
}
