//! Test fixtures: host environments, instances and custom drivers.
//!
//! Provides convenience functions for setting up storage instances
//! and drivers with controllable behavior.

use async_trait::async_trait;
use forage_codec::Value;
use forage_core::{
    Config, Driver, DriverContext, DriverRegistry, DriverTable, DropScope, ForageError,
    ForageResult, LocalForage, Storage, Visitor,
};
use forage_host::{FileLocalStorage, HostEnvironment, MemoryLocalStorage, SqliteWebSql};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Name of the map-backed custom driver.
pub const MEMDRIVER: &str = "MEMDRIVER";

/// Name of the driver whose init hook always fails.
pub const FAULTY_DRIVER: &str = "FAULTYDRIVER";

/// Name of the driver whose init hook waits for a signal.
pub const SLOW_DRIVER: &str = "SLOWDRIVER";

/// A registry holding only the built-in drivers, isolated from the
/// process-wide one.
pub fn fresh_registry() -> Arc<DriverRegistry> {
    Arc::new(DriverRegistry::new())
}

/// A host whose only storage API is a memory localStorage area.
pub fn local_storage_host() -> (HostEnvironment, Arc<MemoryLocalStorage>) {
    let area = Arc::new(MemoryLocalStorage::new());
    let env = HostEnvironment::empty().with_local_storage(area.clone());
    (env, area)
}

/// Creates an instance over `env` with a fresh registry.
pub fn instance(env: HostEnvironment, config: Config) -> LocalForage {
    instance_with(env, fresh_registry(), config)
}

/// Creates an instance over `env` selecting from `registry`.
pub fn instance_with(
    env: HostEnvironment,
    registry: Arc<DriverRegistry>,
    config: Config,
) -> LocalForage {
    LocalForage::with_registry(env, registry, config).expect("Invalid test configuration")
}

/// An instance pinned to one driver of a fresh in-memory host.
pub fn instance_for(driver: &str) -> LocalForage {
    instance(HostEnvironment::in_memory(), Config::new().driver_order([driver]))
}

/// A host persisted under a temporary directory.
///
/// WebSQL databases live under `websql/` and the localStorage area in
/// `localStorage.json`. The directory is removed on drop.
pub struct DiskHost {
    /// The host environment.
    pub env: HostEnvironment,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: TempDir,
}

impl DiskHost {
    /// Creates an empty on-disk host.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let env = Self::open(dir.path());
        Self { env, dir }
    }

    /// Opens a second host over the same files.
    pub fn reopen(&self) -> HostEnvironment {
        Self::open(self.dir.path())
    }

    /// The directory holding the host's files.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn open(dir: &Path) -> HostEnvironment {
        let web_sql =
            SqliteWebSql::open_dir(dir.join("websql")).expect("Failed to open WebSQL directory");
        let local_storage = FileLocalStorage::open(dir.join("localStorage.json"))
            .expect("Failed to open localStorage file");
        HostEnvironment::empty()
            .with_web_sql(Arc::new(web_sql))
            .with_local_storage(Arc::new(local_storage))
    }
}

impl Default for DiskHost {
    fn default() -> Self {
        Self::new()
    }
}

type Records = BTreeMap<String, Value>;
type Stores = Arc<Mutex<HashMap<(String, String), Records>>>;

/// A custom driver keeping values in a map, keyed by database and store.
///
/// Always supported. Counts how often its init hook runs.
#[derive(Debug, Clone)]
pub struct MapDriver {
    name: String,
    stores: Stores,
    inits: Arc<AtomicUsize>,
}

impl MapDriver {
    /// Creates the [`MEMDRIVER`] driver.
    pub fn new() -> Self {
        Self::named(MEMDRIVER)
    }

    /// Creates a map driver registered under `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stores: Arc::default(),
            inits: Arc::default(),
        }
    }

    /// How many times the init hook has run.
    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// A copy of one store's contents.
    pub fn snapshot(&self, name: &str, store_name: &str) -> Records {
        self.stores
            .lock()
            .get(&(name.to_string(), store_name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn storage(&self, config: &Config) -> MapStorage {
        MapStorage {
            stores: Arc::clone(&self.stores),
            id: (config.name.clone(), config.store_name.clone()),
        }
    }
}

impl Default for MapDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MapDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self, _env: &HostEnvironment) -> bool {
        true
    }

    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.storage(&ctx.config)))
    }
}

struct MapStorage {
    stores: Stores,
    id: (String, String),
}

impl MapStorage {
    fn with<R>(&self, f: impl FnOnce(&mut Records) -> R) -> R {
        f(self.stores.lock().entry(self.id.clone()).or_default())
    }
}

#[async_trait]
impl Storage for MapStorage {
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>> {
        Ok(self.with(|records| records.get(key).cloned()))
    }

    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value> {
        self.with(|records| records.insert(key.to_string(), value.clone()));
        Ok(value)
    }

    async fn remove_item(&self, key: &str) -> ForageResult<()> {
        self.with(|records| records.remove(key));
        Ok(())
    }

    async fn clear(&self) -> ForageResult<()> {
        self.with(BTreeMap::clear);
        Ok(())
    }

    async fn length(&self) -> ForageResult<usize> {
        Ok(self.with(|records| records.len()))
    }

    async fn key(&self, index: usize) -> ForageResult<Option<String>> {
        Ok(self.with(|records| records.keys().nth(index).cloned()))
    }

    async fn keys(&self) -> ForageResult<Vec<String>> {
        Ok(self.with(|records| records.keys().cloned().collect()))
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>> {
        let entries = self.with(|records| records.clone());
        Ok(entries
            .into_iter()
            .zip(1u32..)
            .find_map(|((key, value), n)| visitor(&value, &key, n)))
    }

    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()> {
        let mut stores = self.stores.lock();
        match scope {
            DropScope::Database { name } => stores.retain(|(db, _), _| db != name),
            DropScope::Store { name, store_name } => {
                stores.remove(&(name.clone(), store_name.clone()));
            }
        }
        Ok(())
    }
}

/// The [`MEMDRIVER`] driver assembled as a handler table.
///
/// Values live in `map` under `name/store_name/key`.
pub fn memdriver_table(map: Arc<Mutex<BTreeMap<String, Value>>>) -> DriverTable {
    fn prefix(config: &Config) -> String {
        format!("{}/{}/", config.name, config.store_name)
    }

    fn entries(map: &Mutex<BTreeMap<String, Value>>, prefix: &str) -> Vec<(String, Value)> {
        map.lock()
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix).map(|k| (k.to_string(), v.clone())))
            .collect()
    }

    let get = Arc::clone(&map);
    let set = Arc::clone(&map);
    let remove = Arc::clone(&map);
    let clear = Arc::clone(&map);
    let length = Arc::clone(&map);
    let key = Arc::clone(&map);
    let keys = Arc::clone(&map);
    let iterate = Arc::clone(&map);
    let dropped = map;

    DriverTable::new(MEMDRIVER)
        .support(|_| true)
        .get_item(move |config, k| {
            let value = get.lock().get(&format!("{}{k}", prefix(config))).cloned();
            async move { Ok(value) }
        })
        .set_item(move |config, (k, value)| {
            set.lock().insert(format!("{}{k}", prefix(config)), value.clone());
            async move { Ok(value) }
        })
        .remove_item(move |config, k| {
            remove.lock().remove(&format!("{}{k}", prefix(config)));
            async { Ok(()) }
        })
        .clear(move |config| {
            let p = prefix(config);
            clear.lock().retain(|k, _| !k.starts_with(&p));
            async { Ok(()) }
        })
        .length(move |config| {
            let n = entries(&length, &prefix(config)).len();
            async move { Ok(n) }
        })
        .key(move |config, index| {
            let k = entries(&key, &prefix(config))
                .into_iter()
                .nth(index)
                .map(|(k, _)| k);
            async move { Ok(k) }
        })
        .keys(move |config| {
            let list = entries(&keys, &prefix(config))
                .into_iter()
                .map(|(k, _)| k)
                .collect();
            async move { Ok(list) }
        })
        .iterate(move |config| {
            let list = entries(&iterate, &prefix(config));
            async move { Ok(list) }
        })
        .drop_instance(move |_, scope| {
            let p = match scope {
                DropScope::Database { name } => format!("{name}/"),
                DropScope::Store { name, store_name } => format!("{name}/{store_name}/"),
            };
            dropped.lock().retain(|k, _| !k.starts_with(&p));
            async { Ok(()) }
        })
}

/// A supported driver whose init hook always fails.
#[derive(Debug, Clone)]
pub struct FaultyDriver {
    message: String,
}

impl FaultyDriver {
    /// Creates a driver failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error its init hook fails with.
    pub fn error(&self) -> ForageError {
        ForageError::driver(self.message.clone())
    }
}

#[async_trait]
impl Driver for FaultyDriver {
    fn name(&self) -> &str {
        FAULTY_DRIVER
    }

    fn is_supported(&self, _env: &HostEnvironment) -> bool {
        true
    }

    async fn init_storage(&self, _ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        Err(self.error())
    }
}

/// A map driver whose init hook, and optionally each write, waits for a
/// signal.
#[derive(Debug, Clone)]
pub struct SlowDriver {
    inner: MapDriver,
    init: Arc<Notify>,
    writes: Option<Arc<Notify>>,
}

impl SlowDriver {
    /// Creates a driver whose init waits for [`SlowDriver::release_init`].
    pub fn new() -> Self {
        Self {
            inner: MapDriver::named(SLOW_DRIVER),
            init: Arc::new(Notify::new()),
            writes: None,
        }
    }

    /// Makes every `set_item` wait for [`SlowDriver::release_write`].
    #[must_use]
    pub fn hold_writes(mut self) -> Self {
        self.writes = Some(Arc::new(Notify::new()));
        self
    }

    /// Lets one pending (or the next) init hook finish.
    pub fn release_init(&self) {
        self.init.notify_one();
    }

    /// Lets one pending (or the next) write finish.
    pub fn release_write(&self) {
        if let Some(writes) = &self.writes {
            writes.notify_one();
        }
    }

    /// The underlying map driver.
    pub fn map(&self) -> &MapDriver {
        &self.inner
    }
}

impl Default for SlowDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for SlowDriver {
    fn name(&self) -> &str {
        SLOW_DRIVER
    }

    fn is_supported(&self, _env: &HostEnvironment) -> bool {
        true
    }

    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        self.init.notified().await;
        self.inner.inits.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SlowStorage {
            inner: self.inner.storage(&ctx.config),
            writes: self.writes.clone(),
        }))
    }
}

struct SlowStorage {
    inner: MapStorage,
    writes: Option<Arc<Notify>>,
}

#[async_trait]
impl Storage for SlowStorage {
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value> {
        if let Some(writes) = &self.writes {
            writes.notified().await;
        }
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> ForageResult<()> {
        self.inner.remove_item(key).await
    }

    async fn clear(&self) -> ForageResult<()> {
        self.inner.clear().await
    }

    async fn length(&self) -> ForageResult<usize> {
        self.inner.length().await
    }

    async fn key(&self, index: usize) -> ForageResult<Option<String>> {
        self.inner.key(index).await
    }

    async fn keys(&self) -> ForageResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>> {
        self.inner.iterate(visitor).await
    }

    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()> {
        self.inner.drop_instance(scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forage_core::{LOCALSTORAGE, WEBSQL};

    #[tokio::test]
    async fn map_driver_counts_inits() {
        let driver = MapDriver::new();
        let registry = fresh_registry();
        registry.define_driver(Arc::new(driver.clone())).unwrap();

        let forage = instance_with(
            HostEnvironment::empty(),
            registry,
            Config::new().driver_order([MEMDRIVER]),
        );
        forage.set_item("k", 1).await.unwrap();
        assert_eq!(driver.init_count(), 1);
        assert_eq!(
            driver.snapshot("localforage", "keyvaluepairs").get("k"),
            Some(&Value::from(1))
        );
    }

    #[tokio::test]
    async fn disk_host_persists_across_reopen() {
        let host = DiskHost::new();
        for driver in [WEBSQL, LOCALSTORAGE] {
            let forage = instance(host.env.clone(), Config::new().driver_order([driver]));
            forage.set_item("k", driver).await.unwrap();
        }

        for driver in [WEBSQL, LOCALSTORAGE] {
            let forage = instance(host.reopen(), Config::new().driver_order([driver]));
            assert_eq!(
                forage.get_item("k").await.unwrap(),
                Some(Value::from(driver))
            );
        }
        assert!(host.path().join("localStorage.json").exists());
    }
}
