//! In-process memory driver.
//!
//! Needs no host API, so it is always supported. Data lives as long as the
//! driver and is shared by every instance that selects it through the same
//! registry.

use super::MEMORY;
use crate::driver::{
    visit_entries, Driver, DriverContext, DriverKind, DropScope, Storage, Visitor,
};
use crate::error::ForageResult;
use async_trait::async_trait;
use forage_codec::{from_cbor, to_cbor, Value};
use forage_host::HostEnvironment;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type Records = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct Repository {
    databases: RwLock<HashMap<String, HashMap<String, Records>>>,
}

/// The memory driver.
#[derive(Debug, Default, Clone)]
pub struct MemoryDriver {
    repository: Arc<Repository>,
}

impl MemoryDriver {
    /// Creates a driver with an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        MEMORY
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Memory
    }

    fn is_supported(&self, _env: &HostEnvironment) -> bool {
        true
    }

    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        let storage = MemoryStorage {
            repository: Arc::clone(&self.repository),
            db: ctx.config.name.clone(),
            store: ctx.config.store_name.clone(),
        };
        storage.with_records_mut(|_| ());
        Ok(Arc::new(storage))
    }
}

struct MemoryStorage {
    repository: Arc<Repository>,
    db: String,
    store: String,
}

impl MemoryStorage {
    fn with_records<R>(&self, f: impl FnOnce(Option<&Records>) -> R) -> R {
        let databases = self.repository.databases.read();
        f(databases.get(&self.db).and_then(|db| db.get(&self.store)))
    }

    /// Recreates the store if it was dropped.
    fn with_records_mut<R>(&self, f: impl FnOnce(&mut Records) -> R) -> R {
        let mut databases = self.repository.databases.write();
        let records = databases
            .entry(self.db.clone())
            .or_default()
            .entry(self.store.clone())
            .or_default();
        f(records)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>> {
        let bytes = self.with_records(|records| records.and_then(|r| r.get(key).cloned()));
        match bytes {
            Some(bytes) => Ok(Some(from_cbor(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value> {
        let bytes = to_cbor(&value)?;
        self.with_records_mut(|records| records.insert(key.to_string(), bytes));
        Ok(value)
    }

    async fn remove_item(&self, key: &str) -> ForageResult<()> {
        self.with_records_mut(|records| records.remove(key));
        Ok(())
    }

    async fn clear(&self) -> ForageResult<()> {
        self.with_records_mut(BTreeMap::clear);
        Ok(())
    }

    async fn length(&self) -> ForageResult<usize> {
        Ok(self.with_records(|records| records.map_or(0, BTreeMap::len)))
    }

    async fn key(&self, index: usize) -> ForageResult<Option<String>> {
        Ok(self.with_records(|records| records.and_then(|r| r.keys().nth(index).cloned())))
    }

    async fn keys(&self) -> ForageResult<Vec<String>> {
        Ok(self.with_records(|records| {
            records.map_or_else(Vec::new, |r| r.keys().cloned().collect())
        }))
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>> {
        // Snapshot first so the visitor runs without the lock held.
        let snapshot = self.with_records(|records| records.cloned().unwrap_or_default());
        let mut entries = Vec::with_capacity(snapshot.len());
        for (key, bytes) in snapshot {
            entries.push((key, from_cbor(&bytes)?));
        }
        Ok(visit_entries(entries, visitor))
    }

    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()> {
        let mut databases = self.repository.databases.write();
        match scope {
            DropScope::Database { name } => {
                databases.remove(name);
            }
            DropScope::Store { name, store_name } => {
                if let Some(db) = databases.get_mut(name) {
                    db.remove(store_name);
                    if db.is_empty() {
                        databases.remove(name);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn storage(driver: &MemoryDriver, config: Config) -> Arc<dyn Storage> {
        let ctx = DriverContext {
            config,
            env: HostEnvironment::empty(),
        };
        driver.init_storage(&ctx).await.unwrap()
    }

    #[test]
    fn always_supported() {
        assert!(MemoryDriver::new().is_supported(&HostEnvironment::empty()));
    }

    #[tokio::test]
    async fn instances_share_the_repository() {
        let driver = MemoryDriver::new();
        let a = storage(&driver, Config::new()).await;
        let b = storage(&driver, Config::new()).await;

        a.set_item("k", Value::from("v")).await.unwrap();
        assert_eq!(b.get_item("k").await.unwrap(), Some(Value::from("v")));

        let other = storage(&MemoryDriver::new(), Config::new()).await;
        assert_eq!(other.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_are_ordered() {
        let driver = MemoryDriver::new();
        let s = storage(&driver, Config::new()).await;
        for key in ["c", "a", "b"] {
            s.set_item(key, Value::Null).await.unwrap();
        }
        assert_eq!(s.keys().await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(s.key(0).await.unwrap(), Some("a".to_string()));
        assert_eq!(s.key(3).await.unwrap(), None);
        assert_eq!(s.length().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn iterate_visits_every_entry() {
        let driver = MemoryDriver::new();
        let s = storage(&driver, Config::new()).await;
        s.set_item("a", Value::Integer(1)).await.unwrap();

        let mut count = 0;
        let mut visitor = |_: &Value, _: &str, _: u32| -> Option<Value> {
            count += 1;
            None
        };
        assert_eq!(s.iterate(&mut visitor).await.unwrap(), None);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn drop_scopes() {
        let driver = MemoryDriver::new();
        let one = storage(&driver, Config::new().name("db").store_name("one")).await;
        let two = storage(&driver, Config::new().name("db").store_name("two")).await;
        one.set_item("k", Value::Null).await.unwrap();
        two.set_item("k", Value::Null).await.unwrap();

        one.drop_instance(&DropScope::Store {
            name: "db".into(),
            store_name: "one".into(),
        })
        .await
        .unwrap();
        assert_eq!(one.length().await.unwrap(), 0);
        assert_eq!(two.length().await.unwrap(), 1);

        two.drop_instance(&DropScope::Database { name: "db".into() })
            .await
            .unwrap();
        assert_eq!(two.length().await.unwrap(), 0);
    }
}
