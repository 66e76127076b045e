//! localStorage driver.
//!
//! The whole host area is shared, so every key is written under the prefix
//! `name/store_name/`. Values are written as serialized strings.

use super::LOCALSTORAGE;
use crate::config::Config;
use crate::driver::{
    visit_entries, Driver, DriverContext, DriverKind, DropScope, Storage, Visitor,
};
use crate::error::ForageResult;
use async_trait::async_trait;
use forage_codec::{deserialize, serialize, Value};
use forage_host::{is_local_storage_valid, HostEnvironment, HostError, LocalStorage};
use std::sync::Arc;

const SUPPORT_TEST_KEY: &str = "_localforage_support_test";

/// The localStorage driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageDriver;

/// Key prefix for one store.
fn key_prefix(name: &str, store_name: &str) -> String {
    format!("{name}/{store_name}/")
}

#[async_trait]
impl Driver for LocalStorageDriver {
    fn name(&self) -> &str {
        LOCALSTORAGE
    }

    fn kind(&self) -> DriverKind {
        DriverKind::LocalStorage
    }

    fn is_supported(&self, env: &HostEnvironment) -> bool {
        is_local_storage_valid(env)
    }

    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        let area = ctx
            .env
            .local_storage
            .clone()
            .ok_or_else(|| HostError::InvalidState("localStorage is not available".into()))?;

        // An area that reads fine may still refuse writes.
        area.set_item(SUPPORT_TEST_KEY, "true")?;
        area.remove_item(SUPPORT_TEST_KEY)?;

        Ok(Arc::new(LocalStorageArea::new(area, &ctx.config)))
    }
}

struct LocalStorageArea {
    area: Arc<dyn LocalStorage>,
    prefix: String,
}

impl LocalStorageArea {
    fn new(area: Arc<dyn LocalStorage>, config: &Config) -> Self {
        Self {
            area,
            prefix: key_prefix(&config.name, &config.store_name),
        }
    }

    /// Full host keys starting with `prefix`, in host order.
    fn host_keys(&self, prefix: &str) -> ForageResult<Vec<String>> {
        let mut keys = Vec::new();
        for index in 0..self.area.length()? {
            if let Some(key) = self.area.key(index)? {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    fn remove_prefixed(&self, prefix: &str) -> ForageResult<()> {
        for key in self.host_keys(prefix)?.iter().rev() {
            self.area.remove_item(key)?;
        }
        Ok(())
    }

    fn read(&self, host_key: &str) -> ForageResult<Option<Value>> {
        match self.area.get_item(host_key)? {
            Some(text) => Ok(Some(deserialize(&text)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Storage for LocalStorageArea {
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>> {
        self.read(&format!("{}{key}", self.prefix))
    }

    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value> {
        let text = serialize(&value)?;
        self.area.set_item(&format!("{}{key}", self.prefix), &text)?;
        Ok(value)
    }

    async fn remove_item(&self, key: &str) -> ForageResult<()> {
        Ok(self.area.remove_item(&format!("{}{key}", self.prefix))?)
    }

    async fn clear(&self) -> ForageResult<()> {
        self.remove_prefixed(&self.prefix)
    }

    async fn length(&self) -> ForageResult<usize> {
        Ok(self.host_keys(&self.prefix)?.len())
    }

    async fn key(&self, index: usize) -> ForageResult<Option<String>> {
        Ok(self.keys().await?.into_iter().nth(index))
    }

    async fn keys(&self) -> ForageResult<Vec<String>> {
        let keys = self.host_keys(&self.prefix)?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(self.prefix.as_str()))
            .map(str::to_string)
            .collect())
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>> {
        let mut entries = Vec::new();
        for host_key in self.host_keys(&self.prefix)? {
            // Removed between listing and reading.
            let Some(value) = self.read(&host_key)? else {
                continue;
            };
            let key = host_key[self.prefix.len()..].to_string();
            entries.push((key, value));
        }
        Ok(visit_entries(entries, visitor))
    }

    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()> {
        let prefix = match scope {
            DropScope::Database { name } => format!("{name}/"),
            DropScope::Store { name, store_name } => key_prefix(name, store_name),
        };
        tracing::debug!(%prefix, "removing localStorage keys");
        self.remove_prefixed(&prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForageError;
    use forage_codec::Binary;
    use forage_host::MemoryLocalStorage;

    async fn storage(area: Arc<MemoryLocalStorage>, config: Config) -> Arc<dyn Storage> {
        let ctx = DriverContext {
            config,
            env: HostEnvironment::empty().with_local_storage(area),
        };
        LocalStorageDriver.init_storage(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn keys_are_prefixed_in_the_area() {
        let area = Arc::new(MemoryLocalStorage::new());
        let storage = storage(area.clone(), Config::new().name("db").store_name("s")).await;
        storage.set_item("k", Value::from("v")).await.unwrap();

        let snapshot = area.snapshot();
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["db/s/k"]);
        assert_eq!(storage.keys().await.unwrap(), vec!["k"]);
        assert_eq!(storage.get_item("k").await.unwrap(), Some(Value::from("v")));
    }

    #[tokio::test]
    async fn stores_are_isolated() {
        let area = Arc::new(MemoryLocalStorage::new());
        let one = storage(area.clone(), Config::new().name("db").store_name("one")).await;
        let two = storage(area.clone(), Config::new().name("db").store_name("two")).await;
        one.set_item("a", Value::Integer(1)).await.unwrap();
        two.set_item("a", Value::Integer(2)).await.unwrap();
        area.set_item("foreign", "x").unwrap();

        one.clear().await.unwrap();
        assert_eq!(one.length().await.unwrap(), 0);
        assert_eq!(two.get_item("a").await.unwrap(), Some(Value::Integer(2)));
        assert_eq!(area.get_item("foreign").unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn binary_values_are_serialized() {
        let area = Arc::new(MemoryLocalStorage::new());
        let storage = storage(area.clone(), Config::new()).await;
        let value = Value::Binary(Binary::blob("text/plain", b"hi".to_vec()));
        storage.set_item("b", value.clone()).await.unwrap();

        assert_eq!(storage.get_item("b").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn drop_database_spares_other_databases() {
        let area = Arc::new(MemoryLocalStorage::new());
        let a = storage(area.clone(), Config::new().name("a").store_name("s")).await;
        let ab = storage(area.clone(), Config::new().name("ab").store_name("s")).await;
        a.set_item("k", Value::Null).await.unwrap();
        ab.set_item("k", Value::Null).await.unwrap();

        a.drop_instance(&DropScope::Database { name: "a".into() })
            .await
            .unwrap();
        assert_eq!(a.length().await.unwrap(), 0);
        assert_eq!(ab.length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn full_area_rejects_writes() {
        let area = Arc::new(MemoryLocalStorage::with_quota(64));
        let storage = storage(area, Config::new()).await;
        let err = storage
            .set_item("big", Value::from("x".repeat(128)))
            .await
            .unwrap_err();
        assert!(matches!(err, ForageError::Host(HostError::QuotaExceeded(_))));
    }

    #[tokio::test]
    async fn blocked_area_fails_init() {
        let ctx = DriverContext {
            config: Config::new(),
            env: HostEnvironment::empty().with_local_storage(Arc::new(MemoryLocalStorage::blocked())),
        };
        let err = LocalStorageDriver.init_storage(&ctx).await.err().unwrap();
        assert!(matches!(err, ForageError::Host(HostError::SecurityError(_))));
    }
}
