//! IndexedDB driver.
//!
//! Each instance owns the object store `store_name` in database `name`.
//! Values are stored as structured clones.

use super::INDEXEDDB;
use crate::driver::{
    visit_entries, Driver, DriverContext, DriverKind, DropScope, Storage, Visitor,
};
use crate::error::{ForageError, ForageResult};
use async_trait::async_trait;
use forage_codec::{from_cbor, to_cbor, Value};
use forage_host::{is_indexed_db_valid, HostEnvironment, HostError, IndexedDb, OpenRequest};
use std::sync::Arc;

/// The IndexedDB driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexedDbDriver;

/// IndexedDB versions are integers; fractional versions are truncated.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn database_version(version: f64) -> u32 {
    (version.trunc() as u32).max(1)
}

#[async_trait]
impl Driver for IndexedDbDriver {
    fn name(&self) -> &str {
        INDEXEDDB
    }

    fn kind(&self) -> DriverKind {
        DriverKind::IndexedDb
    }

    fn is_supported(&self, env: &HostEnvironment) -> bool {
        is_indexed_db_valid(env)
    }

    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        let api = ctx
            .env
            .indexed_db
            .clone()
            .ok_or_else(|| HostError::InvalidState("IndexedDB is not available".into()))?;
        let config = &ctx.config;

        let info = api.open(OpenRequest::new(&config.name)).await?;
        let wanted = database_version(config.version);
        if wanted < info.version {
            tracing::warn!(
                db = %config.name,
                stored = info.version,
                requested = wanted,
                "database cannot be downgraded; using stored version"
            );
        }

        if !info.has_store(&config.store_name) || wanted > info.version {
            let version = if info.has_store(&config.store_name) {
                wanted
            } else {
                wanted.max(info.version + 1)
            };
            api.open(
                OpenRequest::new(&config.name)
                    .version(version)
                    .create_store(&config.store_name),
            )
            .await?;
        }

        Ok(Arc::new(IndexedDbStorage {
            api,
            db: config.name.clone(),
            store: config.store_name.clone(),
        }))
    }
}

struct IndexedDbStorage {
    api: Arc<dyn IndexedDb>,
    db: String,
    store: String,
}

#[async_trait]
impl Storage for IndexedDbStorage {
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>> {
        match self.api.get(&self.db, &self.store, key).await? {
            Some(bytes) => Ok(Some(from_cbor(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value> {
        let bytes = to_cbor(&value)?;
        self.api.put(&self.db, &self.store, key, bytes).await?;
        Ok(value)
    }

    async fn remove_item(&self, key: &str) -> ForageResult<()> {
        Ok(self.api.delete(&self.db, &self.store, key).await?)
    }

    async fn clear(&self) -> ForageResult<()> {
        Ok(self.api.clear(&self.db, &self.store).await?)
    }

    async fn length(&self) -> ForageResult<usize> {
        Ok(self.api.count(&self.db, &self.store).await?)
    }

    async fn key(&self, index: usize) -> ForageResult<Option<String>> {
        Ok(self.keys().await?.into_iter().nth(index))
    }

    async fn keys(&self) -> ForageResult<Vec<String>> {
        Ok(self.api.keys(&self.db, &self.store).await?)
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>> {
        let mut entries = Vec::new();
        for (key, bytes) in self.api.entries(&self.db, &self.store).await? {
            entries.push((key, from_cbor(&bytes)?));
        }
        Ok(visit_entries(entries, visitor))
    }

    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()> {
        let result = match scope {
            DropScope::Database { name } => self.api.delete_database(name).await,
            DropScope::Store { name, store_name } => self
                .api
                .delete_object_store(name, store_name)
                .await
                .map(|_| ()),
        };
        match result {
            Ok(()) | Err(HostError::NotFound(_)) => Ok(()),
            Err(err) => Err(ForageError::from(err)),
        }
    }
}
