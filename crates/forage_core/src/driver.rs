//! Driver and storage traits.
//!
//! A [`Driver`] knows whether its backend is usable in a host and how to
//! open it for a configuration. Opening yields a [`Storage`], the handle the
//! eight primitive operations run against.

use crate::config::Config;
use crate::error::{ForageError, ForageResult};
use async_trait::async_trait;
use forage_codec::Value;
use forage_host::HostEnvironment;
use std::fmt;
use std::sync::Arc;

/// Visitor passed to [`Storage::iterate`].
///
/// Called with each value, its key and a 1-based iteration number.
/// Returning `Some` stops the iteration with that result.
pub type Visitor<'a> = dyn FnMut(&Value, &str, u32) -> Option<Value> + Send + 'a;

/// The primitive operations every driver must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `getItem`
    GetItem,
    /// `setItem`
    SetItem,
    /// `removeItem`
    RemoveItem,
    /// `clear`
    Clear,
    /// `length`
    Length,
    /// `key`
    Key,
    /// `keys`
    Keys,
    /// `iterate`
    Iterate,
    /// `dropInstance`
    DropInstance,
}

impl Primitive {
    /// Every required primitive.
    pub const ALL: [Primitive; 9] = [
        Primitive::GetItem,
        Primitive::SetItem,
        Primitive::RemoveItem,
        Primitive::Clear,
        Primitive::Length,
        Primitive::Key,
        Primitive::Keys,
        Primitive::Iterate,
        Primitive::DropInstance,
    ];

    /// The operation's public name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Primitive::GetItem => "getItem",
            Primitive::SetItem => "setItem",
            Primitive::RemoveItem => "removeItem",
            Primitive::Clear => "clear",
            Primitive::Length => "length",
            Primitive::Key => "key",
            Primitive::Keys => "keys",
            Primitive::Iterate => "iterate",
            Primitive::DropInstance => "dropInstance",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which family a driver belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// The IndexedDB adapter.
    IndexedDb,
    /// The WebSQL adapter.
    WebSql,
    /// The localStorage adapter.
    LocalStorage,
    /// The in-process memory adapter.
    Memory,
    /// A driver registered at runtime.
    Custom(String),
}

/// What an init hook receives.
#[derive(Debug, Clone)]
pub struct DriverContext {
    /// The instance's configuration, fixed for the lifetime of the storage.
    pub config: Config,
    /// The host the instance runs in.
    pub env: HostEnvironment,
}

/// The data a `dropInstance` call removes, resolved against the caller's
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropScope {
    /// One store of a database.
    Store {
        /// Database name.
        name: String,
        /// Store name.
        store_name: String,
    },
    /// A whole database with every store in it.
    Database {
        /// Database name.
        name: String,
    },
}

/// Target of a `dropInstance` call, as the caller supplies it.
///
/// - no target: the instance's own store
/// - `name` only: that whole database
/// - `name` and `store_name`: that store
///
/// A `store_name` without a `name` is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropTarget {
    /// Database name.
    pub name: Option<String>,
    /// Store name.
    pub store_name: Option<String>,
}

impl DropTarget {
    /// Targets a whole database.
    #[must_use]
    pub fn database(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            store_name: None,
        }
    }

    /// Targets one store of a database.
    #[must_use]
    pub fn store(name: impl Into<String>, store_name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            store_name: Some(store_name.into()),
        }
    }

    /// Resolves the target against `config`.
    ///
    /// # Errors
    ///
    /// Fails with [`ForageError::InvalidArguments`] when a store name is
    /// given without a database name.
    pub fn resolve(target: Option<&DropTarget>, config: &Config) -> ForageResult<DropScope> {
        let Some(target) = target else {
            return Ok(DropScope::Store {
                name: config.name.clone(),
                store_name: config.store_name.clone(),
            });
        };

        match (&target.name, &target.store_name) {
            (None, None) => Ok(DropScope::Store {
                name: config.name.clone(),
                store_name: config.store_name.clone(),
            }),
            (Some(name), None) => Ok(DropScope::Database { name: name.clone() }),
            (Some(name), Some(store_name)) => Ok(DropScope::Store {
                name: name.clone(),
                store_name: crate::config::sanitize_store_name(store_name),
            }),
            (None, Some(_)) => Err(ForageError::invalid_arguments(
                "a store name requires a database name",
            )),
        }
    }
}

/// An opened backend: the primitive operations for one store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads a value. A missing key yields `None`.
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>>;

    /// Writes a value and returns it.
    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value>;

    /// Removes a value. Removing a missing key succeeds.
    async fn remove_item(&self, key: &str) -> ForageResult<()>;

    /// Removes every value in the store.
    async fn clear(&self) -> ForageResult<()>;

    /// Counts the values in the store.
    async fn length(&self) -> ForageResult<usize>;

    /// Returns the key at `index` in backend order.
    async fn key(&self, index: usize) -> ForageResult<Option<String>>;

    /// Lists keys in backend order.
    async fn keys(&self) -> ForageResult<Vec<String>>;

    /// Visits each entry in backend order until the visitor returns `Some`.
    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>>;

    /// Deletes persisted data for `scope`.
    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()>;
}

/// A storage backend that can be selected for an instance.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Unique driver name.
    fn name(&self) -> &str;

    /// The driver's family.
    fn kind(&self) -> DriverKind {
        DriverKind::Custom(self.name().to_string())
    }

    /// Returns true if the backend is usable in `env`. Must not fail.
    fn is_supported(&self, env: &HostEnvironment) -> bool;

    /// Primitives the driver cannot perform. A driver with missing
    /// primitives is refused at registration.
    fn missing_primitives(&self) -> Vec<Primitive> {
        Vec::new()
    }

    /// Opens the backend for `ctx.config`.
    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>>;
}

impl fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Visits `entries` in order, numbering them from 1.
pub(crate) fn visit_entries(
    entries: impl IntoIterator<Item = (String, Value)>,
    visitor: &mut Visitor<'_>,
) -> Option<Value> {
    entries
        .into_iter()
        .zip(1u32..)
        .find_map(|((key, value), n)| visitor(&value, &key, n))
}
