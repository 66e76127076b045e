//! Custom drivers assembled from handler functions.

use crate::config::Config;
use crate::driver::{
    visit_entries, Driver, DriverContext, DropScope, Primitive, Storage, Visitor,
};
use crate::error::{ForageError, ForageResult};
use async_trait::async_trait;
use forage_codec::Value;
use forage_host::HostEnvironment;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

type Handler<A, R> = Arc<dyn Fn(&Config, A) -> BoxFuture<'static, ForageResult<R>> + Send + Sync>;
type SupportFn = Arc<dyn Fn(&HostEnvironment) -> bool + Send + Sync>;

/// A custom driver built from one handler per primitive.
///
/// Handlers receive the instance configuration, so one table can serve
/// several stores. The `iterate` handler lists the store's entries in order;
/// the table applies the caller's visitor to them.
///
/// Every primitive needs a handler. Registering a table with a missing
/// handler fails with [`ForageError::DriverConfiguration`].
///
/// # Example
///
/// ```
/// use forage_core::{DriverTable, Primitive};
///
/// let table = DriverTable::new("partial").get_item(|_, _key| async { Ok(None) });
/// assert!(table.missing().contains(&Primitive::SetItem));
/// ```
#[derive(Clone, Default)]
pub struct DriverTable {
    name: String,
    support: Option<SupportFn>,
    init: Option<Handler<(), ()>>,
    get_item: Option<Handler<String, Option<Value>>>,
    set_item: Option<Handler<(String, Value), Value>>,
    remove_item: Option<Handler<String, ()>>,
    clear: Option<Handler<(), ()>>,
    length: Option<Handler<(), usize>>,
    key: Option<Handler<usize, Option<String>>>,
    keys: Option<Handler<(), Vec<String>>>,
    iterate: Option<Handler<(), Vec<(String, Value)>>>,
    drop_instance: Option<Handler<DropScope, ()>>,
}

fn handler<A, R, F, Fut>(f: F) -> Handler<A, R>
where
    A: 'static,
    R: 'static,
    F: Fn(&Config, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ForageResult<R>> + Send + 'static,
{
    Arc::new(move |config: &Config, args: A| f(config, args).boxed())
}

impl DriverTable {
    /// Starts an empty table named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the support probe. Without one the driver is always supported.
    #[must_use]
    pub fn support<F>(mut self, f: F) -> Self
    where
        F: Fn(&HostEnvironment) -> bool + Send + Sync + 'static,
    {
        self.support = Some(Arc::new(f));
        self
    }

    /// Sets the init hook. Without one initialization always succeeds.
    #[must_use]
    pub fn init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<()>> + Send + 'static,
    {
        self.init = Some(handler(move |config, ()| f(config)));
        self
    }

    /// Sets the `getItem` handler.
    #[must_use]
    pub fn get_item<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<Option<Value>>> + Send + 'static,
    {
        self.get_item = Some(handler(f));
        self
    }

    /// Sets the `setItem` handler.
    #[must_use]
    pub fn set_item<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config, (String, Value)) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<Value>> + Send + 'static,
    {
        self.set_item = Some(handler(f));
        self
    }

    /// Sets the `removeItem` handler.
    #[must_use]
    pub fn remove_item<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<()>> + Send + 'static,
    {
        self.remove_item = Some(handler(f));
        self
    }

    /// Sets the `clear` handler.
    #[must_use]
    pub fn clear<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<()>> + Send + 'static,
    {
        self.clear = Some(handler(move |config, ()| f(config)));
        self
    }

    /// Sets the `length` handler.
    #[must_use]
    pub fn length<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<usize>> + Send + 'static,
    {
        self.length = Some(handler(move |config, ()| f(config)));
        self
    }

    /// Sets the `key` handler.
    #[must_use]
    pub fn key<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<Option<String>>> + Send + 'static,
    {
        self.key = Some(handler(f));
        self
    }

    /// Sets the `keys` handler.
    #[must_use]
    pub fn keys<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<Vec<String>>> + Send + 'static,
    {
        self.keys = Some(handler(move |config, ()| f(config)));
        self
    }

    /// Sets the `iterate` handler, which lists entries in order.
    #[must_use]
    pub fn iterate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<Vec<(String, Value)>>> + Send + 'static,
    {
        self.iterate = Some(handler(move |config, ()| f(config)));
        self
    }

    /// Sets the `dropInstance` handler.
    #[must_use]
    pub fn drop_instance<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Config, DropScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ForageResult<()>> + Send + 'static,
    {
        self.drop_instance = Some(handler(f));
        self
    }

    /// Lists the primitives that have no handler.
    #[must_use]
    pub fn missing(&self) -> Vec<Primitive> {
        Primitive::ALL
            .into_iter()
            .filter(|primitive| match primitive {
                Primitive::GetItem => self.get_item.is_none(),
                Primitive::SetItem => self.set_item.is_none(),
                Primitive::RemoveItem => self.remove_item.is_none(),
                Primitive::Clear => self.clear.is_none(),
                Primitive::Length => self.length.is_none(),
                Primitive::Key => self.key.is_none(),
                Primitive::Keys => self.keys.is_none(),
                Primitive::Iterate => self.iterate.is_none(),
                Primitive::DropInstance => self.drop_instance.is_none(),
            })
            .collect()
    }
}

#[async_trait]
impl Driver for DriverTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self, env: &HostEnvironment) -> bool {
        self.support.as_ref().map_or(true, |support| support(env))
    }

    fn missing_primitives(&self) -> Vec<Primitive> {
        self.missing()
    }

    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        if let Some(init) = &self.init {
            init(&ctx.config, ()).await?;
        }
        Ok(Arc::new(TableStorage {
            table: self.clone(),
            config: ctx.config.clone(),
        }))
    }
}

struct TableStorage {
    table: DriverTable,
    config: Config,
}

impl TableStorage {
    fn call<A, R>(
        &self,
        handler: &Option<Handler<A, R>>,
        primitive: Primitive,
        args: A,
    ) -> ForageResult<BoxFuture<'static, ForageResult<R>>> {
        let handler = handler.as_ref().ok_or_else(|| ForageError::DriverConfiguration {
            name: self.table.name.clone(),
            reason: format!("missing {primitive} handler"),
        })?;
        Ok(handler(&self.config, args))
    }
}

#[async_trait]
impl Storage for TableStorage {
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>> {
        self.call(&self.table.get_item, Primitive::GetItem, key.to_string())?
            .await
    }

    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value> {
        self.call(
            &self.table.set_item,
            Primitive::SetItem,
            (key.to_string(), value),
        )?
        .await
    }

    async fn remove_item(&self, key: &str) -> ForageResult<()> {
        self.call(&self.table.remove_item, Primitive::RemoveItem, key.to_string())?
            .await
    }

    async fn clear(&self) -> ForageResult<()> {
        self.call(&self.table.clear, Primitive::Clear, ())?.await
    }

    async fn length(&self) -> ForageResult<usize> {
        self.call(&self.table.length, Primitive::Length, ())?.await
    }

    async fn key(&self, index: usize) -> ForageResult<Option<String>> {
        self.call(&self.table.key, Primitive::Key, index)?.await
    }

    async fn keys(&self) -> ForageResult<Vec<String>> {
        self.call(&self.table.keys, Primitive::Keys, ())?.await
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>> {
        let entries = self
            .call(&self.table.iterate, Primitive::Iterate, ())?
            .await?;
        Ok(visit_entries(entries, visitor))
    }

    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()> {
        self.call(
            &self.table.drop_instance,
            Primitive::DropInstance,
            scope.clone(),
        )?
        .await
    }
}
