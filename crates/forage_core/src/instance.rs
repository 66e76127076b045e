//! Storage instance facade.

use crate::config::{Config, ConfigKey, ConfigPatch, ConfigValue};
use crate::driver::{Driver, DropTarget, Storage};
use crate::error::{ForageError, ForageResult};
use crate::gate::{GateState, OperationKind, PendingOperation, ReadyGate};
use crate::registry::DriverRegistry;
use crate::request::{self, Request, Resolver};
use crate::selector::DriverOrder;
use crate::table::DriverTable;
use forage_codec::Value;
use forage_host::HostEnvironment;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// A key/value store over whichever backend the host supports.
///
/// Every operation returns a [`Request`] immediately. Operations reach the
/// driver one at a time in submission order, whether they were queued while
/// a driver was being selected or submitted after it became ready.
///
/// Building an instance does no I/O. Driver selection starts at the first
/// submitted operation (including [`LocalForage::ready`]), which also
/// freezes the configuration; until then [`LocalForage::driver`] is `None`.
///
/// Cloning is cheap and yields a handle to the same instance. Use
/// [`LocalForage::create_instance`] for an independent one.
///
/// # Example
///
/// ```no_run
/// use forage_core::LocalForage;
/// use forage_host::HostEnvironment;
///
/// # async fn demo() -> forage_core::ForageResult<()> {
/// let forage = LocalForage::new(HostEnvironment::in_memory());
/// forage.set_item("answer", 42).await?;
/// assert_eq!(forage.get_item("answer").await?, Some(42.into()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalForage {
    gate: Arc<ReadyGate>,
}

impl fmt::Debug for LocalForage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalForage")
            .field("id", &self.id())
            .field("state", &self.gate.state())
            .field("driver", &self.driver())
            .finish()
    }
}

struct Call<T, F> {
    kind: OperationKind,
    f: F,
    resolver: Resolver<T>,
}

impl<T, F, Fut> PendingOperation for Call<T, F>
where
    T: Send + 'static,
    F: FnOnce(Arc<dyn Storage>) -> Fut + Send + 'static,
    Fut: Future<Output = ForageResult<T>> + Send + 'static,
{
    fn kind(&self) -> OperationKind {
        self.kind
    }

    fn run(self: Box<Self>, storage: Arc<dyn Storage>) -> BoxFuture<'static, ()> {
        let Call { f, resolver, .. } = *self;
        async move { resolver.settle(f(storage).await) }.boxed()
    }

    fn reject(self: Box<Self>, err: ForageError) {
        self.resolver.settle(Err(err));
    }
}

impl LocalForage {
    /// Creates an instance with the default configuration and the global
    /// driver registry.
    #[must_use]
    pub fn new(env: HostEnvironment) -> Self {
        Self::build(DriverRegistry::global(), env, Config::default())
    }

    /// Creates an instance with `config` and the global driver registry.
    ///
    /// # Errors
    ///
    /// Returns [`ForageError::InvalidConfig`] if `config` does not validate.
    pub fn with_config(env: HostEnvironment, config: Config) -> ForageResult<Self> {
        Self::with_registry(env, DriverRegistry::global(), config)
    }

    /// Creates an instance that selects drivers from `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ForageError::InvalidConfig`] if `config` does not validate.
    pub fn with_registry(
        env: HostEnvironment,
        registry: Arc<DriverRegistry>,
        config: Config,
    ) -> ForageResult<Self> {
        Ok(Self::build(registry, env, config.normalized()?))
    }

    fn build(registry: Arc<DriverRegistry>, env: HostEnvironment, config: Config) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(
            instance = %id,
            name = %config.name,
            store = %config.store_name,
            "created storage instance"
        );
        Self {
            gate: Arc::new(ReadyGate::new(id, registry, env, config)),
        }
    }

    /// Creates an independent instance sharing this one's registry and host.
    ///
    /// The new instance starts from the default configuration with `patch`
    /// applied, and has its own queue.
    ///
    /// # Errors
    ///
    /// Returns [`ForageError::InvalidConfig`] if the patched configuration
    /// does not validate.
    pub fn create_instance(&self, patch: ConfigPatch) -> ForageResult<Self> {
        let mut config = Config::default();
        config.apply(&patch);
        Self::with_registry(
            self.gate.env().clone(),
            Arc::clone(self.gate.registry()),
            config,
        )
    }

    /// The instance's unique id, attached to its log events.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.gate.id()
    }

    /// The lifecycle state.
    #[must_use]
    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    /// A copy of the configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.gate.config()
    }

    /// Reads one configuration field.
    #[must_use]
    pub fn config_value(&self, key: ConfigKey) -> ConfigValue {
        self.gate.config().get(key)
    }

    /// Merges `patch` into the configuration.
    ///
    /// # Errors
    ///
    /// - [`ForageError::ConfigLocked`] once any operation, `ready` or
    ///   `set_driver` has been submitted.
    /// - [`ForageError::InvalidConfig`] if the result does not validate.
    pub fn configure(&self, patch: &ConfigPatch) -> ForageResult<()> {
        self.gate.configure(patch)
    }

    /// Name of the active driver.
    ///
    /// `None` until a driver is ready. Selection only starts at the first
    /// submitted operation, so a fresh instance reports `None` until
    /// something like `ready().await` has run.
    #[must_use]
    pub fn driver(&self) -> Option<String> {
        self.gate.driver_name()
    }

    /// Returns true if `name` is registered and usable in this host.
    #[must_use]
    pub fn supports(&self, name: &str) -> bool {
        self.gate.registry().supports(name, self.gate.env())
    }

    /// Registers a custom driver with this instance's registry.
    ///
    /// # Errors
    ///
    /// See [`DriverRegistry::define_driver`].
    pub fn define_driver(&self, driver: Arc<dyn Driver>) -> ForageResult<()> {
        self.gate.registry().define_driver(driver)
    }

    /// Registers a custom driver built from handlers.
    ///
    /// # Errors
    ///
    /// See [`DriverRegistry::define_driver`].
    pub fn define_table(&self, table: DriverTable) -> ForageResult<()> {
        self.gate.registry().define_table(table)
    }

    /// Looks up a registered driver.
    ///
    /// # Errors
    ///
    /// Returns [`ForageError::DriverNotFound`] for an unregistered name.
    pub fn get_driver(&self, name: &str) -> ForageResult<Arc<dyn Driver>> {
        self.gate.registry().get_driver(name)
    }

    /// Settles once every operation submitted before it has run against a
    /// ready driver, or with the selection error.
    pub fn ready(&self) -> Request<()> {
        self.dispatch(OperationKind::Ready, |_| async { Ok(()) })
    }

    /// Switches to the first supported driver in `order`.
    ///
    /// Operations submitted afterwards wait for the new driver. Operations
    /// already running finish against the old one.
    pub fn set_driver(&self, order: impl Into<DriverOrder>) -> Request<()> {
        let (resolver, request) = request::channel();
        self.gate.set_driver(order.into().into_names(), resolver);
        request
    }

    /// Reads a value. A missing key yields `None`.
    pub fn get_item(&self, key: impl ToString) -> Request<Option<Value>> {
        let key = key.to_string();
        self.dispatch(OperationKind::GetItem, move |storage| async move {
            storage.get_item(&key).await
        })
    }

    /// Writes a value and yields it back.
    pub fn set_item(&self, key: impl ToString, value: impl Into<Value>) -> Request<Value> {
        let key = key.to_string();
        let value = value.into();
        self.dispatch(OperationKind::SetItem, move |storage| async move {
            storage.set_item(&key, value).await
        })
    }

    /// Removes a value.
    pub fn remove_item(&self, key: impl ToString) -> Request<()> {
        let key = key.to_string();
        self.dispatch(OperationKind::RemoveItem, move |storage| async move {
            storage.remove_item(&key).await
        })
    }

    /// Removes every value in the store.
    pub fn clear(&self) -> Request<()> {
        self.dispatch(OperationKind::Clear, |storage| async move {
            storage.clear().await
        })
    }

    /// Counts the values in the store.
    pub fn length(&self) -> Request<usize> {
        self.dispatch(OperationKind::Length, |storage| async move {
            storage.length().await
        })
    }

    /// Returns the name of the key at `index`.
    pub fn key(&self, index: usize) -> Request<Option<String>> {
        self.dispatch(OperationKind::Key, move |storage| async move {
            storage.key(index).await
        })
    }

    /// Lists the keys in the store.
    pub fn keys(&self) -> Request<Vec<String>> {
        self.dispatch(OperationKind::Keys, |storage| async move {
            storage.keys().await
        })
    }

    /// Calls `visitor` with each value, key and 1-based iteration number.
    ///
    /// Stops at the first `Some` the visitor returns and yields it.
    pub fn iterate<F>(&self, mut visitor: F) -> Request<Option<Value>>
    where
        F: FnMut(&Value, &str, u32) -> Option<Value> + Send + 'static,
    {
        self.dispatch(OperationKind::Iterate, move |storage| async move {
            storage.iterate(&mut visitor).await
        })
    }

    /// Deletes persisted data.
    ///
    /// See [`DropTarget`] for how `target` selects what is removed.
    pub fn drop_instance(&self, target: Option<DropTarget>) -> Request<()> {
        let scope = match DropTarget::resolve(target.as_ref(), &self.gate.config()) {
            Ok(scope) => scope,
            Err(err) => return Request::settled(Err(err)),
        };
        self.dispatch(OperationKind::DropInstance, move |storage| async move {
            storage.drop_instance(&scope).await
        })
    }

    fn dispatch<T, F, Fut>(&self, kind: OperationKind, f: F) -> Request<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn Storage>) -> Fut + Send + 'static,
        Fut: Future<Output = ForageResult<T>> + Send + 'static,
    {
        let (resolver, request) = request::channel();
        self.gate.submit(Box::new(Call { kind, f, resolver }));
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{LOCALSTORAGE, MEMORY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_instance() -> LocalForage {
        LocalForage::with_registry(
            HostEnvironment::empty(),
            Arc::new(DriverRegistry::new()),
            Config::new().driver_order([MEMORY]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn operations_before_ready_run_in_order() {
        let forage = memory_instance();
        assert_eq!(forage.state(), GateState::Init);

        let set = forage.set_item("k", "v1");
        let get = forage.get_item("k");
        let overwrite = forage.set_item("k", "v2");
        let get_again = forage.get_item("k");
        assert_eq!(forage.state(), GateState::Resolving);

        forage.ready().await.unwrap();
        assert_eq!(set.await.unwrap(), Value::from("v1"));
        assert_eq!(get.await.unwrap(), Some(Value::from("v1")));
        assert_eq!(overwrite.await.unwrap(), Value::from("v2"));
        assert_eq!(get_again.await.unwrap(), Some(Value::from("v2")));
        assert_eq!(forage.driver().as_deref(), Some(MEMORY));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let forage = memory_instance();
        assert_eq!(forage.get_item("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_are_coerced_to_strings() {
        let forage = memory_instance();
        forage.set_item(42, true).await.unwrap();
        assert_eq!(forage.get_item("42").await.unwrap(), Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn no_driver_fails_everything() {
        let forage = LocalForage::with_registry(
            HostEnvironment::empty(),
            Arc::new(DriverRegistry::new()),
            Config::new(),
        )
        .unwrap();

        let queued = forage.get_item("k");
        assert_eq!(forage.ready().await, Err(ForageError::NoAvailableDriver));
        assert_eq!(queued.await, Err(ForageError::NoAvailableDriver));
        assert_eq!(forage.state(), GateState::Failed(ForageError::NoAvailableDriver));
        assert_eq!(
            forage.set_item("k", 1).await,
            Err(ForageError::NoAvailableDriver)
        );
        assert_eq!(forage.driver(), None);
    }

    #[tokio::test]
    async fn configuration_locks_on_first_use() {
        let forage = memory_instance();
        forage
            .configure(&ConfigPatch::new().store_name("custom store"))
            .unwrap();
        assert_eq!(
            forage.config_value(ConfigKey::StoreName),
            ConfigValue::Text("custom_store".into())
        );

        forage.ready().await.unwrap();
        assert_eq!(
            forage.configure(&ConfigPatch::new().name("late")),
            Err(ForageError::ConfigLocked)
        );
        assert_eq!(forage.config().name, "localforage");
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected() {
        let forage = memory_instance();
        let err = forage
            .configure(&ConfigPatch::new().version(-1.0))
            .unwrap_err();
        assert!(matches!(err, ForageError::InvalidConfig { .. }));
        assert!((forage.config().version - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn set_driver_switches_backend() {
        let env = HostEnvironment::in_memory();
        let forage = LocalForage::with_registry(
            env,
            Arc::new(DriverRegistry::new()),
            Config::new().driver_order([MEMORY]),
        )
        .unwrap();
        forage.ready().await.unwrap();
        assert_eq!(forage.driver().as_deref(), Some(MEMORY));

        let switched = forage.set_driver(LOCALSTORAGE);
        let set = forage.set_item("k", 1);
        let get = forage.get_item("k");
        switched.await.unwrap();
        set.await.unwrap();
        assert_eq!(get.await.unwrap(), Some(Value::from(1)));
        assert_eq!(forage.driver().as_deref(), Some(LOCALSTORAGE));
    }

    #[tokio::test]
    async fn callbacks_fire_once() {
        let forage = memory_instance();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        forage
            .set_item("k", 1)
            .on_settled(move |result| {
                assert!(result.is_ok());
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn iterate_stops_early() {
        let forage = memory_instance();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            forage.set_item(k, v).await.unwrap();
        }

        let found = forage
            .iterate(|value, key, n| {
                assert_eq!(value.as_integer(), Some(i64::from(n)));
                (key == "b").then(|| value.clone())
            })
            .await
            .unwrap();
        assert_eq!(found, Some(Value::from(2)));

        let none = forage.iterate(|_, _, _| None).await.unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn drop_instance_rejects_store_without_name() {
        let forage = memory_instance();
        let target = DropTarget {
            name: None,
            store_name: Some("s".into()),
        };
        let err = forage.drop_instance(Some(target)).await.unwrap_err();
        assert!(matches!(err, ForageError::InvalidArguments { .. }));
    }

    #[test]
    fn submission_without_runtime_fails() {
        let forage = memory_instance();
        let result = futures::executor::block_on(forage.get_item("k"));
        assert_eq!(result, Err(ForageError::NoRuntime));
        assert_eq!(forage.state(), GateState::Init);
    }

    #[tokio::test]
    async fn instances_have_independent_queues() {
        let forage = memory_instance();
        let other = forage
            .create_instance(ConfigPatch::new().store_name("other").driver_order([MEMORY]))
            .unwrap();
        assert_ne!(forage.id(), other.id());

        forage.set_item("k", 1).await.unwrap();
        assert_eq!(other.get_item("k").await.unwrap(), None);
        assert_eq!(other.state(), GateState::Ready);
    }

    #[tokio::test]
    async fn driver_is_unknown_until_first_use() {
        let forage = memory_instance();
        assert_eq!(forage.driver(), None);
        assert_eq!(forage.state(), GateState::Init);

        forage.ready().await.unwrap();
        assert_eq!(forage.driver().as_deref(), Some(MEMORY));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ready_instance_keeps_submission_order() {
        let forage = memory_instance();
        forage.ready().await.unwrap();

        for i in 0..200 {
            let set = forage.set_item("k", i);
            let get = forage.get_item("k");
            set.await.unwrap();
            assert_eq!(get.await.unwrap(), Some(Value::from(i)), "round {i}");
        }

        let sets: Vec<_> = (0..500).map(|i| forage.set_item("last", i)).collect();
        for set in sets {
            set.await.unwrap();
        }
        assert_eq!(forage.get_item("last").await.unwrap(), Some(Value::from(499)));

        let pending = forage.set_item("late", 1);
        forage.ready().await.unwrap();
        assert!(pending.is_settled());
    }

    #[tokio::test]
    async fn panicking_visitor_does_not_stall_the_queue() {
        let forage = memory_instance();
        let set = forage.set_item("a", 1);
        let walk = forage.iterate(|_, _, _| -> Option<Value> { panic!("visitor failed") });
        let get = forage.get_item("a");

        assert_eq!(walk.await, Err(ForageError::Dropped));
        set.await.unwrap();
        assert_eq!(get.await.unwrap(), Some(Value::from(1)));
        assert_eq!(forage.state(), GateState::Ready);

        let walk = forage.iterate(|_, _, _| -> Option<Value> { panic!("visitor failed") });
        assert_eq!(walk.await, Err(ForageError::Dropped));
        assert_eq!(forage.length().await.unwrap(), 1);
    }
}
