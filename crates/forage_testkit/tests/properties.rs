//! Behavioral properties of storage instances, checked on every built-in
//! driver where they apply.

use forage_codec::Value;
use forage_core::{
    Config, ConfigPatch, ForageError, GateState, HostEnvironment, LocalForage, INDEXEDDB,
    LOCALSTORAGE, MEMORY, WEBSQL,
};
use forage_testkit::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BUILTIN: [&str; 4] = [INDEXEDDB, WEBSQL, LOCALSTORAGE, MEMORY];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

#[tokio::test]
async fn every_queued_operation_settles_once_against_one_driver() {
    let slow = SlowDriver::new();
    let registry = fresh_registry();
    registry.define_driver(Arc::new(slow.clone())).unwrap();
    let forage = instance_with(
        HostEnvironment::empty(),
        registry,
        Config::new().driver_order([SLOW_DRIVER]),
    );

    let settled = Arc::new(AtomicUsize::new(0));
    let mut requests = Vec::new();
    for i in 0..20 {
        let counter = Arc::clone(&settled);
        requests.push(forage.set_item(format!("k{i}"), i).on_settled(move |result| {
            assert!(result.is_ok());
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }
    assert_eq!(forage.state(), GateState::Resolving);
    assert_eq!(settled.load(Ordering::SeqCst), 0);

    slow.release_init();
    forage.ready().await.unwrap();
    for request in requests {
        request.await.unwrap();
    }

    assert_eq!(settled.load(Ordering::SeqCst), 20);
    assert_eq!(slow.map().init_count(), 1);
    assert_eq!(slow.map().snapshot("localforage", "keyvaluepairs").len(), 20);
    assert_eq!(forage.driver().as_deref(), Some(SLOW_DRIVER));
}

#[tokio::test]
async fn no_usable_driver_fails_ready_and_everything_after() {
    let forage = instance(HostEnvironment::empty(), Config::new());
    let queued = forage.set_item("a", 1);

    assert_eq!(forage.ready().await, Err(ForageError::NoAvailableDriver));
    assert_eq!(queued.await, Err(ForageError::NoAvailableDriver));
    assert_eq!(
        ForageError::NoAvailableDriver.to_string(),
        "No available storage method found."
    );

    let later = forage.get_item("a");
    assert!(later.is_settled(), "must not be queued");
    assert_eq!(later.await, Err(ForageError::NoAvailableDriver));
    assert_eq!(forage.keys().await, Err(ForageError::NoAvailableDriver));
}

#[tokio::test]
async fn set_driver_then_write_then_read() {
    for driver in BUILTIN {
        let forage = instance(HostEnvironment::in_memory(), Config::new());
        let switched = forage.set_driver(driver);
        let set = forage.set_item("k", "v");
        let get = forage.get_item("k");

        switched.await.unwrap();
        assert_eq!(set.await.unwrap(), Value::from("v"));
        assert_eq!(get.await.unwrap(), Some(Value::from("v")), "{driver}");
        assert_eq!(forage.driver().as_deref(), Some(driver));
    }
}

#[tokio::test]
async fn missing_key_reads_as_none() {
    for driver in BUILTIN {
        let forage = instance_for(driver);
        assert_eq!(forage.get_item("never-written").await.unwrap(), None, "{driver}");
    }
}

#[tokio::test]
async fn local_storage_only_host() {
    let (env, area) = local_storage_host();
    let forage = instance(env, Config::new());

    let set = forage.set_item("a", 1);
    forage.ready().await.unwrap();
    set.await.unwrap();

    assert_eq!(forage.driver().as_deref(), Some(LOCALSTORAGE));
    assert_eq!(forage.get_item("a").await.unwrap(), Some(Value::from(1)));
    assert!(area.snapshot().contains_key("localforage/keyvaluepairs/a"));
}

#[tokio::test]
async fn memdriver_is_selected_by_order() {
    let registry = fresh_registry();
    registry.define_driver(Arc::new(MapDriver::new())).unwrap();
    let forage = instance_with(
        HostEnvironment::in_memory(),
        registry,
        Config::new().driver_order([MEMDRIVER]),
    );

    forage.ready().await.unwrap();
    assert_eq!(forage.driver().as_deref(), Some(MEMDRIVER));
}

#[tokio::test]
async fn memdriver_table_is_selected_by_order() {
    let map: Arc<Mutex<BTreeMap<String, Value>>> = Arc::default();
    let registry = fresh_registry();
    registry.define_table(memdriver_table(Arc::clone(&map))).unwrap();
    let forage = instance_with(
        HostEnvironment::empty(),
        registry,
        Config::new().driver_order([MEMDRIVER]),
    );

    forage.set_item("k", true).await.unwrap();
    assert_eq!(forage.driver().as_deref(), Some(MEMDRIVER));
    assert_eq!(
        map.lock().get("localforage/keyvaluepairs/k"),
        Some(&Value::Bool(true))
    );
}

#[tokio::test]
async fn stores_in_one_database_are_isolated() {
    for driver in BUILTIN {
        let one = instance(
            HostEnvironment::in_memory(),
            Config::new().store_name("one").driver_order([driver]),
        );
        let two = one
            .create_instance(ConfigPatch::new().store_name("two").driver_order([driver]))
            .unwrap();

        one.set_item("shared", 1).await.unwrap();
        two.set_item("shared", 2).await.unwrap();
        two.set_item("only-two", 3).await.unwrap();

        assert_eq!(one.keys().await.unwrap(), vec!["shared"], "{driver}");
        one.clear().await.unwrap();
        assert_eq!(one.length().await.unwrap(), 0);
        assert_eq!(two.length().await.unwrap(), 2, "{driver}");
        assert_eq!(two.get_item("shared").await.unwrap(), Some(Value::from(2)));
    }
}

#[tokio::test]
async fn default_order_prefers_indexeddb() {
    let forage = instance(HostEnvironment::in_memory(), Config::new());
    forage.ready().await.unwrap();
    assert_eq!(forage.driver().as_deref(), Some(INDEXEDDB));

    let no_key_range = instance(
        HostEnvironment::in_memory().with_idb_key_range(false),
        Config::new(),
    );
    no_key_range.ready().await.unwrap();
    assert_eq!(no_key_range.driver().as_deref(), Some(WEBSQL));
}

#[tokio::test]
async fn global_registry_is_shared_by_default() {
    let forage = LocalForage::new(HostEnvironment::in_memory());
    let other = forage.create_instance(ConfigPatch::new()).unwrap();
    assert!(forage.supports(MEMORY));
    assert!(other.get_driver(INDEXEDDB).is_ok());
    assert_ne!(forage.id(), other.id());
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn round_trip_on_every_driver(key in key_strategy(), value in storable_value_strategy()) {
        let rt = runtime();
        for driver in BUILTIN {
            let forage = instance_for(driver);
            let read = rt.block_on(async {
                forage.set_item(&key, value.clone()).await?;
                forage.get_item(&key).await
            });
            prop_assert_eq!(read, Ok(Some(value.clone())), "driver {}", driver);
        }
    }

    #[test]
    fn structured_clone_drivers_keep_nested_binary(value in value_strategy()) {
        let rt = runtime();
        for driver in [INDEXEDDB, MEMORY] {
            let forage = instance_for(driver);
            let read = rt.block_on(async {
                forage.set_item("v", value.clone()).await?;
                forage.get_item("v").await
            });
            prop_assert_eq!(read, Ok(Some(value.clone())), "driver {}", driver);
        }
    }

    #[test]
    fn operation_sequences_match_the_model(ops in operation_sequence_strategy(1, 24)) {
        let rt = runtime();
        for driver in BUILTIN {
            let mut harness = ModelHarness::new(instance_for(driver));
            let outcome = rt.block_on(async {
                harness.apply_all(&ops).await?;
                harness.verify().await
            });
            prop_assert_eq!(outcome, Ok(()), "driver {}", driver);
        }
    }
}
