//! Custom drivers, driver changes and data removal across crates.

use forage_codec::Value;
use forage_core::{
    Config, ConfigPatch, DriverTable, DropTarget, ForageError, GateState, HostEnvironment,
    INDEXEDDB, LOCALSTORAGE, MEMORY, WEBSQL,
};
use forage_testkit::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn incomplete_table_is_rejected() {
    let registry = fresh_registry();
    let err = registry
        .define_table(DriverTable::new("half").get_item(|_, _| async { Ok(None) }))
        .unwrap_err();
    assert!(matches!(err, ForageError::DriverConfiguration { .. }));
    assert!(registry.get_driver("half").is_err());
}

#[test]
fn builtin_names_cannot_be_redefined() {
    let registry = fresh_registry();
    for name in [INDEXEDDB, WEBSQL, LOCALSTORAGE, MEMORY] {
        let err = registry
            .define_driver(Arc::new(MapDriver::named(name)))
            .unwrap_err();
        assert_eq!(
            err,
            ForageError::DriverNameConflict {
                name: name.to_string()
            }
        );
    }
}

#[tokio::test]
async fn redefinition_replaces_the_driver() {
    let registry = fresh_registry();
    let first = MapDriver::new();
    let second = MapDriver::new();
    registry.define_driver(Arc::new(first.clone())).unwrap();
    registry.define_driver(Arc::new(second.clone())).unwrap();

    let forage = instance_with(
        HostEnvironment::empty(),
        registry,
        Config::new().driver_order([MEMDRIVER]),
    );
    forage.set_item("k", 1).await.unwrap();
    assert_eq!(first.init_count(), 0);
    assert_eq!(second.init_count(), 1);
}

#[tokio::test]
async fn unsupported_custom_driver_is_skipped() {
    let registry = fresh_registry();
    let probed = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&probed);
    registry
        .define_table(memdriver_table(Arc::default()).support(move |_| {
            seen.store(true, Ordering::SeqCst);
            false
        }))
        .unwrap();

    let forage = instance_with(
        HostEnvironment::empty(),
        registry,
        Config::new().driver_order([MEMDRIVER, MEMORY]),
    );
    forage.ready().await.unwrap();
    assert!(probed.load(Ordering::SeqCst));
    assert_eq!(forage.driver().as_deref(), Some(MEMORY));
    assert!(!forage.supports(MEMDRIVER));
}

#[tokio::test]
async fn failed_init_is_terminal_and_not_retried() {
    let faulty = FaultyDriver::new("backend refused");
    let registry = fresh_registry();
    registry.define_driver(Arc::new(faulty.clone())).unwrap();

    let forage = instance_with(
        HostEnvironment::empty(),
        registry,
        Config::new().driver_order([FAULTY_DRIVER, MEMORY]),
    );
    let queued = forage.set_item("k", 1);

    assert_eq!(forage.ready().await, Err(faulty.error()));
    assert_eq!(queued.await, Err(faulty.error()));
    assert_eq!(forage.state(), GateState::Failed(faulty.error()));
    assert_eq!(forage.driver(), None);
    assert_eq!(forage.set_driver(MEMORY).await, Err(faulty.error()));
}

#[tokio::test]
async fn queued_set_driver_recovers_from_failed_selection() {
    let forage = instance(HostEnvironment::empty(), Config::new());

    let before = forage.get_item("k");
    let switched = forage.set_driver(MEMORY);
    let after = forage.set_item("k", 1);

    assert_eq!(before.await, Err(ForageError::NoAvailableDriver));
    switched.await.unwrap();
    after.await.unwrap();
    assert_eq!(forage.state(), GateState::Ready);
    assert_eq!(forage.driver().as_deref(), Some(MEMORY));
}

#[tokio::test]
async fn set_driver_to_unknown_name_fails() {
    let forage = instance_for(MEMORY);
    let err = forage.set_driver("nope").await.unwrap_err();
    assert_eq!(err, ForageError::NoAvailableDriver);
    assert_eq!(forage.state(), GateState::Failed(ForageError::NoAvailableDriver));
}

#[tokio::test]
async fn operations_wait_for_the_new_driver() {
    let slow = SlowDriver::new();
    let registry = fresh_registry();
    registry.define_driver(Arc::new(slow.clone())).unwrap();
    let forage = instance_with(
        HostEnvironment::empty(),
        registry,
        Config::new().driver_order([MEMORY]),
    );
    forage.set_item("before", 1).await.unwrap();

    let switched = forage.set_driver(SLOW_DRIVER);
    let write = forage.set_item("after", 2);
    assert_eq!(forage.state(), GateState::Resolving);

    slow.release_init();
    switched.await.unwrap();
    write.await.unwrap();

    assert_eq!(forage.driver().as_deref(), Some(SLOW_DRIVER));
    let stored = slow.map().snapshot("localforage", "keyvaluepairs");
    assert_eq!(stored.get("after"), Some(&Value::from(2)));
    assert!(!stored.contains_key("before"));
}

#[tokio::test]
async fn in_flight_operations_finish_on_the_old_driver() {
    let slow = SlowDriver::new().hold_writes();
    let registry = fresh_registry();
    registry.define_driver(Arc::new(slow.clone())).unwrap();
    let forage = instance_with(
        HostEnvironment::empty(),
        registry,
        Config::new().driver_order([SLOW_DRIVER]),
    );
    slow.release_init();
    forage.ready().await.unwrap();

    let in_flight = forage.set_item("k", "old");
    let switched = forage.set_driver(MEMORY);
    slow.release_write();

    switched.await.unwrap();
    assert_eq!(in_flight.await.unwrap(), Value::from("old"));
    assert_eq!(
        slow.map().snapshot("localforage", "keyvaluepairs").get("k"),
        Some(&Value::from("old"))
    );
    assert_eq!(forage.get_item("k").await.unwrap(), None);
}

#[tokio::test]
async fn drop_instance_on_every_driver() {
    for driver in [INDEXEDDB, WEBSQL, LOCALSTORAGE, MEMORY] {
        let one = instance(
            HostEnvironment::in_memory(),
            Config::new().name("db").store_name("one").driver_order([driver]),
        );
        let two = one
            .create_instance(
                ConfigPatch::new()
                    .name("db")
                    .store_name("two")
                    .driver_order([driver]),
            )
            .unwrap();
        one.set_item("k", 1).await.unwrap();
        two.set_item("k", 2).await.unwrap();

        one.drop_instance(None).await.unwrap();
        let reopened = one
            .create_instance(
                ConfigPatch::new()
                    .name("db")
                    .store_name("one")
                    .driver_order([driver]),
            )
            .unwrap();
        assert_eq!(reopened.length().await.unwrap(), 0, "{driver}");
        assert_eq!(two.get_item("k").await.unwrap(), Some(Value::from(2)), "{driver}");

        two.drop_instance(Some(DropTarget::database("db")))
            .await
            .unwrap();
        let reopened = one
            .create_instance(
                ConfigPatch::new()
                    .name("db")
                    .store_name("two")
                    .driver_order([driver]),
            )
            .unwrap();
        assert_eq!(reopened.length().await.unwrap(), 0, "{driver}");
    }
}

#[tokio::test]
async fn drop_instance_requires_a_database_for_a_store() {
    let forage = instance_for(MEMORY);
    let target = DropTarget {
        name: None,
        store_name: Some("s".into()),
    };
    let err = forage.drop_instance(Some(target)).await.unwrap_err();
    assert!(matches!(err, ForageError::InvalidArguments { .. }));
    assert_eq!(forage.state(), GateState::Init);
}

#[tokio::test]
async fn quota_errors_pass_through() {
    let area = Arc::new(forage_host::MemoryLocalStorage::with_quota(128));
    let forage = instance(
        HostEnvironment::empty().with_local_storage(area),
        Config::new(),
    );
    let err = forage.set_item("big", "x".repeat(256)).await.unwrap_err();
    assert!(matches!(
        err,
        ForageError::Host(forage_host::HostError::QuotaExceeded(_))
    ));
}

#[tokio::test]
async fn nested_binary_is_not_serializable_for_text_drivers() {
    let value = Value::map([(
        "data",
        Value::Binary(forage_codec::Binary::array_buffer(vec![1, 2])),
    )]);
    for driver in [WEBSQL, LOCALSTORAGE] {
        let forage = instance_for(driver);
        let err = forage.set_item("k", value.clone()).await.unwrap_err();
        assert!(matches!(err, ForageError::Codec(_)), "{driver}");
    }
}

#[tokio::test]
async fn configuration_is_locked_after_start() {
    let forage = instance_for(MEMORY);
    forage
        .configure(&ConfigPatch::new().name("custom"))
        .unwrap();
    forage.ready().await.unwrap();
    assert_eq!(
        forage.configure(&ConfigPatch::new().name("late")),
        Err(ForageError::ConfigLocked)
    );
    assert_eq!(forage.config().name, "custom");
}
