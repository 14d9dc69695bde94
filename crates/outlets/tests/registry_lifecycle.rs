use std::thread;

use outlets::{InitialValue, NextValue, OutletError, OutletOptions, Registry};
use rstest::rstest;

mod common;

use common::{Recorder, init_tracing};

#[test]
fn created_outlet_is_present_with_its_initial_value() {
    // given
    init_tracing();
    let registry: Registry = Registry::new();
    assert!(!registry.has("k"));

    // when
    registry
        .get_or_create("k".to_string(), "v".to_string(), OutletOptions::default())
        .unwrap();

    // then
    assert!(registry.has("k"));
    assert_eq!(
        registry
            .get::<String, _>("k")
            .unwrap()
            .get_value(),
        "v"
    );
}

#[test]
fn strict_lookup_of_missing_key_fails() {
    init_tracing();
    let registry: Registry = Registry::new();

    let result = registry.get::<i32, _>("missing");

    assert!(matches!(result, Err(OutletError::NotFound { .. })));
    assert_eq!(
        result.unwrap_err().to_string(),
        "Outlet not found. key: \"missing\""
    );
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(10)]
fn update_reaches_every_listener_once_in_registration_order(#[case] listeners: usize) {
    // given
    init_tracing();
    let registry: Registry = Registry::new();
    let outlet = registry
        .get_or_create("k".to_string(), 1, OutletOptions::default())
        .unwrap();
    let recorder = Recorder::<i32>::new();
    const NAMES: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
    let _subscriptions: Vec<_> = NAMES[..listeners]
        .iter()
        .map(|name| outlet.register(recorder.handler(*name)))
        .collect();

    // when
    outlet.update(2);

    // then
    let expected: Vec<_> = NAMES[..listeners]
        .iter()
        .map(|name| (*name, 2))
        .collect();
    assert_eq!(recorder.take(), expected);
    assert_eq!(outlet.ref_cnt(), listeners);
}

#[test]
fn counter_scenario() {
    // given
    init_tracing();
    let registry: Registry = Registry::new();
    let counter = registry
        .get_or_create("counter".to_string(), 0, OutletOptions::default())
        .unwrap();
    let recorder = Recorder::<i32>::new();
    let a = counter.register(recorder.handler("A"));
    let b = counter.register(recorder.handler("B"));

    // when
    counter.update(1);

    // then
    assert_eq!(recorder.take(), vec![("A", 1), ("B", 1)]);
    assert_eq!(counter.get_value(), 1);

    // and when
    a.unregister();
    counter.update(2);

    // then
    assert_eq!(recorder.take(), vec![("B", 2)]);
    assert!(registry.has("counter"));

    // and when
    b.unregister();

    // then
    assert!(!registry.has("counter"));
}

#[test]
fn reducer_increments_and_notifies() {
    init_tracing();
    let registry: Registry = Registry::new();
    let outlet = registry
        .get_or_create("k".to_string(), 5, OutletOptions::default())
        .unwrap();
    let recorder = Recorder::<i32>::new();
    let _subscription = outlet.register(recorder.handler("A"));

    outlet.update(NextValue::reducer(|previous: &i32| previous + 1));

    assert_eq!(outlet.get_value(), 6);
    assert_eq!(recorder.take(), vec![("A", 6)]);
}

#[test]
fn persistent_outlet_requires_forced_removal() {
    // given
    init_tracing();
    let registry: Registry = Registry::new();
    let outlet = registry
        .get_or_create("k".to_string(), 0, OutletOptions::persistent())
        .unwrap();
    let subscriptions = [outlet.register(|_| {}), outlet.register(|_| {})];

    // when
    subscriptions
        .iter()
        .for_each(|subscription| {
            subscription.unregister();
        });

    // then
    assert!(registry.has("k"));
    assert_eq!(outlet.ref_cnt(), 0);

    // and when
    registry.remove("k", true);

    // then
    assert!(!registry.has("k"));
}

#[test]
fn guard_releases_the_last_subscription_on_scope_exit() {
    init_tracing();
    let registry: Registry = Registry::new();
    let outlet = registry
        .get_or_create("k".to_string(), 0, OutletOptions::default())
        .unwrap();

    {
        let _guard = outlet.register(|_| {}).into_guard();
        assert_eq!(outlet.ref_cnt(), 1);
    }

    assert_eq!(outlet.ref_cnt(), 0);
    assert!(!registry.has("k"));
}

#[test]
fn factory_runs_only_for_the_creator() {
    init_tracing();
    let registry: Registry = Registry::new();
    let make = |label: &'static str| move || label.to_string();

    let first = registry
        .get_or_create_with("k".to_string(), make("first"), OutletOptions::default())
        .unwrap();
    let second = registry
        .get_or_create_with("k".to_string(), make("second"), OutletOptions::default())
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(second.get_value(), "first");
}

#[test]
fn snapshot_serializes_for_tooling() {
    init_tracing();
    let registry: Registry = Registry::new();
    let outlet = registry
        .get_or_create("k".to_string(), 1u32, OutletOptions::persistent())
        .unwrap();
    outlet.set(2);

    let json = serde_json::to_value(registry.snapshot()).unwrap();

    assert_eq!(
        json,
        serde_json::json!([{
            "key": "k",
            "value_type": "u32",
            "ref_cnt": 0,
            "persistent": true,
            "version": 1,
        }])
    );
}

#[test]
fn global_registry_is_shared_across_handles() {
    init_tracing();
    let key = "registry_lifecycle::global_registry_is_shared_across_handles";
    let outlet = Registry::global()
        .get_or_create(key.to_string(), 7, OutletOptions::default())
        .unwrap();

    let fetched = Registry::global()
        .get::<i32, _>(key)
        .unwrap();

    assert!(outlet.ptr_eq(&fetched));
    assert!(Registry::global().remove(key, false));
    assert!(!Registry::global().has(key));
}

#[test]
fn concurrent_subscribers_leave_no_stale_entry() {
    // given
    init_tracing();
    let registry: Registry = Registry::new();
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    // when
    thread::scope(|scope| {
        for _ in 0..THREADS {
            let registry = registry.clone();
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    let (outlet, subscription) = registry
                        .register(
                            "shared".to_string(),
                            InitialValue::Literal(0usize),
                            OutletOptions::default(),
                            |_| {},
                        )
                        .unwrap();
                    assert!(outlet.is_attached());
                    assert!(
                        registry
                            .get::<usize, _>("shared")
                            .unwrap()
                            .ptr_eq(&outlet)
                    );
                    outlet.update(NextValue::reducer(|count: &usize| count + 1));
                    assert!(subscription.unregister());
                }
            });
        }
    });

    // then
    assert!(!registry.has("shared"));
    assert!(registry.is_empty());
}

#[test]
fn subscribers_of_a_looked_up_outlet_keep_it_registered() {
    // given
    init_tracing();
    let registry: Registry = Registry::new();
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    // when
    thread::scope(|scope| {
        for _ in 0..THREADS {
            let registry = registry.clone();
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    let outlet = registry
                        .get_or_create("shared".to_string(), 0usize, OutletOptions::default())
                        .unwrap();
                    let subscription = outlet.register(|_| {});
                    if outlet.is_attached() {
                        // while subscribed, the registry can not drop or replace it
                        assert!(
                            registry
                                .get::<usize, _>("shared")
                                .unwrap()
                                .ptr_eq(&outlet)
                        );
                    }
                    assert!(subscription.unregister());
                }
            });
        }
    });

    // then
    assert!(registry.is_empty());
}
