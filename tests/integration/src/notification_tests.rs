//! Notification Tests - what observers see and when
//!
//! These tests cover:
//! - Coalescing of repeated property changes within one cycle
//! - Delivery only at flush, in priority bands
//! - Follow-up work queued by observers during a flush
//! - Subscription filters and protocol-tolerance counters

mod common;

use std::sync::Arc;

use common::*;
use nm_client::catalog::builtin::IFACE_DEVICE;
use nm_client::types::PathPool;
use nm_client::{Catalog, ClientConfig, Emitter, Notification, ObjectCache, Priority, SubscriptionFilter};
use nm_variant::Value;
use parking_lot::Mutex;

const ALIAS: &str = "/org/example/Alias";

fn cache_with_device() -> ObjectCache {
    let mut cache = builtin_cache();
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![("Mtu", Value::U32(1500))])]);
    cache
}

#[test]
fn test_repeated_changes_coalesce() {
    init_logging();
    let mut cache = cache_with_device();
    let recorder = Recorder::attach(&mut cache);

    let delivered = cache.apply_batch(vec![
        changed(DEVICE_1, IFACE_DEVICE, vec![("Mtu", Value::U32(1400))]),
        changed(DEVICE_1, IFACE_DEVICE, vec![("Mtu", Value::U32(9000))]),
        changed(DEVICE_1, IFACE_DEVICE, vec![("State", Value::U32(100))]),
    ]);

    assert_eq!(delivered, 2);
    assert_eq!(
        recorder.labels(),
        vec![format!("changed:{}:Mtu", DEVICE_1), format!("changed:{}:State", DEVICE_1)]
    );
    assert_eq!(cache.view(DEVICE_1).unwrap().u32("mtu"), Some(9000));
}

#[test]
fn test_unchanged_value_is_silent() {
    init_logging();
    let mut cache = cache_with_device();
    let recorder = Recorder::attach(&mut cache);
    assert_eq!(cache.apply_batch(vec![changed(DEVICE_1, IFACE_DEVICE, vec![("Mtu", Value::U32(1500))])]), 0);
    assert_eq!(recorder.len(), 0);
}

#[test]
fn test_nothing_is_delivered_before_flush() {
    init_logging();
    let mut cache = builtin_cache();
    let recorder = Recorder::attach(&mut cache);

    cache.apply_event(wired_device(DEVICE_1, vec![]));
    cache.settle();
    assert!(cache.is_visible(DEVICE_1));
    assert_eq!(recorder.len(), 0);
    assert_eq!(cache.pending_notifications(), 1);

    assert_eq!(cache.flush(), 1);
    assert_eq!(recorder.len(), 1);
    assert_eq!(cache.pending_notifications(), 0);
}

#[test]
fn test_removals_flush_before_additions() {
    init_logging();
    let mut cache = cache_with_device();
    let recorder = Recorder::attach(&mut cache);

    cache.apply_batch(vec![wired_device(DEVICE_2, vec![]), removed(DEVICE_1)]);
    assert_eq!(
        recorder.labels(),
        vec![format!("removed:{}", DEVICE_1), format!("added:{}", DEVICE_2)]
    );
}

#[test]
fn test_observer_follow_up_joins_flush() {
    init_logging();
    let mut cache = builtin_cache();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = log.clone();
    cache.subscribe(SubscriptionFilter::all(), move |n: &Notification, emitter: &mut Emitter<'_>| {
        if matches!(n, Notification::ObjectAdded { .. }) {
            sink.lock().push("added");
            let sink = sink.clone();
            // Asked for an earlier band, but never runs before its cause
            emitter.call(Priority::BEFORE, move |_: &mut Emitter<'_>| sink.lock().push("follow-up"));
        }
    });
    let sink = log.clone();
    cache.enqueue_call(Priority::AFTER.offset(10), move |_: &mut Emitter<'_>| sink.lock().push("aggregate"));

    cache.apply_batch(vec![wired_device(DEVICE_1, vec![])]);
    assert_eq!(*log.lock(), vec!["added", "follow-up", "aggregate"]);
}

#[test]
fn test_observer_can_emit_notifications() {
    init_logging();
    let mut cache = builtin_cache();
    let recorder = Recorder::attach_filtered(&mut cache, SubscriptionFilter::path(ALIAS));
    cache.subscribe(SubscriptionFilter::all(), |n: &Notification, emitter: &mut Emitter<'_>| {
        if let Notification::ObjectAdded { path, facade } = n {
            if *path == DEVICE_1 {
                let alias = PathPool::new().intern(ALIAS);
                emitter.emit(Priority::DEFAULT, Notification::ObjectAdded { path: alias, facade: *facade });
            }
        }
    });

    let delivered = cache.apply_batch(vec![wired_device(DEVICE_1, vec![])]);
    assert_eq!(delivered, 2);
    assert_eq!(recorder.labels(), vec![format!("added:{}", ALIAS)]);
}

#[test]
fn test_filtered_subscription_and_unsubscribe() {
    init_logging();
    let mut cache = cache_with_device();
    let mtu_only = Recorder::attach_filtered(&mut cache, SubscriptionFilter::path(DEVICE_1).with_property("Mtu"));
    let everything = Recorder::attach(&mut cache);

    cache.apply_batch(vec![changed(
        DEVICE_1,
        IFACE_DEVICE,
        vec![("Mtu", Value::U32(1280)), ("Driver", Value::from("e1000"))],
    )]);
    assert_eq!(mtu_only.labels(), vec![format!("changed:{}:Mtu", DEVICE_1)]);
    assert_eq!(everything.len(), 2);

    let log = Arc::new(Mutex::new(0usize));
    let sink = log.clone();
    let id = cache.subscribe(SubscriptionFilter::all(), move |_: &Notification, _: &mut Emitter<'_>| {
        *sink.lock() += 1
    });
    assert!(cache.unsubscribe(id));
    assert!(!cache.unsubscribe(id));
    cache.apply_batch(vec![changed(DEVICE_1, IFACE_DEVICE, vec![("Mtu", Value::U32(1500))])]);
    assert_eq!(*log.lock(), 0);
}

#[test]
fn test_type_mismatch_is_counted_and_ignored() {
    init_logging();
    let config = ClientConfig {
        mismatch_warn_threshold: 2,
        ..ClientConfig::default()
    };
    let mut cache = ObjectCache::new(Catalog::builtin().unwrap(), &config);
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![("Mtu", Value::U32(1500))])]);
    let recorder = Recorder::attach(&mut cache);

    for _ in 0..3 {
        cache.apply_batch(vec![changed(DEVICE_1, IFACE_DEVICE, vec![("Mtu", Value::from("jumbo"))])]);
    }
    assert_eq!(cache.mismatch_count(IFACE_DEVICE, "Mtu"), 3);
    assert_eq!(cache.view(DEVICE_1).unwrap().u32("mtu"), Some(1500));
    assert_eq!(recorder.len(), 0);

    // A well-typed update still goes through
    cache.apply_batch(vec![changed(DEVICE_1, IFACE_DEVICE, vec![("Mtu", Value::U32(1492))])]);
    assert_eq!(cache.view(DEVICE_1).unwrap().u32("mtu"), Some(1492));
}
