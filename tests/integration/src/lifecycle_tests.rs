//! Lifecycle Tests - object states from first sighting to eviction
//!
//! These tests drive the builtin catalog through:
//! - Facade selection from interface priorities
//! - Interface retraction and type downgrades
//! - Eviction once the last holder lets go, including handles dropped on
//!   other threads

mod common;

use common::*;
use nm_client::catalog::builtin::{
    IFACE_ACTIVE_CONNECTION, IFACE_DEVICE, IFACE_DEVICE_WIRED, IFACE_MANAGER, IFACE_VPN_CONNECTION,
};
use nm_client::config::MANAGER_PATH;
use nm_client::{Notification, ObjState};
use nm_ipc::BusEvent;
use nm_variant::Value;

#[test]
fn test_wired_device_becomes_visible() {
    init_logging();
    let mut cache = builtin_cache();
    let recorder = Recorder::attach(&mut cache);

    cache.apply_batch(vec![wired_device(DEVICE_1, vec![("Interface", Value::from("eth0"))])]);

    assert_eq!(cache.state(DEVICE_1), Some(ObjState::FacadeVisible));
    let view = cache.view(DEVICE_1).unwrap();
    assert_eq!(view.facade_type(), Some("DeviceEthernet"));
    assert_eq!(view.string("interface"), "eth0");
    assert_eq!(view.bool("carrier"), Some(true));
    assert_eq!(recorder.labels(), vec![format!("added:{}", DEVICE_1)]);
}

#[test]
fn test_parent_interface_alone_does_not_instantiate() {
    init_logging();
    let mut cache = builtin_cache();
    let recorder = Recorder::attach(&mut cache);

    cache.apply_batch(vec![added(DEVICE_2, IFACE_DEVICE, vec![("Interface", Value::from("lo"))])]);
    assert_eq!(cache.state(DEVICE_2), Some(ObjState::OnDbus));
    assert!(!cache.is_ready(DEVICE_2));
    assert!(cache.view(DEVICE_2).unwrap().facade().is_none());
    assert_eq!(recorder.len(), 0);

    cache.apply_batch(vec![added(DEVICE_2, IFACE_DEVICE_WIRED, vec![])]);
    assert!(cache.is_visible(DEVICE_2));
    // Data that arrived before the type is kept
    assert_eq!(cache.view(DEVICE_2).unwrap().string("interface"), "lo");
    assert_eq!(recorder.labels(), vec![format!("added:{}", DEVICE_2)]);
}

#[test]
fn test_type_interface_removal_downgrades() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![("Interface", Value::from("eth0"))])]);
    let recorder = Recorder::attach(&mut cache);

    cache.apply_batch(vec![BusEvent::InterfacesRemoved {
        path: path(DEVICE_1),
        interfaces: vec![IFACE_DEVICE_WIRED.to_string()],
    }]);

    assert_eq!(cache.state(DEVICE_1), Some(ObjState::OnDbus));
    let view = cache.view(DEVICE_1).unwrap();
    assert!(view.facade().is_none());
    assert_eq!(view.string("interface"), "eth0");
    assert_eq!(view.bool("carrier"), None);

    let seen = recorder.take();
    assert!(matches!(&seen[0], Notification::ObjectRemoved { facade: "DeviceEthernet", .. }));
    assert_eq!(seen.len(), 1);
}

#[test]
fn test_higher_priority_interface_replaces_facade() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![added(ACTIVE_1, IFACE_ACTIVE_CONNECTION, vec![("Id", Value::from("vpn"))])]);
    let before = cache.view(ACTIVE_1).unwrap().facade().unwrap();
    let recorder = Recorder::attach(&mut cache);

    cache.apply_batch(vec![added(ACTIVE_1, IFACE_VPN_CONNECTION, vec![("Banner", Value::from("hello"))])]);
    let after = cache.view(ACTIVE_1).unwrap().facade().unwrap();
    assert_eq!(after.type_name(), "VpnConnection");
    assert_ne!(before.id, after.id);
    // Base fields survive the type change
    assert_eq!(cache.view(ACTIVE_1).unwrap().string("id"), "vpn");
    assert_eq!(cache.view(ACTIVE_1).unwrap().string("banner"), "hello");

    // The old facade goes first and the new one is announced last
    let labels = recorder.labels();
    assert_eq!(labels.first(), Some(&format!("removed:{}", ACTIVE_1)));
    assert_eq!(labels.last(), Some(&format!("added:{}", ACTIVE_1)));

    // Dropping the VPN interface falls back to the plain active connection
    cache.apply_batch(vec![BusEvent::InterfacesRemoved {
        path: path(ACTIVE_1),
        interfaces: vec![IFACE_VPN_CONNECTION.to_string()],
    }]);
    assert_eq!(cache.view(ACTIVE_1).unwrap().facade_type(), Some("ActiveConnection"));
    assert!(cache.is_visible(ACTIVE_1));
}

#[test]
fn test_object_removal_evicts() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![])]);
    assert_eq!(cache.ref_count(DEVICE_1), Some(1));

    let recorder = Recorder::attach(&mut cache);
    cache.apply_batch(vec![removed(DEVICE_1)]);

    assert!(!cache.contains(DEVICE_1));
    assert!(cache.is_empty());
    assert_eq!(recorder.labels(), vec![format!("removed:{}", DEVICE_1)]);
}

#[test]
fn test_handle_dropped_on_another_thread() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![])]);

    let handle = cache.get_object(DEVICE_1).unwrap();
    let copy = handle.clone();
    assert_eq!(cache.ref_count(DEVICE_1), Some(3));

    cache.apply_batch(vec![removed(DEVICE_1)]);
    assert_eq!(cache.state(DEVICE_1), Some(ObjState::Unlinked));
    assert!(!cache.is_visible(DEVICE_1));

    let workers: Vec<_> = [handle, copy]
        .into_iter()
        .map(|h| std::thread::spawn(move || drop(h)))
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Released, but only evicted by the cache itself
    assert!(cache.contains(DEVICE_1));
    assert_eq!(cache.ref_count(DEVICE_1), Some(0));
    assert_eq!(cache.collect(), 1);
    assert!(!cache.contains(DEVICE_1));
}

#[test]
fn test_reappearing_object_gets_new_facade() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![])]);
    let handle = cache.get_object(DEVICE_1).unwrap();
    let first = cache.view(DEVICE_1).unwrap().facade().unwrap();

    cache.apply_batch(vec![removed(DEVICE_1)]);
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![])]);

    let second = cache.view(DEVICE_1).unwrap().facade().unwrap();
    assert_ne!(first.id, second.id);
    assert!(cache.is_visible(DEVICE_1));
    // Same cached entry, so the handle still points at it
    assert_eq!(handle.path(), cache.view(DEVICE_1).unwrap().path());
    assert!(handle.path().ptr_eq(cache.view(DEVICE_1).unwrap().path()));
}

#[test]
fn test_properties_for_unknown_object_create_it() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![changed(MANAGER_PATH, IFACE_MANAGER, vec![("Version", Value::from("1.46.0"))])]);
    assert!(cache.is_visible(MANAGER_PATH));
    assert_eq!(cache.view(MANAGER_PATH).unwrap().str("version"), Some("1.46.0"));
}

#[test]
fn test_withdraw_and_reload() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![manager(&[DEVICE_1]), wired_device(DEVICE_1, vec![])]);
    assert!(cache.is_visible(MANAGER_PATH));
    assert!(cache.is_visible(DEVICE_1));

    let recorder = Recorder::attach(&mut cache);
    cache.withdraw_all();
    cache.settle();
    cache.flush();
    assert!(cache.is_empty());
    let removals = recorder
        .take()
        .into_iter()
        .filter(|n| matches!(n, Notification::ObjectRemoved { .. }))
        .count();
    assert_eq!(removals, 2);

    cache.apply_batch(vec![manager(&[DEVICE_1]), wired_device(DEVICE_1, vec![])]);
    assert_eq!(cache.visible_objects().len(), 2);
}
