//! Reference Tests - object and object-array properties across objects
//!
//! These tests cover:
//! - Device <-> active connection cycles broken by the device side
//! - References held pending until the peer announces their target
//! - Dangling references once a confirmed target is withdrawn
//! - Collection diffs, observer events and the device visibility filter

mod common;

use common::*;
use nm_client::catalog::builtin::{IFACE_DEVICE, IFACE_DEVICE_GENERIC, IFACE_IP4_CONFIG, IFACE_MANAGER};
use nm_client::config::MANAGER_PATH;
use nm_client::{Notification, ObjState};
use nm_variant::Value;

const IP4_9: &str = "/org/freedesktop/NetworkManager/IP4Config/9";

fn paths(list: Vec<nm_client::RefPath>) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_device_active_connection_cycle() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![
        wired_device(DEVICE_1, vec![("ActiveConnection", obj(ACTIVE_1))]),
        active_connection(ACTIVE_1, &[DEVICE_1]),
    ]);

    assert!(cache.is_visible(DEVICE_1));
    assert!(cache.is_visible(ACTIVE_1));
    let device = cache.view(DEVICE_1).unwrap();
    assert_eq!(device.object("active_connection").map(|p| p.to_string()), Some(ACTIVE_1.to_string()));
    let active = device.object_view("active_connection").unwrap();
    assert_eq!(paths(active.objects("devices")), vec![DEVICE_1]);
}

#[test]
fn test_unannounced_target_holds_owner_until_it_arrives() {
    init_logging();
    let mut cache = builtin_cache();
    let recorder = Recorder::attach(&mut cache);
    cache.apply_batch(vec![wired_device(DEVICE_1, vec![("Ip4Config", obj(IP4_9))])]);

    // The peer has not announced the target yet, so the device waits for it
    assert!(!cache.is_visible(DEVICE_1));
    assert_eq!(cache.state(DEVICE_1), Some(ObjState::FacadeNotReady));
    assert_eq!(cache.state(IP4_9), Some(ObjState::WatchedOnly));
    let data = cache.interface_data(DEVICE_1, IFACE_DEVICE).unwrap();
    assert_eq!(data.target("Ip4Config").map(|p| p.to_string()), Some(IP4_9.to_string()));
    assert_eq!(data.not_ready("Ip4Config"), Some(1));
    assert_eq!(recorder.len(), 0);

    cache.apply_batch(vec![added(IP4_9, IFACE_IP4_CONFIG, vec![("Gateway", Value::from("10.0.0.1"))])]);

    let device = cache.view(DEVICE_1).unwrap();
    let ip4 = device.object_view("ip4_config").unwrap();
    assert_eq!(ip4.str("gateway"), Some("10.0.0.1"));
    // The target is announced before the owner that waited on it
    assert_eq!(recorder.labels(), vec![format!("added:{}", IP4_9), format!("added:{}", DEVICE_1)]);
}

#[test]
fn test_withdrawn_target_is_dangling_for_new_owner() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![
        wired_device(DEVICE_1, vec![("Ip4Config", obj(IP4_9))]),
        added(IP4_9, IFACE_IP4_CONFIG, vec![]),
    ]);
    cache.apply_batch(vec![removed(IP4_9)]);

    cache.apply_batch(vec![wired_device(DEVICE_2, vec![("Ip4Config", obj(IP4_9))])]);
    assert!(cache.is_visible(DEVICE_2));
    assert_eq!(cache.view(DEVICE_2).unwrap().object("ip4_config"), None);
    let data = cache.interface_data(DEVICE_2, IFACE_DEVICE).unwrap();
    assert_eq!(data.not_ready("Ip4Config"), Some(0));
}

#[test]
fn test_target_removal_clears_reference() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![
        wired_device(DEVICE_1, vec![("Ip4Config", obj(IP4_9))]),
        added(IP4_9, IFACE_IP4_CONFIG, vec![]),
    ]);
    assert!(cache.view(DEVICE_1).unwrap().object("ip4_config").is_some());
    assert_eq!(cache.ref_count(IP4_9), Some(2));

    let recorder = Recorder::attach(&mut cache);
    cache.apply_batch(vec![removed(IP4_9)]);

    assert_eq!(cache.view(DEVICE_1).unwrap().object("ip4_config"), None);
    // Still watched by the device
    assert_eq!(cache.state(IP4_9), Some(ObjState::WatchedOnly));
    assert_eq!(
        recorder.labels(),
        vec![format!("removed:{}", IP4_9), format!("changed:{}:Ip4Config", DEVICE_1)]
    );

    cache.apply_batch(vec![changed(DEVICE_1, IFACE_DEVICE, vec![("Ip4Config", obj("/"))])]);
    assert!(!cache.contains(IP4_9));
}

#[test]
fn test_manager_filters_unreal_devices() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![
        manager(&[DEVICE_1, DEVICE_2]),
        wired_device(DEVICE_1, vec![("Real", Value::Bool(true))]),
        wired_device(DEVICE_2, vec![("Real", Value::Bool(false))]),
    ]);

    let manager_view = cache.view(MANAGER_PATH).unwrap();
    assert_eq!(paths(manager_view.objects("devices")), vec![DEVICE_1]);
    // The filter only affects readers
    let data = cache.interface_data(MANAGER_PATH, IFACE_MANAGER).unwrap();
    assert_eq!(data.targets("Devices").len(), 2);

    cache.apply_batch(vec![changed(DEVICE_2, IFACE_DEVICE, vec![("Real", Value::Bool(true))])]);
    assert_eq!(paths(cache.view(MANAGER_PATH).unwrap().objects("devices")), vec![DEVICE_1, DEVICE_2]);
}

#[test]
fn test_collection_entries_are_announced() {
    init_logging();
    let mut cache = builtin_cache();
    cache.apply_batch(vec![
        manager(&[DEVICE_1, DEVICE_2]),
        wired_device(DEVICE_1, vec![]),
        wired_device(DEVICE_2, vec![]),
    ]);
    let recorder = Recorder::attach(&mut cache);

    // d1 leaves the list, d3 joins it
    cache.apply_batch(vec![
        wired_device(DEVICE_3, vec![]),
        changed(MANAGER_PATH, IFACE_MANAGER, vec![("Devices", objs(&[DEVICE_2, DEVICE_3]))]),
    ]);

    let labels = recorder.labels();
    let position = |label: String| labels.iter().position(|l| *l == label).unwrap();
    let entry_removed = position(format!("entry-:{}:Devices:{}", MANAGER_PATH, DEVICE_1));
    let list_changed = position(format!("changed:{}:Devices", MANAGER_PATH));
    let device_added = position(format!("added:{}", DEVICE_3));
    let entry_added = position(format!("entry+:{}:Devices:{}", MANAGER_PATH, DEVICE_3));
    assert!(entry_removed < list_changed);
    assert!(list_changed < device_added);
    assert!(device_added < entry_added);
    assert_eq!(labels.len(), 4);

    // d1 is no longer watched but the peer still exports it
    assert!(cache.is_visible(DEVICE_1));
    assert_eq!(cache.ref_count(DEVICE_1), Some(1));
}

#[test]
fn test_untyped_target_does_not_hold_up_owner() {
    init_logging();
    let mut cache = builtin_cache();
    // Devices/2 exists on the bus but never gets a type
    cache.apply_batch(vec![
        manager(&[DEVICE_1, DEVICE_2]),
        wired_device(DEVICE_1, vec![]),
        added(DEVICE_2, IFACE_DEVICE, vec![]),
    ]);

    // A target without a facade counts as gone, so the manager is not held up
    assert!(cache.is_visible(MANAGER_PATH));
    assert_eq!(paths(cache.view(MANAGER_PATH).unwrap().objects("devices")), vec![DEVICE_1]);
    let data = cache.interface_data(MANAGER_PATH, IFACE_MANAGER).unwrap();
    assert_eq!(data.not_ready("Devices"), Some(0));

    let recorder = Recorder::attach(&mut cache);
    cache.apply_batch(vec![added(DEVICE_2, IFACE_DEVICE_GENERIC, vec![])]);
    assert_eq!(paths(cache.view(MANAGER_PATH).unwrap().objects("devices")), vec![DEVICE_1, DEVICE_2]);
    assert!(recorder
        .take()
        .iter()
        .any(|n| matches!(n, Notification::EntryAdded { target, .. } if target == DEVICE_2)));
}
