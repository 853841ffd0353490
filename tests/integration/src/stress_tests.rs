//! Stress Tests - large trees and many threads
//!
//! These tests push the cache with:
//! - Hundreds of objects announced and withdrawn in single batches
//! - Handles dropped concurrently from many threads
//! - Signal storms that must coalesce into few notifications
//! - Many overlapping remote calls

mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use futures::future::join_all;
use nm_client::catalog::builtin::{IFACE_DEVICE, IFACE_MANAGER};
use nm_client::config::MANAGER_PATH;
use nm_client::Notification;
use nm_ipc::INTERFACE_PROPERTIES;
use nm_variant::Value;

fn device_path(i: usize) -> String {
    format!("/org/freedesktop/NetworkManager/Devices/{}", i)
}

fn device_batch(range: std::ops::Range<usize>) -> (Vec<String>, Vec<nm_ipc::BusEvent>) {
    let paths: Vec<String> = range.map(device_path).collect();
    let events = paths
        .iter()
        .map(|p| wired_device(p, vec![("Interface", Value::from(p.rsplit('/').next().unwrap_or("")))]))
        .collect();
    (paths, events)
}

/// Test: one batch announcing many devices and the manager listing them
#[test]
fn test_large_tree_single_batch() {
    init_logging();

    const NUM_DEVICES: usize = 500;

    let mut cache = builtin_cache();
    let recorder = Recorder::attach(&mut cache);
    let (paths, mut events) = device_batch(0..NUM_DEVICES);
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    events.push(manager(&refs));

    let start = Instant::now();
    cache.apply_batch(events);
    let elapsed = start.elapsed();

    println!("\n=== Large Tree Results ===");
    println!("Objects: {}", cache.len());
    println!("Settle + flush: {:?}", elapsed);

    assert_eq!(cache.visible_objects().len(), NUM_DEVICES + 1);
    assert_eq!(cache.view(MANAGER_PATH).unwrap().objects("devices").len(), NUM_DEVICES);
    let added = recorder
        .take()
        .iter()
        .filter(|n| matches!(n, Notification::ObjectAdded { .. }))
        .count();
    assert_eq!(added, NUM_DEVICES + 1);

    // Drop every other device from the bus and the manager's list
    let mut kept: Vec<&str> = Vec::new();
    let mut gone: Vec<&str> = Vec::new();
    for (i, p) in refs.iter().enumerate() {
        if i % 2 == 0 {
            kept.push(*p);
        } else {
            gone.push(*p);
        }
    }
    let mut events: Vec<_> = gone.iter().map(|p| removed(p)).collect();
    events.push(changed(MANAGER_PATH, IFACE_MANAGER, vec![("Devices", objs(&kept))]));
    cache.apply_batch(events);

    assert_eq!(cache.view(MANAGER_PATH).unwrap().objects("devices").len(), kept.len());
    assert_eq!(cache.len(), kept.len() + 1);
    let removals = recorder
        .take()
        .iter()
        .filter(|n| matches!(n, Notification::ObjectRemoved { .. }))
        .count();
    assert_eq!(removals, gone.len());
}

/// Test: handles dropped from many threads at once after the peer is gone
#[test]
fn test_handles_dropped_from_many_threads() {
    init_logging();

    const NUM_DEVICES: usize = 200;
    const NUM_THREADS: usize = 8;
    const HANDLES_PER_DEVICE: usize = 4;

    let mut cache = builtin_cache();
    let (paths, events) = device_batch(0..NUM_DEVICES);
    cache.apply_batch(events);

    let mut handles = Vec::new();
    for p in &paths {
        for _ in 0..HANDLES_PER_DEVICE {
            handles.push(cache.get_object(p).unwrap());
        }
    }
    assert_eq!(cache.ref_count(&paths[0]), Some(1 + HANDLES_PER_DEVICE as u32));

    cache.withdraw_all();
    cache.settle();
    cache.flush();
    assert!(cache.visible_objects().is_empty());
    assert_eq!(cache.len(), NUM_DEVICES);

    // Deal the handles out round-robin so every object is shared between threads
    let mut shares: Vec<Vec<_>> = (0..NUM_THREADS).map(|_| Vec::new()).collect();
    for (i, handle) in handles.into_iter().enumerate() {
        shares[i % NUM_THREADS].push(handle);
    }

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let stats = Arc::new(ConcurrentStats::new());
    let workers: Vec<_> = shares
        .into_iter()
        .map(|share| {
            let barrier = barrier.clone();
            let stats = stats.clone();
            thread::spawn(move || {
                barrier.wait();
                for handle in share {
                    if handle.ref_count() > 0 {
                        stats.record_success();
                    } else {
                        stats.record_failure();
                    }
                    drop(handle);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    println!("\n=== Concurrent Release Results ===");
    println!("Handles dropped: {}", stats.successes());

    assert_eq!(stats.successes(), (NUM_DEVICES * HANDLES_PER_DEVICE) as u64);
    assert_eq!(stats.failures(), 0);
    assert_eq!(cache.collect(), NUM_DEVICES);
    assert!(cache.is_empty());
}

/// Test: a burst of property updates coalesces into one notification
#[tokio::test]
async fn test_signal_storm_coalesces() {
    init_logging();

    const NUM_UPDATES: u32 = 1000;

    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    client.init().await.unwrap();
    let recorder = Recorder::attach(client.cache_mut());

    for mtu in 1..=NUM_UPDATES {
        bus.set_properties(&path(DEVICE_1), IFACE_DEVICE, props(vec![("Mtu", Value::U32(mtu))]))
            .unwrap();
    }

    let start = Instant::now();
    let delivered = client.process_pending().await.unwrap();
    println!("\n=== Signal Storm Results ===");
    println!("Signals: {} | Delivered: {} | Took: {:?}", NUM_UPDATES, delivered, start.elapsed());

    assert_eq!(delivered, 1);
    assert_eq!(recorder.labels(), vec![format!("changed:{}:Mtu", DEVICE_1)]);
    assert_eq!(client.object(DEVICE_1).unwrap().u32("mtu"), Some(NUM_UPDATES));
}

/// Test: many slow calls in flight at once
#[tokio::test]
async fn test_overlapping_calls() {
    init_logging();

    const NUM_CALLS: usize = 100;
    const REPLY_DELAY: Duration = Duration::from_millis(20);

    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    client.init().await.unwrap();
    bus.set_reply_delay(Some(REPLY_DELAY));

    let stats = Arc::new(ConcurrentStats::new());
    let client = &client;
    let calls = (0..NUM_CALLS).map(|_| {
        let stats = stats.clone();
        async move {
            let result: nm_client::Result<bool> = client
                .call(
                    DEVICE_1,
                    INTERFACE_PROPERTIES,
                    "Get",
                    vec![Value::from(IFACE_DEVICE), Value::from("Managed")],
                    None,
                )
                .await;
            match result {
                Ok(true) => stats.record_success(),
                _ => stats.record_failure(),
            }
        }
    });

    let start = Instant::now();
    join_all(calls).await;
    let elapsed = start.elapsed();

    println!("\n=== Overlapping Calls Results ===");
    println!("Calls: {} | Successful: {} | Took: {:?}", NUM_CALLS, stats.successes(), elapsed);

    assert_eq!(stats.successes(), NUM_CALLS as u64);
    // Sequential calls would take NUM_CALLS * REPLY_DELAY
    assert!(elapsed < REPLY_DELAY * (NUM_CALLS as u32) / 4, "calls did not overlap: {:?}", elapsed);
}
