//! Client Tests - the cache driven by a loopback service
//!
//! These tests cover:
//! - Initial load and incremental signals from the service
//! - Service restarts with a different object tree
//! - Remote calls: concurrency, timeouts and error replies

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use futures::future::join_all;
use nm_client::catalog::builtin::{IFACE_DEVICE, IFACE_DEVICE_WIRED, IFACE_MANAGER};
use nm_client::config::MANAGER_PATH;
use nm_client::{ClientConfig, ClientError, NmClient, Notification};
use nm_ipc::{IpcError, INTERFACE_PROPERTIES};
use nm_variant::Value;
use tracing::info;

fn device_paths(client: &NmClient<nm_ipc::LoopbackBus>) -> Vec<String> {
    client
        .object(MANAGER_PATH)
        .map(|m| m.objects("devices").iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_initial_load() {
    init_logging();
    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);

    let delivered = client.init().await.unwrap();
    assert!(delivered >= 2);
    assert!(client.is_visible(MANAGER_PATH));
    assert!(client.is_visible(DEVICE_1));
    assert_eq!(device_paths(&client), vec![DEVICE_1]);
    assert_eq!(client.object(MANAGER_PATH).unwrap().str("version"), Some("1.46.0"));
    assert_eq!(client.owner(), bus.owner().as_deref());
}

#[tokio::test]
async fn test_tree_follows_service() {
    init_logging();
    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    client.init().await.unwrap();
    let recorder = Recorder::attach(client.cache_mut());

    bus.add_interfaces(
        &path(DEVICE_2),
        vec![
            (IFACE_DEVICE.to_string(), props(vec![("Interface", Value::from("eth1")), ("Real", Value::Bool(true))])),
            (IFACE_DEVICE_WIRED.to_string(), props(vec![("Carrier", Value::Bool(false))])),
        ],
    )
    .unwrap();
    bus.set_properties(&path(MANAGER_PATH), IFACE_MANAGER, props(vec![("Devices", objs(&[DEVICE_1, DEVICE_2]))]))
        .unwrap();
    client.process_pending().await.unwrap();

    assert_eq!(device_paths(&client), vec![DEVICE_1, DEVICE_2]);
    assert_eq!(client.object(DEVICE_2).unwrap().string("interface"), "eth1");
    assert!(recorder.labels().contains(&format!("added:{}", DEVICE_2)));

    bus.set_properties(&path(MANAGER_PATH), IFACE_MANAGER, props(vec![("Devices", objs(&[DEVICE_2]))]))
        .unwrap();
    bus.remove_object(&path(DEVICE_1));
    client.process_pending().await.unwrap();

    assert_eq!(device_paths(&client), vec![DEVICE_2]);
    assert!(!client.is_visible(DEVICE_1));
    assert!(!client.cache().contains(DEVICE_1));
}

#[tokio::test]
async fn test_interface_specific_signal() {
    init_logging();
    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    client.init().await.unwrap();

    bus.emit(
        &path(DEVICE_1),
        IFACE_DEVICE,
        "StateChanged",
        vec![Value::U32(100), Value::U32(30), Value::U32(0)],
    );
    // Wrong argument types are dropped
    bus.emit(&path(DEVICE_1), IFACE_DEVICE, "StateChanged", vec![Value::from("up")]);
    client.process_pending().await.unwrap();

    assert_eq!(client.object(DEVICE_1).unwrap().u32("state"), Some(100));
}

#[tokio::test]
async fn test_restart_with_different_tree() {
    init_logging();
    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    client.init().await.unwrap();
    let handle = client.get_object(DEVICE_1).unwrap();
    let recorder = Recorder::attach(client.cache_mut());

    bus.stop();
    // Changes while stopped are not announced
    bus.remove_object(&path(DEVICE_1));
    bus.add_object(&path(DEVICE_2), IFACE_DEVICE, props(vec![("Interface", Value::from("wlan0"))]))
        .unwrap();
    bus.add_object(&path(DEVICE_2), IFACE_DEVICE_WIRED, props(vec![])).unwrap();
    bus.set_properties(&path(MANAGER_PATH), IFACE_MANAGER, props(vec![("Devices", objs(&[DEVICE_2]))]))
        .unwrap();

    client.process_next().await.unwrap();
    assert!(!client.is_running());
    assert!(client.cache().visible_objects().is_empty());
    // The handle keeps the entry alive, but it is no longer usable
    assert!(client.cache().contains(DEVICE_1));
    drop(handle);

    bus.start();
    client.process_next().await.unwrap();
    assert!(client.is_running());
    assert_eq!(device_paths(&client), vec![DEVICE_2]);
    assert!(!client.cache().contains(DEVICE_1));

    let labels = recorder.labels();
    let removed_at = labels.iter().position(|l| *l == format!("removed:{}", DEVICE_1)).unwrap();
    let added_at = labels.iter().position(|l| *l == format!("added:{}", DEVICE_2)).unwrap();
    assert!(removed_at < added_at);
}

#[tokio::test]
async fn test_concurrent_calls() {
    init_logging();
    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    client.init().await.unwrap();

    let stats = Arc::new(ConcurrentStats::new());
    let calls = (0..25).map(|i| {
        let client = &client;
        let stats = stats.clone();
        // Every fifth call asks for a property that does not exist
        let name = if i % 5 == 0 { "Missing" } else { "Interface" };
        async move {
            let result: nm_client::Result<String> = client
                .call(
                    DEVICE_1,
                    INTERFACE_PROPERTIES,
                    "Get",
                    vec![Value::from(IFACE_DEVICE), Value::from(name)],
                    None,
                )
                .await;
            match result {
                Ok(value) => {
                    assert_eq!(value, "eth0");
                    stats.record_success();
                }
                Err(_) => stats.record_failure(),
            }
        }
    });
    join_all(calls).await;

    info!("concurrent calls: {} ok, {} failed", stats.successes(), stats.failures());
    assert_eq!(stats.successes(), 20);
    assert_eq!(stats.failures(), 5);
    // Name lookup and initial load come first
    assert_eq!(bus.calls().len(), 2 + 25);
}

#[tokio::test]
async fn test_call_timeout() {
    init_logging();
    let bus = loopback_service();
    bus.start();
    let config = ClientConfig {
        call_timeout: Duration::from_millis(50),
        ..client_config()
    };
    let mut client = NmClient::new(bus.clone(), nm_client::Catalog::builtin().unwrap(), config);
    client.init().await.unwrap();

    bus.set_reply_delay(Some(Duration::from_millis(500)));
    let started = Instant::now();
    let result = client
        .set_property(DEVICE_1, IFACE_DEVICE, "Managed", Value::Bool(false), None)
        .await;
    assert!(matches!(result, Err(ClientError::Ipc(IpcError::Timeout(_)))));
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(client.object(DEVICE_1).unwrap().bool("managed"), Some(true));
}

#[tokio::test]
async fn test_error_reply_keeps_cache() {
    init_logging();
    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    client.init().await.unwrap();
    let recorder = Recorder::attach(client.cache_mut());

    let result = client
        .set_property(DEVICE_1, IFACE_DEVICE, "NoSuchProperty", Value::Bool(true), None)
        .await;
    assert!(matches!(result, Err(ClientError::Ipc(IpcError::MethodError { .. }))));

    client
        .set_property(DEVICE_1, IFACE_DEVICE, "Managed", Value::Bool(false), None)
        .await
        .unwrap();
    client.process_pending().await.unwrap();
    assert_eq!(client.object(DEVICE_1).unwrap().bool("managed"), Some(false));
    let seen = recorder.take();
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], Notification::PropertyChanged { property: "Managed", .. }));
}
