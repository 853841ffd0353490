//! Loopback walkthrough
//!
//! Drives one `NmClient` against the in-memory service through a short
//! session: initial load, a hot-plugged device, a property write and a
//! service restart. Every step prints the notifications observers saw, and
//! the run exits non-zero when any step's check fails.
//!
//! ```text
//! cargo run -p integration-tests
//! RUST_LOG=nm_client=trace cargo run -p integration-tests
//! ```
//!
//! The scenario tests themselves run under `cargo test -p integration-tests`.


use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use nm_client::catalog::builtin::{IFACE_DEVICE, IFACE_DEVICE_WIRED, IFACE_MANAGER};
use nm_client::config::MANAGER_PATH;
use nm_client::{ClientError, NmClient};
use nm_ipc::LoopbackBus;
use nm_variant::Value;

type Client = NmClient<LoopbackBus>;
type StepResult = Result<(), String>;
type StepFuture<'a> = Pin<Box<dyn Future<Output = StepResult> + 'a>>;

struct Session {
    bus: Arc<LoopbackBus>,
    client: Client,
    recorder: Recorder,
}

struct Step {
    name: &'static str,
    run: for<'a> fn(&'a mut Session) -> StepFuture<'a>,
}

const STEPS: &[Step] = &[
    Step {
        name: "initial load",
        run: initial_load,
    },
    Step {
        name: "device hot-plug",
        run: hot_plug,
    },
    Step {
        name: "property write",
        run: property_write,
    },
    Step {
        name: "service restart",
        run: service_restart,
    },
];

fn check(ok: bool, what: &str) -> StepResult {
    if ok {
        Ok(())
    } else {
        Err(what.to_string())
    }
}

fn client_err(err: ClientError) -> String {
    format!("client error: {}", err)
}

fn devices(client: &Client) -> Vec<String> {
    client
        .object(MANAGER_PATH)
        .map(|m| m.objects("devices").iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

fn initial_load(s: &mut Session) -> StepFuture<'_> {
    Box::pin(async move {
        s.client.init().await.map_err(client_err)?;
        check(s.client.is_visible(MANAGER_PATH), "manager not visible")?;
        check(devices(&s.client) == vec![DEVICE_1], "device list after load")
    })
}

fn hot_plug(s: &mut Session) -> StepFuture<'_> {
    Box::pin(async move {
        let eth1 = vec![
            (IFACE_DEVICE.to_string(), props(vec![("Interface", Value::from("eth1")), ("Real", Value::Bool(true))])),
            (IFACE_DEVICE_WIRED.to_string(), props(vec![("Carrier", Value::Bool(true))])),
        ];
        s.bus.add_interfaces(&path(DEVICE_2), eth1).map_err(|e| e.to_string())?;
        s.bus
            .set_properties(&path(MANAGER_PATH), IFACE_MANAGER, props(vec![("Devices", objs(&[DEVICE_1, DEVICE_2]))]))
            .map_err(|e| e.to_string())?;
        s.client.process_pending().await.map_err(client_err)?;
        check(devices(&s.client) == vec![DEVICE_1, DEVICE_2], "device list after hot-plug")
    })
}

fn property_write(s: &mut Session) -> StepFuture<'_> {
    Box::pin(async move {
        s.client
            .set_property(DEVICE_1, IFACE_DEVICE, "Managed", Value::Bool(false), None)
            .await
            .map_err(client_err)?;
        s.client.process_pending().await.map_err(client_err)?;
        let managed = s.client.object(DEVICE_1).map_err(client_err)?.bool("managed");
        check(managed == Some(false), "write not reflected in the cache")
    })
}

/// Owner loss withdraws everything; the new owner's tree is reloaded
fn service_restart(s: &mut Session) -> StepFuture<'_> {
    Box::pin(async move {
        s.bus.stop();
        s.client.process_next().await.map_err(client_err)?;
        check(s.client.cache().visible_objects().is_empty(), "objects left after owner loss")?;

        s.bus.start();
        s.client.process_next().await.map_err(client_err)?;
        check(s.client.is_running(), "client did not follow the new owner")?;
        check(devices(&s.client) == vec![DEVICE_1, DEVICE_2], "device list after reload")
    })
}

#[tokio::main]
async fn main() {
    init_logging();

    let bus = loopback_service();
    bus.start();
    let mut client = loopback_client(&bus);
    let recorder = Recorder::attach(client.cache_mut());
    let mut session = Session { bus, client, recorder };

    let mut results: Vec<(&'static str, Duration, StepResult)> = Vec::new();
    for step in STEPS {
        println!("-- {}", step.name);
        let start = Instant::now();
        let result = (step.run)(&mut session).await;
        for seen in session.recorder.take() {
            println!("   {}", label(&seen));
        }
        results.push((step.name, start.elapsed(), result));
    }

    println!();
    let mut failed = 0;
    for (name, took, result) in &results {
        match result {
            Ok(()) => println!("{:<20} ok    {:?}", name, took),
            Err(why) => {
                failed += 1;
                println!("{:<20} FAIL  {:?}  {}", name, took, why);
            }
        }
    }
    println!("\n{} of {} steps passed", results.len() - failed, results.len());
    if failed > 0 {
        std::process::exit(1);
    }
}
