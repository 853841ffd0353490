//! In-memory bus peer
//!
//! [`LoopbackBus`] plays both the bus daemon and one remote service that
//! exports an object tree through the standard object-manager and properties
//! interfaces. Mutating the tree emits the same signals a real service would,
//! so the client cache can be driven end to end without a socket.
//!
//! ```text
//!   test code ──add_object / set_properties──▶ LoopbackBus ──Signal──▶ subscribers
//!   client    ──MethodCall──────────────────▶ LoopbackBus ──reply───▶ client
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nm_variant::{ObjectPath, PropMap, Value};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{IpcError, Result};
use crate::events::{encode_interfaces, encode_managed_objects};
use crate::message::{
    MatchRule, MethodCall, Signal, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE, ERROR_NAME_HAS_NO_OWNER,
    ERROR_SERVICE_UNKNOWN, ERROR_UNKNOWN_OBJECT, ERROR_UNKNOWN_PROPERTY, INTERFACE_OBJECT_MANAGER,
    INTERFACE_PROPERTIES,
};
use crate::transport::{SignalStream, Transport};

/// Handler for a custom method; runs without the bus lock held
pub type MethodHandler = Arc<dyn Fn(&LoopbackBus, &MethodCall) -> Result<Vec<Value>> + Send + Sync>;

/// In-memory bus with a single exported service
pub struct LoopbackBus {
    service: String,
    manager_path: ObjectPath,
    state: Mutex<LoopbackState>,
}

#[derive(Default)]
struct LoopbackState {
    owner: Option<String>,
    next_unique: u32,
    objects: BTreeMap<ObjectPath, Vec<(String, PropMap)>>,
    subscribers: Vec<(MatchRule, mpsc::UnboundedSender<Signal>)>,
    handlers: HashMap<(String, String), MethodHandler>,
    calls: Vec<MethodCall>,
    reply_delay: Option<Duration>,
}

impl LoopbackState {
    fn broadcast(&mut self, signal: Signal) {
        trace!("emit {}.{} on {}", signal.interface, signal.member, signal.path);
        self.subscribers.retain(|(rule, tx)| {
            if !rule.matches(&signal) {
                return !tx.is_closed();
            }
            tx.send(signal.clone()).is_ok()
        });
    }

    fn service_signal(&mut self, path: ObjectPath, interface: &str, member: &str, args: Vec<Value>) {
        // A service without an owner cannot emit anything
        if let Some(owner) = self.owner.clone() {
            self.broadcast(Signal::new(owner, path, interface, member, args));
        }
    }
}

impl LoopbackBus {
    /// Create a bus whose service `service` exports its object manager at
    /// `manager_path`. The service starts out not running.
    pub fn new(service: impl Into<String>, manager_path: ObjectPath) -> Self {
        Self {
            service: service.into(),
            manager_path,
            state: Mutex::new(LoopbackState::default()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Give the service an owner and announce it
    pub fn start(&self) {
        let mut st = self.state.lock();
        if st.owner.is_some() {
            return;
        }
        st.next_unique += 1;
        let owner = format!(":1.{}", st.next_unique);
        debug!("loopback service {} started as {}", self.service, owner);
        st.owner = Some(owner.clone());
        let signal = name_owner_changed(&self.service, "", &owner);
        st.broadcast(signal);
    }

    /// Drop the owner; the object tree is kept for the next start
    pub fn stop(&self) {
        let mut st = self.state.lock();
        let Some(old) = st.owner.take() else {
            return;
        };
        debug!("loopback service {} stopped", self.service);
        let signal = name_owner_changed(&self.service, &old, "");
        st.broadcast(signal);
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    pub fn owner(&self) -> Option<String> {
        self.state.lock().owner.clone()
    }

    /// Export interfaces on an object, emitting `InterfacesAdded`
    pub fn add_interfaces(&self, path: &ObjectPath, interfaces: Vec<(String, PropMap)>) -> Result<()> {
        let body = encode_interfaces(&interfaces)?;
        let mut st = self.state.lock();
        let entry = st.objects.entry(path.clone()).or_default();
        for (name, props) in interfaces {
            match entry.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => existing.extend(props),
                None => entry.push((name, props)),
            }
        }
        let manager = self.manager_path.clone();
        st.service_signal(
            manager,
            INTERFACE_OBJECT_MANAGER,
            "InterfacesAdded",
            vec![Value::ObjectPath(path.clone()), body],
        );
        Ok(())
    }

    /// Export one interface on an object
    pub fn add_object(&self, path: &ObjectPath, interface: &str, props: PropMap) -> Result<()> {
        self.add_interfaces(path, vec![(interface.to_string(), props)])
    }

    /// Update properties, emitting `PropertiesChanged`
    pub fn set_properties(&self, path: &ObjectPath, interface: &str, props: PropMap) -> Result<()> {
        let mut st = self.state.lock();
        let iface = st
            .objects
            .get_mut(path)
            .and_then(|ifaces| ifaces.iter_mut().find(|(n, _)| n == interface))
            .ok_or_else(|| IpcError::method_error(ERROR_UNKNOWN_OBJECT, format!("{} has no {}", path, interface)))?;
        iface.1.extend(props.clone());
        st.service_signal(
            path.clone(),
            INTERFACE_PROPERTIES,
            "PropertiesChanged",
            vec![
                Value::from(interface),
                Value::from_prop_map(props),
                Value::str_array(Vec::<String>::new()),
            ],
        );
        Ok(())
    }

    /// Remove some interfaces of an object, emitting `InterfacesRemoved`
    pub fn remove_interfaces(&self, path: &ObjectPath, interfaces: &[&str]) {
        let mut st = self.state.lock();
        if let Some(entry) = st.objects.get_mut(path) {
            entry.retain(|(name, _)| !interfaces.contains(&name.as_str()));
            if entry.is_empty() {
                st.objects.remove(path);
            }
        }
        let manager = self.manager_path.clone();
        st.service_signal(
            manager,
            INTERFACE_OBJECT_MANAGER,
            "InterfacesRemoved",
            vec![Value::ObjectPath(path.clone()), Value::str_array(interfaces.iter().copied())],
        );
    }

    /// Remove an object with all its interfaces
    pub fn remove_object(&self, path: &ObjectPath) {
        let names: Vec<String> = {
            let st = self.state.lock();
            match st.objects.get(path) {
                Some(ifaces) => ifaces.iter().map(|(n, _)| n.clone()).collect(),
                None => return,
            }
        };
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        self.remove_interfaces(path, &refs);
    }

    /// Emit an arbitrary signal from the service
    pub fn emit(&self, path: &ObjectPath, interface: &str, member: &str, args: Vec<Value>) {
        self.state.lock().service_signal(path.clone(), interface, member, args);
    }

    /// Current value of an exported property
    pub fn property(&self, path: &ObjectPath, interface: &str, name: &str) -> Option<Value> {
        let st = self.state.lock();
        st.objects
            .get(path)?
            .iter()
            .find(|(n, _)| n == interface)?
            .1
            .get(name)
            .cloned()
    }

    /// Register a handler for `interface.member`
    pub fn handle<F>(&self, interface: &str, member: &str, handler: F)
    where
        F: Fn(&LoopbackBus, &MethodCall) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .handlers
            .insert((interface.to_string(), member.to_string()), Arc::new(handler));
    }

    /// Delay every reply, for timeout and cancellation tests
    pub fn set_reply_delay(&self, delay: Option<Duration>) {
        self.state.lock().reply_delay = delay;
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state.lock().calls.clone()
    }

    fn dispatch(&self, call: &MethodCall) -> Result<Vec<Value>> {
        let mut st = self.state.lock();
        st.calls.push(call.clone());

        if call.destination == DBUS_SERVICE {
            return match (call.interface.as_str(), call.member.as_str()) {
                (DBUS_INTERFACE, "GetNameOwner") => {
                    let name = string_arg(call, 0)?;
                    match (&st.owner, name == self.service) {
                        (Some(owner), true) => Ok(vec![Value::from(owner.as_str())]),
                        _ => Err(IpcError::method_error(
                            ERROR_NAME_HAS_NO_OWNER,
                            format!("name {} has no owner", name),
                        )),
                    }
                }
                _ => Err(unknown_method(call)),
            };
        }

        if call.destination != self.service && Some(&call.destination) != st.owner.as_ref() {
            return Err(IpcError::method_error(
                ERROR_SERVICE_UNKNOWN,
                format!("{} is not provided", call.destination),
            ));
        }
        if st.owner.is_none() {
            return Err(IpcError::NotRunning);
        }

        match (call.interface.as_str(), call.member.as_str()) {
            (INTERFACE_OBJECT_MANAGER, "GetManagedObjects") => {
                let objects: Vec<(ObjectPath, Vec<(String, PropMap)>)> =
                    st.objects.iter().map(|(p, i)| (p.clone(), i.clone())).collect();
                Ok(vec![encode_managed_objects(&objects)?])
            }
            (INTERFACE_PROPERTIES, "Get") => {
                let iface = string_arg(call, 0)?;
                let name = string_arg(call, 1)?;
                let props = interface_props(&st, &call.path, &iface)?;
                let value = props.get(&name).cloned().ok_or_else(|| {
                    IpcError::method_error(ERROR_UNKNOWN_PROPERTY, format!("no property {}.{}", iface, name))
                })?;
                Ok(vec![Value::Variant(Box::new(value))])
            }
            (INTERFACE_PROPERTIES, "GetAll") => {
                let iface = string_arg(call, 0)?;
                let props = interface_props(&st, &call.path, &iface)?.clone();
                Ok(vec![Value::from_prop_map(props)])
            }
            (INTERFACE_PROPERTIES, "Set") => {
                let iface = string_arg(call, 0)?;
                let name = string_arg(call, 1)?;
                let value = call
                    .args
                    .get(2)
                    .map(|v| v.unwrap_variant().clone())
                    .ok_or_else(|| IpcError::InvalidArgs("Set: missing value".to_string()))?;
                let props = st
                    .objects
                    .get_mut(&call.path)
                    .and_then(|ifaces| ifaces.iter_mut().find(|(n, _)| *n == iface))
                    .map(|(_, props)| props)
                    .ok_or_else(|| IpcError::method_error(ERROR_UNKNOWN_OBJECT, call.path.to_string()))?;
                if !props.contains_key(&name) {
                    return Err(IpcError::method_error(
                        ERROR_UNKNOWN_PROPERTY,
                        format!("no property {}.{}", iface, name),
                    ));
                }
                props.insert(name.clone(), value.clone());
                let mut changed = PropMap::new();
                changed.insert(name, value);
                st.service_signal(
                    call.path.clone(),
                    INTERFACE_PROPERTIES,
                    "PropertiesChanged",
                    vec![
                        Value::from(iface.as_str()),
                        Value::from_prop_map(changed),
                        Value::str_array(Vec::<String>::new()),
                    ],
                );
                Ok(vec![])
            }
            (interface, member) => {
                let handler = st.handlers.get(&(interface.to_string(), member.to_string())).cloned();
                drop(st);
                match handler {
                    Some(handler) => handler(self, call),
                    None => Err(unknown_method(call)),
                }
            }
        }
    }
}

#[async_trait]
impl Transport for LoopbackBus {
    async fn call(&self, call: MethodCall, timeout: Duration) -> Result<Vec<Value>> {
        let delay = self.state.lock().reply_delay;
        let reply = async {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.dispatch(&call)
        };
        match tokio::time::timeout(timeout, reply).await {
            Ok(result) => result,
            Err(_) => Err(IpcError::Timeout(timeout)),
        }
    }

    fn subscribe(&self, rule: MatchRule) -> SignalStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().subscribers.push((rule, tx));
        rx
    }
}

fn name_owner_changed(name: &str, old: &str, new: &str) -> Signal {
    let path = ObjectPath::new(DBUS_PATH).unwrap_or_else(|_| ObjectPath::root());
    Signal::new(
        DBUS_SERVICE,
        path,
        DBUS_INTERFACE,
        "NameOwnerChanged",
        vec![Value::from(name), Value::from(old), Value::from(new)],
    )
}

fn interface_props<'a>(st: &'a LoopbackState, path: &ObjectPath, iface: &str) -> Result<&'a PropMap> {
    st.objects
        .get(path)
        .and_then(|ifaces| ifaces.iter().find(|(n, _)| n == iface))
        .map(|(_, props)| props)
        .ok_or_else(|| IpcError::method_error(ERROR_UNKNOWN_OBJECT, format!("{} has no {}", path, iface)))
}

fn string_arg(call: &MethodCall, index: usize) -> Result<String> {
    call.args
        .get(index)
        .map(Value::unwrap_variant)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| IpcError::InvalidArgs(format!("{}: argument {} must be a string", call.member, index)))
}

fn unknown_method(call: &MethodCall) -> IpcError {
    IpcError::UnknownMethod {
        interface: call.interface.clone(),
        member: call.member.clone(),
    }
}
