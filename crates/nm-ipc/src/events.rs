//! Bus events
//!
//! Raw [`Signal`]s are decoded into the small set of events the object cache
//! understands. Anything that is not an object-manager, properties, or
//! name-owner signal is passed through as [`BusEvent::Signal`] so interface
//! specific handlers can pick it up.

use nm_variant::{ObjectPath, PropMap, Value};

use crate::error::{IpcError, Result};
use crate::message::{DBUS_INTERFACE, INTERFACE_OBJECT_MANAGER, INTERFACE_PROPERTIES, Signal};

/// One decoded change notification from the bus
#[derive(Clone, Debug, PartialEq)]
pub enum BusEvent {
    /// Interfaces (with their initial properties) appeared on an object
    InterfacesAdded {
        path: ObjectPath,
        interfaces: Vec<(String, PropMap)>,
    },
    InterfacesRemoved {
        path: ObjectPath,
        interfaces: Vec<String>,
    },
    /// Property values changed on one interface of an object
    PropertiesChanged {
        path: ObjectPath,
        interface: String,
        changed: PropMap,
        /// Names whose values were invalidated without a new value
        invalidated: Vec<String>,
    },
    /// An object disappeared with all of its interfaces
    ObjectRemoved { path: ObjectPath },
    /// Ownership of a well-known name changed; empty owners are `None`
    NameOwnerChanged {
        name: String,
        old_owner: Option<String>,
        new_owner: Option<String>,
    },
    /// Any other signal
    Signal(Signal),
}

impl BusEvent {
    /// Object the event refers to, if any
    pub fn path(&self) -> Option<&ObjectPath> {
        match self {
            BusEvent::InterfacesAdded { path, .. }
            | BusEvent::InterfacesRemoved { path, .. }
            | BusEvent::PropertiesChanged { path, .. }
            | BusEvent::ObjectRemoved { path } => Some(path),
            BusEvent::Signal(signal) => Some(&signal.path),
            BusEvent::NameOwnerChanged { .. } => None,
        }
    }

    /// Decode a raw signal
    pub fn from_signal(signal: Signal) -> Result<BusEvent> {
        match (signal.interface.as_str(), signal.member.as_str()) {
            (INTERFACE_OBJECT_MANAGER, "InterfacesAdded") => {
                let path = arg(&signal, 0)?
                    .as_object_path()
                    .cloned()
                    .ok_or_else(|| invalid(&signal, "object path"))?;
                let interfaces = decode_interfaces(arg(&signal, 1)?)?;
                Ok(BusEvent::InterfacesAdded { path, interfaces })
            }
            (INTERFACE_OBJECT_MANAGER, "InterfacesRemoved") => {
                let path = arg(&signal, 0)?
                    .as_object_path()
                    .cloned()
                    .ok_or_else(|| invalid(&signal, "object path"))?;
                let interfaces = string_list(arg(&signal, 1)?).ok_or_else(|| invalid(&signal, "as"))?;
                Ok(BusEvent::InterfacesRemoved { path, interfaces })
            }
            (INTERFACE_PROPERTIES, "PropertiesChanged") => {
                let interface = arg(&signal, 0)?
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(&signal, "interface name"))?;
                let changed = arg(&signal, 1)?.to_prop_map()?;
                let invalidated = match signal.args.get(2) {
                    Some(v) => string_list(v).ok_or_else(|| invalid(&signal, "as"))?,
                    None => Vec::new(),
                };
                Ok(BusEvent::PropertiesChanged {
                    path: signal.path,
                    interface,
                    changed,
                    invalidated,
                })
            }
            (DBUS_INTERFACE, "NameOwnerChanged") => {
                let mut names = Vec::with_capacity(3);
                for i in 0..3 {
                    let s = arg(&signal, i)?.as_str().ok_or_else(|| invalid(&signal, "s"))?;
                    names.push(s.to_string());
                }
                let new_owner = names.pop().filter(|s| !s.is_empty());
                let old_owner = names.pop().filter(|s| !s.is_empty());
                let name = names.pop().unwrap_or_default();
                Ok(BusEvent::NameOwnerChanged {
                    name,
                    old_owner,
                    new_owner,
                })
            }
            _ => Ok(BusEvent::Signal(signal)),
        }
    }
}

/// Decode a `GetManagedObjects` reply (`a{oa{sa{sv}}}`) into one
/// [`BusEvent::InterfacesAdded`] per object
pub fn managed_objects_to_events(reply: &[Value]) -> Result<Vec<BusEvent>> {
    let objects = reply
        .first()
        .ok_or_else(|| IpcError::InvalidArgs("empty GetManagedObjects reply".to_string()))?;
    let entries = objects
        .as_dict()
        .ok_or_else(|| IpcError::InvalidArgs(format!("expected a{{oa{{sa{{sv}}}}}}, got {}", objects.signature())))?;

    let mut events = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let path = key
            .as_object_path()
            .cloned()
            .ok_or_else(|| IpcError::InvalidArgs(format!("expected object path key, got {}", key.signature())))?;
        let interfaces = decode_interfaces(value)?;
        events.push(BusEvent::InterfacesAdded { path, interfaces });
    }
    Ok(events)
}

/// Build the body of an `InterfacesAdded` signal or a managed-objects entry
pub fn encode_interfaces(interfaces: &[(String, PropMap)]) -> Result<Value> {
    let entries = interfaces
        .iter()
        .map(|(name, props)| (Value::from(name.as_str()), Value::from_prop_map(props.clone())))
        .collect();
    Ok(Value::dict("s", "a{sv}", entries)?)
}

/// Build a `GetManagedObjects` reply body
pub fn encode_managed_objects(objects: &[(ObjectPath, Vec<(String, PropMap)>)]) -> Result<Value> {
    let entries = objects
        .iter()
        .map(|(path, ifaces)| Ok((Value::ObjectPath(path.clone()), encode_interfaces(ifaces)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::dict("o", "a{sa{sv}}", entries)?)
}

fn decode_interfaces(value: &Value) -> Result<Vec<(String, PropMap)>> {
    let entries = value
        .unwrap_variant()
        .as_dict()
        .ok_or_else(|| IpcError::InvalidArgs(format!("expected a{{sa{{sv}}}}, got {}", value.signature())))?;
    let mut interfaces = Vec::with_capacity(entries.len());
    for (name, props) in entries {
        let name = name
            .as_str()
            .ok_or_else(|| IpcError::InvalidArgs(format!("expected interface name, got {}", name.signature())))?;
        interfaces.push((name.to_string(), props.to_prop_map()?));
    }
    Ok(interfaces)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .unwrap_variant()
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn arg(signal: &Signal, index: usize) -> Result<&Value> {
    signal
        .args
        .get(index)
        .ok_or_else(|| IpcError::InvalidArgs(format!("{}.{}: missing argument {}", signal.interface, signal.member, index)))
}

fn invalid(signal: &Signal, what: &str) -> IpcError {
    IpcError::InvalidArgs(format!("{}.{}: expected {}", signal.interface, signal.member, what))
}
