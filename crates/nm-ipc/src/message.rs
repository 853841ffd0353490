//! Method calls and signals

use nm_variant::{ObjectPath, Value};

/// Bus daemon well-known name
pub const DBUS_SERVICE: &str = "org.freedesktop.DBus";
/// Bus daemon object path
pub const DBUS_PATH: &str = "/org/freedesktop/DBus";
/// Bus daemon interface
pub const DBUS_INTERFACE: &str = "org.freedesktop.DBus";
/// Standard properties interface
pub const INTERFACE_PROPERTIES: &str = "org.freedesktop.DBus.Properties";
/// Standard object manager interface
pub const INTERFACE_OBJECT_MANAGER: &str = "org.freedesktop.DBus.ObjectManager";

pub const ERROR_SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
pub const ERROR_NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";
pub const ERROR_UNKNOWN_PROPERTY: &str = "org.freedesktop.DBus.Error.UnknownProperty";
pub const ERROR_UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";

/// An outgoing method call
#[derive(Clone, Debug, PartialEq)]
pub struct MethodCall {
    pub destination: String,
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(
        destination: impl Into<String>,
        path: ObjectPath,
        interface: impl Into<String>,
        member: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            destination: destination.into(),
            path,
            interface: interface.into(),
            member: member.into(),
            args,
        }
    }
}

/// An incoming signal
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    /// Unique name of the sender
    pub sender: String,
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub args: Vec<Value>,
}

impl Signal {
    pub fn new(
        sender: impl Into<String>,
        path: ObjectPath,
        interface: impl Into<String>,
        member: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            sender: sender.into(),
            path,
            interface: interface.into(),
            member: member.into(),
            args,
        }
    }
}

/// Signal subscription filter
///
/// Unset fields match anything. `path_namespace` matches the path itself
/// and every path below it, which is how a whole object tree is watched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchRule {
    pub sender: Option<String>,
    pub path_namespace: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
}

impl MatchRule {
    /// Match every signal
    pub fn all() -> Self {
        Self::default()
    }

    /// Match signals from one object path or any path below it
    pub fn path_namespace(path: impl Into<String>) -> Self {
        Self {
            path_namespace: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        if let Some(sender) = &self.sender {
            if sender != &signal.sender {
                return false;
            }
        }
        if let Some(ns) = &self.path_namespace {
            let path = signal.path.as_str();
            let inside = ns == "/"
                || path == ns
                || (path.starts_with(ns.as_str()) && path.as_bytes().get(ns.len()) == Some(&b'/'));
            if !inside {
                return false;
            }
        }
        if let Some(interface) = &self.interface {
            if interface != &signal.interface {
                return false;
            }
        }
        if let Some(member) = &self.member {
            if member != &signal.member {
                return false;
            }
        }
        true
    }
}
