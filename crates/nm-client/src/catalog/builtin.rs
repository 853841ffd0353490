//! Builtin catalog of the managed service's interfaces

use std::sync::{Arc, OnceLock};

use nm_variant::{Coerce, Value};

use super::descriptor::{
    CollectionChange, CollectionEvent, CollectionSpec, FieldBase, IfaceDescriptor, IfacePriority, ObjectRefSpec,
    PropertyDescriptor as P, SignalDescriptor,
};
use super::registry::Catalog;
use crate::cache::FacadeView;
use crate::facade::FacadeType;
use crate::notify::Notification;
use crate::types::CatalogError;

pub const IFACE_MANAGER: &str = "org.freedesktop.NetworkManager";
pub const IFACE_DEVICE: &str = "org.freedesktop.NetworkManager.Device";
pub const IFACE_DEVICE_STATISTICS: &str = "org.freedesktop.NetworkManager.Device.Statistics";
pub const IFACE_DEVICE_WIRED: &str = "org.freedesktop.NetworkManager.Device.Wired";
pub const IFACE_DEVICE_WIRELESS: &str = "org.freedesktop.NetworkManager.Device.Wireless";
pub const IFACE_DEVICE_GENERIC: &str = "org.freedesktop.NetworkManager.Device.Generic";
pub const IFACE_ACTIVE_CONNECTION: &str = "org.freedesktop.NetworkManager.Connection.Active";
pub const IFACE_VPN_CONNECTION: &str = "org.freedesktop.NetworkManager.VPN.Connection";
pub const IFACE_IP4_CONFIG: &str = "org.freedesktop.NetworkManager.IP4Config";
pub const IFACE_ACCESS_POINT: &str = "org.freedesktop.NetworkManager.AccessPoint";
pub const IFACE_SETTINGS_CONNECTION: &str = "org.freedesktop.NetworkManager.Settings.Connection";

pub static CLIENT: FacadeType = FacadeType::new("Client");
pub static DEVICE_ETHERNET: FacadeType = FacadeType::new("DeviceEthernet");
pub static DEVICE_WIFI: FacadeType = FacadeType::new("DeviceWifi");
pub static DEVICE_GENERIC: FacadeType = FacadeType::new("DeviceGeneric");
pub static ACTIVE_CONNECTION: FacadeType = FacadeType::new("ActiveConnection");
pub static VPN_CONNECTION: FacadeType = FacadeType::new("VpnConnection");
pub static IP4_CONFIG: FacadeType = FacadeType::new("Ip4Config");
pub static ACCESS_POINT: FacadeType = FacadeType::new("AccessPoint");
pub static REMOTE_CONNECTION: FacadeType = FacadeType::new("RemoteConnection");

const STRICT_REF: ObjectRefSpec = ObjectRefSpec {
    ready_without_visible: false,
};

// Device -> active connection -> device is a cycle; the device side breaks it
const CYCLE_BREAKING_REF: ObjectRefSpec = ObjectRefSpec {
    ready_without_visible: true,
};

const STRICT_LIST: CollectionSpec = CollectionSpec {
    ready_without_visible: false,
    observer: None,
    filter: None,
};

const MANAGER_DEVICES: CollectionSpec = CollectionSpec {
    ready_without_visible: false,
    observer: Some(announce_entries),
    filter: Some(device_is_real),
};

const MANAGER_ACTIVE_CONNECTIONS: CollectionSpec = CollectionSpec {
    ready_without_visible: false,
    observer: Some(announce_entries),
    filter: None,
};

fn announce_entries(change: &CollectionChange<'_>) -> Option<Notification> {
    match change.event {
        CollectionEvent::Added(target) => Some(Notification::EntryAdded {
            owner: change.owner.clone(),
            property: change.property,
            target: target.clone(),
        }),
        CollectionEvent::Removed(target) => Some(Notification::EntryRemoved {
            owner: change.owner.clone(),
            property: change.property,
            target: target.clone(),
        }),
        CollectionEvent::ReadinessChanged(_) => None,
    }
}

fn device_is_real(view: &FacadeView<'_>) -> bool {
    view.bool("real").unwrap_or(true)
}

fn state_reason(value: &Value) -> Result<Value, String> {
    match value.as_struct() {
        Some([Value::U32(_), Value::U32(_)]) => Ok(value.clone()),
        _ => Err(format!("malformed state reason {}", value.signature())),
    }
}

/// `aa{sv}` address records flattened to `address/prefix` strings
fn address_data(value: &Value) -> Result<Value, String> {
    let records = value.as_array().ok_or("address data is not an array")?;
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let map = record.to_prop_map().map_err(|e| e.to_string())?;
        let address = map.get("address").and_then(Value::as_str).ok_or("address record without address")?;
        let prefix = map.get("prefix").and_then(Value::as_u32).ok_or("address record without prefix")?;
        out.push(format!("{}/{}", address, prefix));
    }
    Ok(Value::str_array(out))
}

fn device_state_changed(args: &[Value]) -> Option<Vec<(&'static str, Value)>> {
    match args {
        [Value::U32(new), Value::U32(_old), Value::U32(reason)] => Some(vec![
            ("State", Value::U32(*new)),
            ("StateReason", Value::Struct(vec![Value::U32(*new), Value::U32(*reason)])),
        ]),
        _ => None,
    }
}

fn active_state_changed(args: &[Value]) -> Option<Vec<(&'static str, Value)>> {
    match args {
        [Value::U32(state), Value::U32(_reason)] => Some(vec![("State", Value::U32(*state))]),
        _ => None,
    }
}

fn vpn_state_changed(args: &[Value]) -> Option<Vec<(&'static str, Value)>> {
    match args {
        [Value::U32(state), Value::U32(_reason)] => Some(vec![("VpnState", Value::U32(*state))]),
        _ => None,
    }
}

pub static MANAGER: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_MANAGER,
    priority: IfacePriority::Client,
    facade: Some(&CLIENT),
    base: FieldBase::Object,
    properties: &[
        P::object("ActivatingConnection", "activating_connection", &STRICT_REF),
        P::collection("ActiveConnections", "active_connections", &MANAGER_ACTIVE_CONNECTIONS),
        P::collection("AllDevices", "all_devices", &STRICT_LIST),
        P::scalar("Capabilities", "au", "capabilities", Coerce::NotNull),
        P::scalar("Connectivity", "u", "connectivity", Coerce::AsIs),
        P::scalar("ConnectivityCheckAvailable", "b", "connectivity_check_available", Coerce::AsIs),
        P::scalar("ConnectivityCheckEnabled", "b", "connectivity_check_enabled", Coerce::AsIs),
        P::scalar("ConnectivityCheckUri", "s", "connectivity_check_uri", Coerce::NotEmpty),
        P::collection("Devices", "devices", &MANAGER_DEVICES),
        P::scalar("Metered", "u", "metered", Coerce::AsIs),
        P::scalar("NetworkingEnabled", "b", "networking_enabled", Coerce::AsIs),
        P::object("PrimaryConnection", "primary_connection", &STRICT_REF),
        P::scalar("PrimaryConnectionType", "s", "primary_connection_type", Coerce::NotNull),
        P::scalar("Startup", "b", "startup", Coerce::AsIs),
        P::scalar("State", "u", "state", Coerce::AsIs),
        P::scalar("Version", "s", "version", Coerce::NotEmpty),
        P::ignored("WimaxEnabled", "b"),
        P::scalar("WirelessEnabled", "b", "wireless_enabled", Coerce::AsIs),
        P::scalar("WirelessHardwareEnabled", "b", "wireless_hardware_enabled", Coerce::AsIs),
    ],
    signals: &[],
};

pub static DEVICE: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_DEVICE,
    priority: IfacePriority::ParentType,
    facade: None,
    base: FieldBase::Object,
    properties: &[
        P::object("ActiveConnection", "active_connection", &CYCLE_BREAKING_REF),
        P::scalar("Autoconnect", "b", "autoconnect", Coerce::AsIs),
        P::collection("AvailableConnections", "available_connections", &STRICT_LIST),
        P::scalar("DeviceType", "u", "device_type", Coerce::AsIs),
        P::scalar("Driver", "s", "driver", Coerce::NotEmpty),
        P::scalar("FirmwareVersion", "s", "firmware_version", Coerce::NotEmpty),
        P::scalar("Interface", "s", "interface", Coerce::NotNull),
        P::object("Ip4Config", "ip4_config", &STRICT_REF),
        P::scalar("IpInterface", "s", "ip_interface", Coerce::NotEmpty),
        P::scalar("Managed", "b", "managed", Coerce::AsIs),
        P::scalar("Mtu", "u", "mtu", Coerce::AsIs),
        P::scalar("Real", "b", "real", Coerce::AsIs),
        P::scalar("State", "u", "state", Coerce::AsIs),
        P::custom("StateReason", "(uu)", "state_reason", state_reason),
        P::scalar("Udi", "s", "udi", Coerce::NotEmpty),
    ],
    signals: &[SignalDescriptor {
        name: "StateChanged",
        signature: "uuu",
        handler: device_state_changed,
    }],
};

pub static DEVICE_STATISTICS: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_DEVICE_STATISTICS,
    priority: IfacePriority::None,
    facade: None,
    base: FieldBase::Object,
    properties: &[
        P::scalar("RefreshRateMs", "u", "refresh_rate_ms", Coerce::AsIs),
        P::scalar("RxBytes", "t", "rx_bytes", Coerce::AsIs),
        P::scalar("TxBytes", "t", "tx_bytes", Coerce::AsIs),
    ],
    signals: &[],
};

pub static DEVICE_WIRED: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_DEVICE_WIRED,
    priority: IfacePriority::InstantiateHigh,
    facade: Some(&DEVICE_ETHERNET),
    base: FieldBase::Facade,
    properties: &[
        P::scalar("Carrier", "b", "carrier", Coerce::AsIs),
        P::scalar("HwAddress", "s", "hw_address", Coerce::NotNull),
        P::scalar("PermHwAddress", "s", "perm_hw_address", Coerce::NotNull),
        P::scalar("S390Subchannels", "as", "s390_subchannels", Coerce::NotNull),
        P::scalar("Speed", "u", "speed", Coerce::AsIs),
    ],
    signals: &[],
};

pub static DEVICE_WIRELESS: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_DEVICE_WIRELESS,
    priority: IfacePriority::InstantiateHigh,
    facade: Some(&DEVICE_WIFI),
    base: FieldBase::Facade,
    properties: &[
        P::collection("AccessPoints", "access_points", &STRICT_LIST),
        P::object("ActiveAccessPoint", "active_access_point", &STRICT_REF),
        P::scalar("Bitrate", "u", "bitrate", Coerce::AsIs),
        P::scalar("HwAddress", "s", "hw_address", Coerce::NotNull),
        P::scalar("LastScan", "x", "last_scan", Coerce::AsIs),
        P::scalar("Mode", "u", "mode", Coerce::AsIs),
        P::scalar("PermHwAddress", "s", "perm_hw_address", Coerce::NotNull),
        P::scalar("WirelessCapabilities", "u", "wireless_capabilities", Coerce::AsIs),
    ],
    signals: &[],
};

pub static DEVICE_GENERIC_IFACE: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_DEVICE_GENERIC,
    priority: IfacePriority::InstantiateHigh,
    facade: Some(&DEVICE_GENERIC),
    base: FieldBase::Facade,
    properties: &[
        P::scalar("HwAddress", "s", "hw_address", Coerce::NotNull),
        P::scalar("TypeDescription", "s", "type_description", Coerce::NotEmpty),
    ],
    signals: &[],
};

pub static ACTIVE: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_ACTIVE_CONNECTION,
    priority: IfacePriority::InstantiateLow,
    facade: Some(&ACTIVE_CONNECTION),
    base: FieldBase::Object,
    properties: &[
        P::object("Connection", "connection", &STRICT_REF),
        P::scalar("Default", "b", "default", Coerce::AsIs),
        P::scalar("Default6", "b", "default6", Coerce::AsIs),
        P::collection("Devices", "devices", &STRICT_LIST),
        P::scalar("Id", "s", "id", Coerce::NotNull),
        P::object("Ip4Config", "ip4_config", &STRICT_REF),
        P::scalar("SpecificObject", "o", "specific_object", Coerce::NotEmpty),
        P::scalar("State", "u", "state", Coerce::AsIs),
        P::scalar("StateFlags", "u", "state_flags", Coerce::AsIs),
        P::scalar("Type", "s", "type", Coerce::NotNull),
        P::scalar("Uuid", "s", "uuid", Coerce::NotNull),
        P::scalar("Vpn", "b", "vpn", Coerce::AsIs),
    ],
    signals: &[SignalDescriptor {
        name: "StateChanged",
        signature: "uu",
        handler: active_state_changed,
    }],
};

pub static VPN: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_VPN_CONNECTION,
    priority: IfacePriority::InstantiateHigh,
    facade: Some(&VPN_CONNECTION),
    base: FieldBase::Facade,
    properties: &[
        P::scalar("Banner", "s", "banner", Coerce::NotNull),
        P::scalar("VpnState", "u", "vpn_state", Coerce::AsIs),
    ],
    signals: &[SignalDescriptor {
        name: "VpnStateChanged",
        signature: "uu",
        handler: vpn_state_changed,
    }],
};

pub static IP4: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_IP4_CONFIG,
    priority: IfacePriority::InstantiateHigh,
    facade: Some(&IP4_CONFIG),
    base: FieldBase::Object,
    properties: &[
        P::custom("AddressData", "aa{sv}", "addresses", address_data),
        P::scalar("Domains", "as", "domains", Coerce::NotNull),
        P::scalar("Gateway", "s", "gateway", Coerce::NotEmpty),
        P::ignored("Nameservers", "au"),
        P::scalar("Searches", "as", "searches", Coerce::NotNull),
    ],
    signals: &[],
};

pub static AP: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_ACCESS_POINT,
    priority: IfacePriority::InstantiateHigh,
    facade: Some(&ACCESS_POINT),
    base: FieldBase::Object,
    properties: &[
        P::scalar("Flags", "u", "flags", Coerce::AsIs),
        P::scalar("Frequency", "u", "frequency", Coerce::AsIs),
        P::scalar("HwAddress", "s", "hw_address", Coerce::NotNull),
        P::scalar("LastSeen", "i", "last_seen", Coerce::AsIs),
        P::scalar("Mode", "u", "mode", Coerce::AsIs),
        P::scalar("Ssid", "ay", "ssid", Coerce::AsIs),
        P::scalar("Strength", "y", "strength", Coerce::AsIs),
    ],
    signals: &[],
};

pub static SETTINGS_CONNECTION: IfaceDescriptor = IfaceDescriptor {
    name: IFACE_SETTINGS_CONNECTION,
    priority: IfacePriority::InstantiateHigh,
    facade: Some(&REMOTE_CONNECTION),
    base: FieldBase::Object,
    properties: &[
        P::scalar("Filename", "s", "filename", Coerce::NotEmpty),
        P::scalar("Flags", "u", "flags", Coerce::AsIs),
        P::scalar("Unsaved", "b", "unsaved", Coerce::AsIs),
    ],
    signals: &[],
};

/// Every builtin interface, in tie-breaking order
pub fn builtin_interfaces() -> Vec<&'static IfaceDescriptor> {
    vec![
        &MANAGER,
        &DEVICE,
        &DEVICE_STATISTICS,
        &DEVICE_WIRED,
        &DEVICE_WIRELESS,
        &DEVICE_GENERIC_IFACE,
        &ACTIVE,
        &VPN,
        &IP4,
        &AP,
        &SETTINGS_CONNECTION,
    ]
}

impl Catalog {
    /// Shared, validated builtin catalog
    pub fn builtin() -> Result<Arc<Catalog>, CatalogError> {
        static BUILTIN: OnceLock<Result<Arc<Catalog>, CatalogError>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Catalog::new(builtin_interfaces()).map(Arc::new))
            .clone()
    }
}
