//! IPC boundary for the NetworkManager client cache
//!
//! This crate defines what the cache needs from a message bus and nothing
//! more:
//!
//! - [`Transport`]: method calls with a timeout, and signal subscriptions
//! - [`BusEvent`]: decoded object-manager, properties, and name-owner signals
//! - [`CancellationToken`]: abandon an in-flight call
//! - [`LoopbackBus`]: an in-memory peer exporting an object tree
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  MethodCall / reply   ┌──────────────────────┐
//! │  nm-client   │ ────────────────────▶ │  Transport           │
//! │  (cache)     │ ◀──────────────────── │  (socket, loopback)  │
//! └──────────────┘   Signal stream       └──────────────────────┘
//!        ▲
//!        │ BusEvent::from_signal
//! ```

mod error;
mod events;
mod loopback;
mod message;
mod transport;

pub use error::{IpcError, Result};
pub use events::{encode_interfaces, encode_managed_objects, managed_objects_to_events, BusEvent};
pub use loopback::{LoopbackBus, MethodHandler};
pub use message::{
    MatchRule, MethodCall, Signal, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE, ERROR_NAME_HAS_NO_OWNER,
    ERROR_SERVICE_UNKNOWN, ERROR_UNKNOWN_OBJECT, ERROR_UNKNOWN_PROPERTY, INTERFACE_OBJECT_MANAGER,
    INTERFACE_PROPERTIES,
};
pub use tokio_util::sync::CancellationToken;
pub use transport::{call_with_cancel, get_name_owner, SignalStream, Transport};
