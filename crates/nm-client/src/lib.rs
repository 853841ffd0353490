//! NetworkManager client object cache
//!
//! This crate mirrors the object tree a remote network-management service
//! exports over a message bus, keeps it consistent as change signals arrive,
//! and tells local observers what changed once each batch has settled.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        NmClient                             │
//! │  signal batches, owner tracking, remote calls               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Catalog          │  ObjectCache           │  NotifyQueue   │
//! │  - descriptors    │  - interface data      │  - priorities  │
//! │  - priorities     │  - lifecycle states    │  - subscribers │
//! │  - field index    │  - ref counting        │                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Marshal (value checks, coercion)  │  Resolver (O / AO)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │          nm-ipc (Transport, BusEvent)  /  nm-variant         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! - **Facade**: the local typed object chosen for a remote object from its
//!   highest-priority interface
//! - **Reference slot**: an object-valued property; it watches its target and
//!   only resolves once the target is usable
//! - **Settle**: after a batch, facades are chosen, references resolved, and
//!   visibility decided until nothing changes
//! - **Flush**: queued notifications are delivered in priority order
//!
//! # Modules
//!
//! - [`catalog`]: interface descriptors and the builtin catalog
//! - [`marshal`]: converting incoming values into stored fields
//! - [`resolver`]: object and object-array reference slots
//! - [`cache`]: the object table, lifecycle, and views
//! - [`notify`]: notifications, priorities, and subscriptions

pub mod cache;
pub mod catalog;
pub mod config;
pub mod facade;
pub mod marshal;
pub mod notify;
pub mod resolver;
pub mod types;

mod client;

pub use cache::{FacadeView, InterfaceData, ObjectCache, ObjectHandle};
pub use catalog::{Catalog, IfaceDescriptor, IfacePriority, PropertyDescriptor};
pub use client::NmClient;
pub use config::{ClientConfig, ProtocolLogLevel};
pub use facade::{Facade, FacadeType};
pub use notify::{Emitter, Notification, Priority, SubscriptionFilter, SubscriptionId};
pub use types::{CatalogError, ClientError, MarshalError, ObjState, RefPath, Result};

pub use nm_ipc::CancellationToken;
