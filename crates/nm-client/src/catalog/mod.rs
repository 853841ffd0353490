//! Interface metadata catalog
//!
//! Static descriptors of each remote interface: its properties (wire name,
//! signature, local field, storage kind), its signals, its priority, and the
//! facade type it instantiates.
//!
//! - [`IfaceDescriptor`] / [`PropertyDescriptor`]: the descriptor records
//! - [`Catalog`]: validated, indexed set of descriptors
//! - [`builtin`]: descriptors of the managed service

pub mod builtin;
mod descriptor;
mod registry;

pub use descriptor::{
    CollectionChange, CollectionEvent, CollectionObserver, CollectionSpec, CustomFn, EntryFilter, FieldBase,
    IfaceDescriptor, IfacePriority, ObjectRefSpec, PropertyDescriptor, PropertyKind, SignalDescriptor,
    SignalHandler,
};
pub use registry::Catalog;
