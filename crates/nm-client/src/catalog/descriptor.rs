//! Interface, property, and signal descriptors
//!
//! Descriptors are plain `'static` data. A property is handled in exactly one
//! of five ways, chosen by its [`PropertyKind`]; object and collection kinds
//! carry an auxiliary spec with their readiness and observer configuration.

use nm_variant::{Coerce, Value};

use crate::cache::FacadeView;
use crate::facade::FacadeType;
use crate::notify::Notification;
use crate::types::RefPath;

/// Rank of an interface when choosing the facade type and when several
/// interfaces provide the same local field
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IfacePriority {
    /// Auxiliary data only, never picks a type
    None,
    /// The manager object itself
    Client,
    /// Contributes properties to a more specific type
    ParentType,
    InstantiateLow,
    InstantiateHigh,
}

impl IfacePriority {
    /// Whether an interface of this rank may choose the facade type
    pub fn instantiates(self) -> bool {
        matches!(
            self,
            IfacePriority::Client | IfacePriority::InstantiateLow | IfacePriority::InstantiateHigh
        )
    }
}

/// Where an interface's fields live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldBase {
    /// Directly on the cached object; readable as soon as data arrives
    Object,
    /// Behind the facade; unreadable until a facade exists
    Facade,
}

/// Conversion for [`PropertyKind::Custom`]; returns the value to store
pub type CustomFn = fn(&Value) -> std::result::Result<Value, String>;

/// Converts signal arguments into `(wire property, value)` updates
pub type SignalHandler = fn(&[Value]) -> Option<Vec<(&'static str, Value)>>;

/// Predicate over a resolved collection entry
pub type EntryFilter = fn(&FacadeView<'_>) -> bool;

/// Callback invoked on collection membership and readiness changes
pub type CollectionObserver = fn(&CollectionChange<'_>) -> Option<Notification>;

/// Configuration of a single object reference
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectRefSpec {
    /// Ready once the target has a facade, visible or not
    pub ready_without_visible: bool,
}

/// Configuration of an object reference collection
#[derive(Clone, Copy, Default)]
pub struct CollectionSpec {
    pub ready_without_visible: bool,
    pub observer: Option<CollectionObserver>,
    /// Entries rejected here are resolved but not exposed to readers
    pub filter: Option<EntryFilter>,
}

/// What happened to a collection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionEvent<'a> {
    /// An entry resolved to a target
    Added(&'a RefPath),
    /// A resolved entry went away
    Removed(&'a RefPath),
    /// The whole slot flipped readiness
    ReadinessChanged(bool),
}

/// Argument to a [`CollectionObserver`]
#[derive(Clone, Copy, Debug)]
pub struct CollectionChange<'a> {
    pub owner: &'a RefPath,
    pub interface: &'static str,
    pub property: &'static str,
    pub event: CollectionEvent<'a>,
}

/// How a property is stored
#[derive(Clone, Copy)]
pub enum PropertyKind {
    /// Copy-convert into the field
    Scalar(Coerce),
    /// Known but unused; accepted and discarded
    Ignored,
    /// Single object reference (`o`)
    Object(&'static ObjectRefSpec),
    /// Ordered object reference collection (`ao`)
    Collection(&'static CollectionSpec),
    Custom(CustomFn),
}

/// A property of a remote interface
#[derive(Clone, Copy)]
pub struct PropertyDescriptor {
    /// Name on the wire
    pub name: &'static str,
    pub signature: &'static str,
    /// Local field name
    pub field: &'static str,
    pub kind: PropertyKind,
}

impl PropertyDescriptor {
    pub const fn scalar(name: &'static str, signature: &'static str, field: &'static str, coerce: Coerce) -> Self {
        Self {
            name,
            signature,
            field,
            kind: PropertyKind::Scalar(coerce),
        }
    }

    pub const fn ignored(name: &'static str, signature: &'static str) -> Self {
        Self {
            name,
            signature,
            field: "",
            kind: PropertyKind::Ignored,
        }
    }

    pub const fn object(name: &'static str, field: &'static str, spec: &'static ObjectRefSpec) -> Self {
        Self {
            name,
            signature: "o",
            field,
            kind: PropertyKind::Object(spec),
        }
    }

    pub const fn collection(name: &'static str, field: &'static str, spec: &'static CollectionSpec) -> Self {
        Self {
            name,
            signature: "ao",
            field,
            kind: PropertyKind::Collection(spec),
        }
    }

    pub const fn custom(name: &'static str, signature: &'static str, field: &'static str, convert: CustomFn) -> Self {
        Self {
            name,
            signature,
            field,
            kind: PropertyKind::Custom(convert),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, PropertyKind::Object(_) | PropertyKind::Collection(_))
    }
}

/// A signal of a remote interface
#[derive(Clone, Copy)]
pub struct SignalDescriptor {
    pub name: &'static str,
    /// Concatenated argument signature
    pub signature: &'static str,
    pub handler: SignalHandler,
}

/// A remote interface
pub struct IfaceDescriptor {
    pub name: &'static str,
    pub priority: IfacePriority,
    /// Facade type this interface instantiates, if any
    pub facade: Option<&'static FacadeType>,
    pub base: FieldBase,
    /// Sorted by wire name
    pub properties: &'static [PropertyDescriptor],
    pub signals: &'static [SignalDescriptor],
}

impl IfaceDescriptor {
    /// Look up a property by wire name; returns its index and descriptor
    pub fn property(&self, name: &str) -> Option<(usize, &'static PropertyDescriptor)> {
        let props: &'static [PropertyDescriptor] = self.properties;
        props
            .binary_search_by(|p| p.name.cmp(name))
            .ok()
            .map(|idx| (idx, &props[idx]))
    }

    pub fn signal(&self, name: &str) -> Option<&'static SignalDescriptor> {
        let signals: &'static [SignalDescriptor] = self.signals;
        signals.iter().find(|s| s.name == name)
    }
}

impl std::fmt::Debug for IfaceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IfaceDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("properties", &self.properties.len())
            .finish()
    }
}
