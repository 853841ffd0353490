//! Cached objects and their per-interface data

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use nm_variant::Value;

use super::handle::ObjectCell;
use crate::catalog::{IfaceDescriptor, PropertyDescriptor, PropertyKind};
use crate::facade::Facade;
use crate::marshal::initial_scalar;
use crate::resolver::{AoSlot, OSlot};
use crate::types::{ObjState, RefPath};

/// Storage of one property
#[derive(Clone, Debug)]
pub(crate) enum PropSlot {
    /// Scalar and custom-converted values
    Scalar(Option<Value>),
    Ignored,
    Object(OSlot),
    Collection(AoSlot),
}

impl PropSlot {
    pub(crate) fn new(prop: &PropertyDescriptor) -> Self {
        match prop.kind {
            PropertyKind::Scalar(coerce) => PropSlot::Scalar(initial_scalar(prop.signature, coerce)),
            PropertyKind::Custom(_) => PropSlot::Scalar(None),
            PropertyKind::Ignored => PropSlot::Ignored,
            PropertyKind::Object(_) => PropSlot::Object(OSlot::default()),
            PropertyKind::Collection(_) => PropSlot::Collection(AoSlot::default()),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        match self {
            PropSlot::Object(slot) => slot.is_ready(),
            PropSlot::Collection(slot) => slot.is_ready(),
            PropSlot::Scalar(_) | PropSlot::Ignored => true,
        }
    }
}

/// Decoded properties of one interface of a cached object
#[derive(Debug)]
pub struct InterfaceData {
    pub(crate) desc: &'static IfaceDescriptor,
    /// Catalog position, for tie-breaking
    pub(crate) position: usize,
    /// Retracted by the peer; dropped at the next settle
    pub(crate) removed: bool,
    /// Parallel to `desc.properties`
    pub(crate) slots: Vec<PropSlot>,
}

impl InterfaceData {
    pub(crate) fn new(desc: &'static IfaceDescriptor, position: usize) -> Self {
        Self {
            desc,
            position,
            removed: false,
            slots: desc.properties.iter().map(PropSlot::new).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    pub fn descriptor(&self) -> &'static IfaceDescriptor {
        self.desc
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Stored scalar value of a property, by wire name
    pub fn value(&self, property: &str) -> Option<&Value> {
        let (idx, _) = self.desc.property(property)?;
        match &self.slots[idx] {
            PropSlot::Scalar(value) => value.as_ref(),
            _ => None,
        }
    }

    /// Target of an object reference, resolved or not
    pub fn target(&self, property: &str) -> Option<&RefPath> {
        let (idx, _) = self.desc.property(property)?;
        match &self.slots[idx] {
            PropSlot::Object(slot) => slot.target(),
            _ => None,
        }
    }

    /// Targets of a collection, in peer order, resolved or not
    pub fn targets(&self, property: &str) -> Vec<&RefPath> {
        match self.desc.property(property).map(|(idx, _)| &self.slots[idx]) {
            Some(PropSlot::Collection(slot)) => slot.targets().collect(),
            _ => Vec::new(),
        }
    }

    /// Pending references of a collection
    pub fn not_ready(&self, property: &str) -> Option<usize> {
        match self.desc.property(property).map(|(idx, _)| &self.slots[idx]) {
            Some(PropSlot::Collection(slot)) => Some(slot.not_ready()),
            Some(PropSlot::Object(slot)) => Some(usize::from(!slot.is_ready())),
            _ => None,
        }
    }

    fn rank(&self) -> (Reverse<crate::catalog::IfacePriority>, usize) {
        (Reverse(self.desc.priority), self.position)
    }
}

/// One remote object
#[derive(Debug)]
pub(crate) struct CachedObject {
    pub(crate) cell: Arc<ObjectCell>,
    pub(crate) state: ObjState,
    /// Highest priority first, then catalog order
    pub(crate) interfaces: Vec<InterfaceData>,
    pub(crate) facade: Option<Facade>,
    /// Holds the index link reference
    pub(crate) indexed: bool,
    /// The peer has confirmed this object at least once
    pub(crate) ever_linked: bool,
    /// Owner path to number of slots watching this object
    pub(crate) watchers: HashMap<RefPath, u32>,
}

impl CachedObject {
    pub(crate) fn new(path: RefPath) -> Self {
        Self {
            cell: ObjectCell::new(path),
            state: ObjState::Unlinked,
            interfaces: Vec::new(),
            facade: None,
            indexed: false,
            ever_linked: false,
            watchers: HashMap::new(),
        }
    }

    pub(crate) fn path(&self) -> &RefPath {
        &self.cell.path
    }

    pub(crate) fn live_interfaces(&self) -> impl Iterator<Item = &InterfaceData> {
        self.interfaces.iter().filter(|d| !d.removed)
    }

    pub(crate) fn interface(&self, name: &str) -> Option<&InterfaceData> {
        self.live_interfaces().find(|d| d.desc.name == name)
    }

    /// Position of the live data block for `desc`, creating it when missing
    pub(crate) fn attach(&mut self, desc: &'static IfaceDescriptor, position: usize) -> usize {
        if let Some(idx) = self.interfaces.iter().position(|d| !d.removed && d.desc.name == desc.name) {
            return idx;
        }
        let data = InterfaceData::new(desc, position);
        let idx = self.interfaces.partition_point(|d| d.rank() <= data.rank());
        self.interfaces.insert(idx, data);
        idx
    }

    /// Detach a block the peer retracted earlier in this cycle
    pub(crate) fn take_retracted(&mut self, name: &str) -> Option<InterfaceData> {
        let idx = self.interfaces.iter().position(|d| d.removed && d.desc.name == name)?;
        Some(self.interfaces.remove(idx))
    }

    /// Every reference slot of a live interface has finished resolving
    pub(crate) fn references_ready(&self) -> bool {
        self.live_interfaces().all(|d| d.slots.iter().all(PropSlot::is_ready))
    }
}
