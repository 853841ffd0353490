//! Read-only view of a cached object

use std::fmt;

use nm_variant::{str_not_null, Value};

use super::object::{CachedObject, InterfaceData, PropSlot};
use super::table::ObjectCache;
use crate::catalog::{FieldBase, IfaceDescriptor, PropertyDescriptor, PropertyKind};
use crate::facade::Facade;
use crate::types::{ObjState, RefPath};

/// Reads the fields of one cached object by local field name
///
/// When several live interfaces declare a field, the one with the highest
/// priority wins. Fields of facade-based interfaces read as absent until the
/// object has a facade; retracted interfaces are never read.
#[derive(Clone, Copy)]
pub struct FacadeView<'a> {
    cache: &'a ObjectCache,
    obj: &'a CachedObject,
}

impl<'a> FacadeView<'a> {
    pub(crate) fn new(cache: &'a ObjectCache, obj: &'a CachedObject) -> Self {
        Self { cache, obj }
    }

    pub fn path(&self) -> &'a RefPath {
        self.obj.path()
    }

    pub fn state(&self) -> ObjState {
        self.obj.state
    }

    pub fn facade(&self) -> Option<Facade> {
        self.obj.facade
    }

    pub fn facade_type(&self) -> Option<&'static str> {
        self.obj.facade.map(|f| f.type_name())
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.obj.interface(name).is_some()
    }

    fn field(&self, field: &str) -> Option<(&'a InterfaceData, &'static PropertyDescriptor, &'a PropSlot)> {
        let obj: &'a CachedObject = self.obj;
        for data in obj.live_interfaces() {
            if data.desc.base == FieldBase::Facade && obj.facade.is_none() {
                continue;
            }
            let desc: &'static IfaceDescriptor = data.desc;
            if let Some(idx) = self.cache.catalog.field_index(desc.name, field) {
                return Some((data, &desc.properties[idx], &data.slots[idx]));
            }
        }
        None
    }

    /// Stored value of a scalar or custom field
    pub fn value(&self, field: &str) -> Option<&'a Value> {
        match self.field(field)? {
            (_, _, PropSlot::Scalar(value)) => value.as_ref(),
            _ => None,
        }
    }

    pub fn str(&self, field: &str) -> Option<&'a str> {
        self.value(field).and_then(Value::as_str)
    }

    /// String field, empty when absent
    pub fn string(&self, field: &str) -> &'a str {
        str_not_null(self.str(field))
    }

    pub fn u32(&self, field: &str) -> Option<u32> {
        self.value(field).and_then(Value::as_u32)
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.value(field).and_then(Value::as_bool)
    }

    /// Resolved target of an object reference
    pub fn object(&self, field: &str) -> Option<RefPath> {
        match self.field(field)? {
            (_, _, PropSlot::Object(slot)) => slot.resolved_target().cloned(),
            _ => None,
        }
    }

    pub fn object_view(&self, field: &str) -> Option<FacadeView<'a>> {
        let target = self.object(field)?;
        self.cache.view(target.as_str())
    }

    /// Resolved targets of a collection that pass its filter, in peer order
    pub fn objects(&self, field: &str) -> Vec<RefPath> {
        let Some((_, prop, PropSlot::Collection(slot))) = self.field(field) else {
            return Vec::new();
        };
        let filter = match prop.kind {
            PropertyKind::Collection(spec) => spec.filter,
            _ => None,
        };
        slot.resolved()
            .filter(|target| match filter {
                Some(keep) => self.cache.view(target.as_str()).is_some_and(|view| keep(&view)),
                None => true,
            })
            .cloned()
            .collect()
    }
}

impl fmt::Debug for FacadeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacadeView")
            .field("path", self.path())
            .field("state", &self.obj.state)
            .field("facade", &self.facade_type())
            .finish()
    }
}
