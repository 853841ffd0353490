//! Facade types
//!
//! A facade is the local face of a remote object once its concrete type is
//! known. Facades carry no data of their own; all reads go through a
//! [`FacadeView`] of the cached object.

use crate::cache::FacadeView;

/// Visibility predicate of a facade type
pub type VisibleFn = fn(&FacadeView<'_>) -> bool;

/// A concrete local type
pub struct FacadeType {
    pub name: &'static str,
    /// `None` means always visible
    pub visible: Option<VisibleFn>,
}

impl FacadeType {
    pub const fn new(name: &'static str) -> Self {
        Self { name, visible: None }
    }

    pub const fn with_visibility(name: &'static str, visible: VisibleFn) -> Self {
        Self {
            name,
            visible: Some(visible),
        }
    }

    pub fn is_visible(&self, view: &FacadeView<'_>) -> bool {
        match self.visible {
            Some(pred) => pred(view),
            None => true,
        }
    }
}

impl std::fmt::Debug for FacadeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacadeType")
            .field("name", &self.name)
            .field("has_predicate", &self.visible.is_some())
            .finish()
    }
}

/// A live facade instance
#[derive(Clone, Copy, Debug)]
pub struct Facade {
    pub kind: &'static FacadeType,
    /// Distinct per instance; a type change yields a new id
    pub id: u64,
}

impl Facade {
    pub fn type_name(&self) -> &'static str {
        self.kind.name
    }

    pub fn is_type(&self, kind: &'static FacadeType) -> bool {
        std::ptr::eq(self.kind, kind)
    }
}
