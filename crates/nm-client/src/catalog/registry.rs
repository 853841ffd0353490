//! Catalog registry and startup validation

use std::collections::HashMap;

use nm_variant::Signature;

use super::descriptor::{IfaceDescriptor, PropertyKind};
use crate::types::CatalogError;

/// Immutable set of interface descriptors
///
/// Built once, validated, and then only read. Catalog order is significant:
/// it breaks ties between interfaces of equal priority.
pub struct Catalog {
    interfaces: Vec<&'static IfaceDescriptor>,
    by_name: HashMap<&'static str, usize>,
    /// Per interface, local field name to property index
    fields: Vec<HashMap<&'static str, usize>>,
}

impl Catalog {
    /// Validate and index `interfaces`
    pub fn new(interfaces: Vec<&'static IfaceDescriptor>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(interfaces.len());
        let mut fields = Vec::with_capacity(interfaces.len());

        for (pos, iface) in interfaces.iter().enumerate() {
            if by_name.insert(iface.name, pos).is_some() {
                return Err(CatalogError::DuplicateInterface(iface.name.to_string()));
            }
            validate_interface(iface)?;

            let mut field_index = HashMap::new();
            for (idx, prop) in iface.properties.iter().enumerate() {
                if !prop.field.is_empty() {
                    field_index.insert(prop.field, idx);
                }
            }
            fields.push(field_index);
        }

        Ok(Self {
            interfaces,
            by_name,
            fields,
        })
    }

    pub fn get(&self, name: &str) -> Option<&'static IfaceDescriptor> {
        self.by_name.get(name).map(|&pos| self.interfaces[pos])
    }

    /// Position of an interface in catalog order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Property index of a local field on an interface
    pub fn field_index(&self, interface: &str, field: &str) -> Option<usize> {
        let pos = self.position(interface)?;
        self.fields[pos].get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static IfaceDescriptor> + '_ {
        self.interfaces.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

fn validate_interface(iface: &IfaceDescriptor) -> Result<(), CatalogError> {
    for pair in iface.properties.windows(2) {
        if pair[0].name == pair[1].name {
            return Err(CatalogError::DuplicateProperty {
                interface: iface.name.to_string(),
                property: pair[1].name.to_string(),
            });
        }
        if pair[0].name > pair[1].name {
            return Err(CatalogError::Unsorted {
                interface: iface.name.to_string(),
                property: pair[1].name.to_string(),
            });
        }
    }

    for prop in iface.properties {
        if Signature::single(prop.signature).is_err() {
            return Err(CatalogError::InvalidSignature {
                interface: iface.name.to_string(),
                property: prop.name.to_string(),
                signature: prop.signature.to_string(),
            });
        }
        let expected = match prop.kind {
            PropertyKind::Object(_) => Some("o"),
            PropertyKind::Collection(_) => Some("ao"),
            _ => None,
        };
        if let Some(expected) = expected {
            if prop.signature != expected {
                return Err(CatalogError::KindMismatch {
                    interface: iface.name.to_string(),
                    property: prop.name.to_string(),
                    signature: prop.signature.to_string(),
                });
            }
        }
    }
    Ok(())
}
