//! Property marshaler
//!
//! Converts an incoming wire value into local storage according to its
//! [`PropertyDescriptor`], and reports whether the stored value changed.
//! Nothing here touches other objects: reference properties are only decoded
//! to paths, resolution is the cache's job.

mod mismatch;

pub use mismatch::MismatchTracker;

use nm_variant::{path_not_empty, str_not_empty, Bytes, Coerce, FromValue, ObjectPath, Value};

use crate::catalog::{CustomFn, PropertyDescriptor};
use crate::types::MarshalError;

/// Result type for marshaling
pub type Result<T> = std::result::Result<T, MarshalError>;

/// Reject values whose type disagrees with the descriptor
pub fn check_signature(interface: &str, prop: &PropertyDescriptor, value: &Value) -> Result<()> {
    if value.has_signature(prop.signature) {
        Ok(())
    } else {
        Err(MarshalError::TypeMismatch {
            interface: interface.to_string(),
            property: prop.name.to_string(),
            expected: prop.signature.to_string(),
            found: value.signature().as_str().to_string(),
        })
    }
}

/// Value a scalar field holds before any data arrives
///
/// Not-null strings and scalar lists start out empty rather than absent.
pub fn initial_scalar(signature: &str, coerce: Coerce) -> Option<Value> {
    if coerce != Coerce::NotNull {
        return None;
    }
    match signature {
        "s" => Some(Value::Str(String::new())),
        "ay" => Some(Value::ByteArray(Bytes::new())),
        sig if sig.starts_with('a') && !sig.starts_with("a{") => Value::array(&sig[1..], Vec::new()).ok(),
        _ => None,
    }
}

/// Apply the coercion rules to a type-checked value
fn coerce_value(signature: &str, coerce: Coerce, value: &Value) -> Option<Value> {
    match (signature, value) {
        // Object paths always treat "/" as "no object"
        ("o", Value::ObjectPath(p)) => path_not_empty(Some(p)).cloned().map(Value::ObjectPath),
        ("s", Value::Str(s)) if coerce == Coerce::NotEmpty => str_not_empty(Some(s.as_str())).map(Value::from),
        ("ay", v) => Bytes::from_value(v).ok().map(Value::ByteArray),
        _ => Some(value.clone()),
    }
}

/// Store a scalar property; returns whether the stored value changed
pub fn marshal_scalar(
    interface: &str,
    prop: &PropertyDescriptor,
    coerce: Coerce,
    value: &Value,
    slot: &mut Option<Value>,
) -> Result<bool> {
    check_signature(interface, prop, value)?;
    let new = coerce_value(prop.signature, coerce, value);
    Ok(replace(slot, new))
}

/// Store a property through its interface-supplied conversion
pub fn marshal_custom(
    interface: &str,
    prop: &PropertyDescriptor,
    convert: CustomFn,
    value: &Value,
    slot: &mut Option<Value>,
) -> Result<bool> {
    check_signature(interface, prop, value)?;
    let new = convert(value).map_err(|reason| MarshalError::Conversion {
        interface: interface.to_string(),
        property: prop.name.to_string(),
        reason,
    })?;
    Ok(replace(slot, Some(new)))
}

/// Decode an object reference; `/` means no target
pub fn decode_path(interface: &str, prop: &PropertyDescriptor, value: &Value) -> Result<Option<ObjectPath>> {
    check_signature(interface, prop, value)?;
    Ok(value.as_object_path().and_then(|p| path_not_empty(Some(p))).cloned())
}

/// Decode an object reference collection, dropping `/` and repeats while
/// keeping the peer's order
pub fn decode_paths(interface: &str, prop: &PropertyDescriptor, value: &Value) -> Result<Vec<ObjectPath>> {
    check_signature(interface, prop, value)?;
    let mut out: Vec<ObjectPath> = Vec::new();
    for item in value.as_array().unwrap_or(&[]) {
        if let Some(path) = item.as_object_path().and_then(|p| path_not_empty(Some(p))) {
            if !out.contains(path) {
                out.push(path.clone());
            }
        }
    }
    Ok(out)
}

fn replace(slot: &mut Option<Value>, new: Option<Value>) -> bool {
    if *slot == new {
        false
    } else {
        *slot = new;
        true
    }
}
