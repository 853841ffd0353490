//! Wire values
//!
//! A [`Value`] is a decoded IPC value that always knows its own type
//! signature, including empty containers.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::signature::is_basic;
use crate::{ObjectPath, Result, Signature, VariantError};

/// Property dictionary (`a{sv}`) with variants already unwrapped
pub type PropMap = BTreeMap<String, Value>;

/// A typed wire value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Double(f64),
    Str(String),
    ObjectPath(ObjectPath),
    Signature(Signature),
    /// Byte array (`ay`), kept contiguous
    ByteArray(Bytes),
    /// Homogeneous array with its element signature
    Array { element: Signature, items: Vec<Value> },
    /// Dictionary with key and value signatures
    Dict {
        key: Signature,
        value: Signature,
        entries: Vec<(Value, Value)>,
    },
    Struct(Vec<Value>),
    Variant(Box<Value>),
}

impl Value {
    /// Type signature of this value
    pub fn signature(&self) -> Signature {
        Signature::from_computed(self.signature_string())
    }

    fn signature_string(&self) -> String {
        match self {
            Value::Bool(_) => "b".to_string(),
            Value::Byte(_) => "y".to_string(),
            Value::I16(_) => "n".to_string(),
            Value::U16(_) => "q".to_string(),
            Value::I32(_) => "i".to_string(),
            Value::U32(_) => "u".to_string(),
            Value::I64(_) => "x".to_string(),
            Value::U64(_) => "t".to_string(),
            Value::Double(_) => "d".to_string(),
            Value::Str(_) => "s".to_string(),
            Value::ObjectPath(_) => "o".to_string(),
            Value::Signature(_) => "g".to_string(),
            Value::ByteArray(_) => "ay".to_string(),
            Value::Array { element, .. } => format!("a{}", element),
            Value::Dict { key, value, .. } => format!("a{{{}{}}}", key, value),
            Value::Struct(fields) => {
                let inner: String = fields.iter().map(|f| f.signature_string()).collect();
                format!("({})", inner)
            }
            Value::Variant(_) => "v".to_string(),
        }
    }

    /// Whether this value has exactly the given signature
    pub fn has_signature(&self, sig: &str) -> bool {
        match (self, sig) {
            // Cheap paths for the common scalar cases
            (Value::Str(_), "s") | (Value::U32(_), "u") | (Value::Bool(_), "b") => true,
            (Value::ObjectPath(_), "o") | (Value::ByteArray(_), "ay") => true,
            (Value::Array { element, .. }, s) => s.strip_prefix('a') == Some(element.as_str()),
            _ => self.signature_string() == sig,
        }
    }

    /// Build an array; `element` must be a single complete type
    pub fn array(element: &str, items: Vec<Value>) -> Result<Self> {
        let element = Signature::single(element)?;
        if let Some(bad) = items.iter().find(|v| !v.has_signature(element.as_str())) {
            return Err(VariantError::mismatch(element.as_str(), bad.signature().as_str()));
        }
        Ok(Value::Array { element, items })
    }

    /// Build a string array (`as`)
    pub fn str_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Array {
            element: Signature::from_computed("s".to_string()),
            items: items.into_iter().map(|s| Value::Str(s.into())).collect(),
        }
    }

    /// Build an object path array (`ao`)
    pub fn path_array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = ObjectPath>,
    {
        Value::Array {
            element: Signature::from_computed("o".to_string()),
            items: items.into_iter().map(Value::ObjectPath).collect(),
        }
    }

    /// Build a dictionary; `key` must be a basic type
    pub fn dict(key: &str, value: &str, entries: Vec<(Value, Value)>) -> Result<Self> {
        if key.len() != 1 || !is_basic(key.as_bytes()[0]) {
            return Err(VariantError::InvalidSignature(format!("a{{{}{}}}", key, value)));
        }
        let key_sig = Signature::single(key)?;
        let value_sig = Signature::single(value)?;
        for (k, v) in &entries {
            if !k.has_signature(key_sig.as_str()) {
                return Err(VariantError::mismatch(key_sig.as_str(), k.signature().as_str()));
            }
            if !v.has_signature(value_sig.as_str()) {
                return Err(VariantError::mismatch(value_sig.as_str(), v.signature().as_str()));
            }
        }
        Ok(Value::Dict {
            key: key_sig,
            value: value_sig,
            entries,
        })
    }

    /// Entries of a dictionary value
    pub fn as_dict(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Dict { entries, .. } => Some(entries),
            _ => None,
        }
    }

    /// Build a property dictionary (`a{sv}`)
    pub fn from_prop_map(map: PropMap) -> Self {
        Value::Dict {
            key: Signature::from_computed("s".to_string()),
            value: Signature::from_computed("v".to_string()),
            entries: map
                .into_iter()
                .map(|(k, v)| (Value::Str(k), Value::Variant(Box::new(v))))
                .collect(),
        }
    }

    /// Convert an `a{sv}` dictionary into a [`PropMap`], unwrapping variants
    pub fn to_prop_map(&self) -> Result<PropMap> {
        match self.unwrap_variant() {
            Value::Dict { key, value, entries } if key.as_str() == "s" && value.as_str() == "v" => {
                let mut map = PropMap::new();
                for (k, v) in entries {
                    let name = k.as_str().ok_or_else(|| VariantError::mismatch("s", k.signature().as_str()))?;
                    map.insert(name.to_string(), v.unwrap_variant().clone());
                }
                Ok(map)
            }
            other => Err(VariantError::mismatch("a{sv}", other.signature().as_str())),
        }
    }

    /// Peel any number of variant wrappers
    pub fn unwrap_variant(&self) -> &Value {
        let mut cur = self;
        while let Value::Variant(inner) = cur {
            cur = inner;
        }
        cur
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object_path(&self) -> Option<&ObjectPath> {
        match self {
            Value::ObjectPath(p) => Some(p),
            _ => None,
        }
    }

    /// Items of an array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[Value]> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ObjectPath> for Value {
    fn from(p: ObjectPath) -> Self {
        Value::ObjectPath(p)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::ByteArray(b)
    }
}
