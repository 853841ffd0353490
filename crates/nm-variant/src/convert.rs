//! Conversions between wire values and Rust types
//!
//! | Signature | Rust type           |
//! |-----------|---------------------|
//! | `b`       | `bool`              |
//! | `y`       | `u8`                |
//! | `n` / `q` | `i16` / `u16`       |
//! | `i` / `u` | `i32` / `u32`       |
//! | `x` / `t` | `i64` / `u64`       |
//! | `d`       | `f64`               |
//! | `s`       | `String`            |
//! | `o`       | `ObjectPath`        |
//! | `ay`      | `Bytes`             |
//! | `as`      | `Vec<String>`       |
//! | `ao`      | `Vec<ObjectPath>`   |
//! | `au`      | `Vec<u32>`          |

use bytes::Bytes;

use crate::{ObjectPath, Result, Signature, Value, VariantError};

/// Types that can be read out of a [`Value`]
pub trait FromValue: Sized {
    /// Signature this type decodes from
    const SIGNATURE: &'static str;

    /// Convert a value of exactly [`Self::SIGNATURE`]
    fn from_value(value: &Value) -> Result<Self>;
}

/// Types that can be turned into a [`Value`]
pub trait IntoValue {
    fn into_value(self) -> Value;
}

fn mismatch(expected: &str, value: &Value) -> VariantError {
    VariantError::mismatch(expected, value.signature().as_str())
}

macro_rules! impl_value_primitive {
    ($ty:ty, $variant:ident, $sig:expr) => {
        impl FromValue for $ty {
            const SIGNATURE: &'static str = $sig;

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(*v),
                    other => Err(mismatch($sig, other)),
                }
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_value_primitive!(bool, Bool, "b");
impl_value_primitive!(u8, Byte, "y");
impl_value_primitive!(i16, I16, "n");
impl_value_primitive!(u16, U16, "q");
impl_value_primitive!(i32, I32, "i");
impl_value_primitive!(u32, U32, "u");
impl_value_primitive!(i64, I64, "x");
impl_value_primitive!(u64, U64, "t");
impl_value_primitive!(f64, Double, "d");

impl FromValue for String {
    const SIGNATURE: &'static str = "s";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(mismatch("s", other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl FromValue for ObjectPath {
    const SIGNATURE: &'static str = "o";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::ObjectPath(p) => Ok(p.clone()),
            other => Err(mismatch("o", other)),
        }
    }
}

impl IntoValue for ObjectPath {
    fn into_value(self) -> Value {
        Value::ObjectPath(self)
    }
}

impl FromValue for Bytes {
    const SIGNATURE: &'static str = "ay";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::ByteArray(b) => Ok(b.clone()),
            // A generic byte array is accepted as well
            Value::Array { element, items } if element.as_str() == "y" => items
                .iter()
                .map(u8::from_value)
                .collect::<Result<Vec<u8>>>()
                .map(Bytes::from),
            other => Err(mismatch("ay", other)),
        }
    }
}

impl IntoValue for Bytes {
    fn into_value(self) -> Value {
        Value::ByteArray(self)
    }
}

macro_rules! impl_value_vec {
    ($ty:ty, $sig:expr, $elem:expr) => {
        impl FromValue for Vec<$ty> {
            const SIGNATURE: &'static str = $sig;

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Array { element, items } if element.as_str() == $elem => {
                        items.iter().map(<$ty>::from_value).collect()
                    }
                    other => Err(mismatch($sig, other)),
                }
            }
        }

        impl IntoValue for Vec<$ty> {
            fn into_value(self) -> Value {
                Value::Array {
                    element: Signature::from_computed($elem.to_string()),
                    items: self.into_iter().map(IntoValue::into_value).collect(),
                }
            }
        }
    };
}

impl_value_vec!(String, "as", "s");
impl_value_vec!(ObjectPath, "ao", "o");
impl_value_vec!(u32, "au", "u");
