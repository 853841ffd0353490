//! Wire value runtime for the NetworkManager client cache
//!
//! This crate provides the typed value layer shared by the IPC boundary and
//! the property marshaler.
//!
//! # Value model
//!
//! Every [`Value`] knows its type signature, so a property can be checked
//! against its declared type before anything is stored:
//! - Scalars carry their width and signedness
//! - Containers carry their element signatures, even when empty
//! - Property dictionaries (`a{sv}`) are exposed as [`PropMap`] with variants
//!   unwrapped

mod coerce;
mod convert;
mod error;
mod path;
mod signature;
mod value;

pub use coerce::{path_not_empty, str_not_empty, str_not_null, strv_not_null, Coerce};
pub use convert::{FromValue, IntoValue};
pub use error::{Result, VariantError};
pub use path::ObjectPath;
pub use signature::{is_basic, validate_single, Signature, MAX_NESTING, MAX_SIGNATURE_LEN};
pub use value::{PropMap, Value};

/// Re-export bytes for convenience
pub use bytes::Bytes;
