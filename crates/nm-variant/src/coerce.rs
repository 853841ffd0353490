//! Scalar coercion rules
//!
//! Local fields never expose a half-defined state: a "not-null" string is
//! always a string, a "not-empty" string is either non-empty or absent, and
//! an object path of `/` means "no object".

use crate::ObjectPath;

/// Coercion applied when a scalar is stored
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Coerce {
    /// Store as received
    #[default]
    AsIs,
    /// Absent strings become `""`
    NotNull,
    /// Empty strings (and `/` paths) become absent
    NotEmpty,
}

/// Absent becomes the empty string
pub fn str_not_null(s: Option<&str>) -> &str {
    s.unwrap_or("")
}

/// Empty becomes absent
pub fn str_not_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// `""` and `/` become absent
pub fn path_not_empty(p: Option<&ObjectPath>) -> Option<&ObjectPath> {
    p.filter(|p| !p.is_root() && !p.as_str().is_empty())
}

/// Absent string lists become the empty slice
pub fn strv_not_null(v: Option<&[String]>) -> &[String] {
    v.unwrap_or(&[])
}
