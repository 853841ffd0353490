//! Object paths

use std::fmt;

use crate::{Result, VariantError};

/// A validated object path (`/org/example/Object_1`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Parse and validate an object path
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    /// The root path `/`, which the peer uses to mean "no object"
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ObjectPath {
    type Error = VariantError;

    fn try_from(s: &str) -> Result<Self> {
        ObjectPath::new(s)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = VariantError;

    fn try_from(s: String) -> Result<Self> {
        ObjectPath::new(s)
    }
}

/// Validate the object path grammar
pub fn validate(s: &str) -> Result<()> {
    if !s.starts_with('/') {
        return Err(VariantError::InvalidObjectPath(format!("'{}' does not start with '/'", s)));
    }
    if s == "/" {
        return Ok(());
    }
    if s.ends_with('/') {
        return Err(VariantError::InvalidObjectPath(format!("'{}' ends with '/'", s)));
    }
    for element in s[1..].split('/') {
        if element.is_empty() {
            return Err(VariantError::InvalidObjectPath(format!("'{}' has an empty element", s)));
        }
        if !element.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(VariantError::InvalidObjectPath(format!(
                "'{}' has invalid characters in '{}'",
                s, element
            )));
        }
    }
    Ok(())
}
