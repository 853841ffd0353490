//! Type signatures
//!
//! Signatures follow the usual IPC type grammar:
//!
//! | Code | Type            | Code  | Type              |
//! |------|-----------------|-------|-------------------|
//! | `b`  | boolean         | `s`   | string            |
//! | `y`  | byte            | `o`   | object path       |
//! | `n`  | int16           | `g`   | signature         |
//! | `q`  | uint16          | `v`   | variant           |
//! | `i`  | int32           | `aT`  | array of T        |
//! | `u`  | uint32          | `a{KV}` | dict, K basic   |
//! | `x`  | int64           | `(..)` | struct           |
//! | `t`  | uint64          | `d`   | double            |

use std::fmt;

use crate::{Result, VariantError};

/// Maximum signature length
pub const MAX_SIGNATURE_LEN: usize = 255;

/// Maximum nesting of arrays and structs
pub const MAX_NESTING: usize = 32;

/// A validated type signature made of zero or more complete types
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Signature(String);

impl Signature {
    /// Parse and validate a signature
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    /// Parse a signature that must hold exactly one complete type
    pub fn single(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        validate_single(&s)?;
        Ok(Self(s))
    }

    /// The empty signature
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element signature if this is an array type (`aT` yields `T`)
    pub fn element(&self) -> Option<&str> {
        self.0.strip_prefix('a')
    }

    /// Split into its complete types
    pub fn complete_types(&self) -> Vec<&str> {
        let bytes = self.0.as_bytes();
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            // Already validated, so parsing cannot fail here
            let end = match parse_complete(bytes, pos, 0) {
                Ok(end) => end,
                Err(_) => break,
            };
            out.push(&self.0[pos..end]);
            pos = end;
        }
        out
    }

    /// Build without validation (for signatures computed from values)
    pub(crate) fn from_computed(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Signature {
    type Error = VariantError;

    fn try_from(s: &str) -> Result<Self> {
        Signature::new(s)
    }
}

/// Check whether a type code is a basic (non-container) type
pub fn is_basic(code: u8) -> bool {
    matches!(
        code,
        b'y' | b'b' | b'n' | b'q' | b'i' | b'u' | b'x' | b't' | b'd' | b's' | b'o' | b'g' | b'h'
    )
}

/// Validate a signature made of any number of complete types
pub fn validate(s: &str) -> Result<()> {
    if s.len() > MAX_SIGNATURE_LEN {
        return Err(VariantError::InvalidSignature(format!(
            "signature longer than {} bytes",
            MAX_SIGNATURE_LEN
        )));
    }
    let bytes = s.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        pos = parse_complete(bytes, pos, 0)?;
    }
    Ok(())
}

/// Validate a signature that must be exactly one complete type
pub fn validate_single(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(VariantError::InvalidSignature("empty signature".to_string()));
    }
    if s.len() > MAX_SIGNATURE_LEN {
        return Err(VariantError::InvalidSignature(format!(
            "signature longer than {} bytes",
            MAX_SIGNATURE_LEN
        )));
    }
    let end = parse_complete(s.as_bytes(), 0, 0)?;
    if end != s.len() {
        return Err(VariantError::InvalidSignature(format!(
            "'{}' holds more than one complete type",
            s
        )));
    }
    Ok(())
}

fn parse_complete(bytes: &[u8], pos: usize, depth: usize) -> Result<usize> {
    if depth > MAX_NESTING {
        return Err(VariantError::InvalidSignature("nesting too deep".to_string()));
    }
    let code = *bytes
        .get(pos)
        .ok_or_else(|| VariantError::InvalidSignature("truncated signature".to_string()))?;

    match code {
        c if is_basic(c) => Ok(pos + 1),
        b'v' => Ok(pos + 1),
        b'a' => {
            if bytes.get(pos + 1) == Some(&b'{') {
                let key = *bytes.get(pos + 2).ok_or_else(|| {
                    VariantError::InvalidSignature("truncated dict entry".to_string())
                })?;
                if !is_basic(key) {
                    return Err(VariantError::InvalidSignature(format!(
                        "dict key '{}' is not a basic type",
                        key as char
                    )));
                }
                let end = parse_complete(bytes, pos + 3, depth + 1)?;
                if bytes.get(end) != Some(&b'}') {
                    return Err(VariantError::InvalidSignature(
                        "dict entry must hold exactly two types".to_string(),
                    ));
                }
                Ok(end + 1)
            } else {
                parse_complete(bytes, pos + 1, depth + 1)
            }
        }
        b'(' => {
            let mut cur = pos + 1;
            if bytes.get(cur) == Some(&b')') {
                return Err(VariantError::InvalidSignature("empty struct".to_string()));
            }
            while bytes.get(cur) != Some(&b')') {
                if cur >= bytes.len() {
                    return Err(VariantError::InvalidSignature("unterminated struct".to_string()));
                }
                cur = parse_complete(bytes, cur, depth + 1)?;
            }
            Ok(cur + 1)
        }
        other => Err(VariantError::InvalidSignature(format!(
            "unknown type code '{}'",
            other as char
        ))),
    }
}
