//! Interned object paths
//!
//! Every path the cache knows about is interned in a [`PathPool`], so equal
//! paths share a single allocation and compare by pointer first.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// An interned object path
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefPath(Arc<str>);

impl RefPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether both values come from the same pool entry
    pub fn ptr_eq(&self, other: &RefPath) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Borrow<str> for RefPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RefPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl PartialEq<str> for RefPath {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for RefPath {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Path intern pool
#[derive(Default)]
pub struct PathPool {
    paths: HashSet<Arc<str>>,
}

impl PathPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, path: &str) -> RefPath {
        if let Some(existing) = self.paths.get(path) {
            return RefPath(existing.clone());
        }
        let entry: Arc<str> = Arc::from(path);
        self.paths.insert(entry.clone());
        RefPath(entry)
    }

    /// Look up without interning
    pub fn get(&self, path: &str) -> Option<RefPath> {
        self.paths.get(path).map(|p| RefPath(p.clone()))
    }

    /// Drop entries nobody else references; returns how many were dropped
    pub fn prune(&mut self) -> usize {
        let before = self.paths.len();
        self.paths.retain(|p| Arc::strong_count(p) > 1);
        before - self.paths.len()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
