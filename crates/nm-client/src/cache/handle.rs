//! Reference-counted handles to cached objects

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::RefPath;

/// Shared part of a cached object: its path and reference count
///
/// The count is the only piece of object state touched outside the cache's
/// own thread, so it is atomic.
#[derive(Debug)]
pub(crate) struct ObjectCell {
    pub(crate) path: RefPath,
    ref_count: AtomicU32,
}

impl ObjectCell {
    pub(crate) fn new(path: RefPath) -> Arc<Self> {
        Arc::new(Self {
            path,
            ref_count: AtomicU32::new(0),
        })
    }

    pub(crate) fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub(crate) fn retain(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns `true` when this dropped the last reference
    pub(crate) fn release(&self) -> bool {
        self.ref_count.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

/// Paths whose last handle was dropped, waiting for the cache to evict them
#[derive(Clone, Default)]
pub(crate) struct ReleaseQueue(Arc<Mutex<Vec<RefPath>>>);

impl ReleaseQueue {
    pub(crate) fn push(&self, path: RefPath) {
        self.0.lock().push(path);
    }

    pub(crate) fn drain(&self) -> Vec<RefPath> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// Keeps a cached object alive
///
/// Handles may be cloned and dropped on any thread. Dropping the last
/// reference to an object the peer no longer exports queues it for eviction
/// at the cache's next processing cycle.
pub struct ObjectHandle {
    cell: Arc<ObjectCell>,
    releases: ReleaseQueue,
}

impl ObjectHandle {
    pub(crate) fn acquire(cell: &Arc<ObjectCell>, releases: &ReleaseQueue) -> Self {
        cell.retain();
        Self {
            cell: cell.clone(),
            releases: releases.clone(),
        }
    }

    pub fn path(&self) -> &RefPath {
        &self.cell.path
    }

    /// Current reference count of the object, this handle included
    pub fn ref_count(&self) -> u32 {
        self.cell.ref_count()
    }
}

impl Clone for ObjectHandle {
    fn clone(&self) -> Self {
        Self::acquire(&self.cell, &self.releases)
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        if self.cell.release() {
            self.releases.push(self.cell.path.clone());
        }
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("path", &self.cell.path)
            .field("ref_count", &self.cell.ref_count())
            .finish()
    }
}
