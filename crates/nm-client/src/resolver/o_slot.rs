//! Single object reference slot

use super::Resolution;
use crate::types::RefPath;

/// State of an `o` property
#[derive(Clone, Debug)]
pub struct OSlot {
    target: Option<RefPath>,
    ready: bool,
    resolved: bool,
}

impl Default for OSlot {
    fn default() -> Self {
        Self {
            target: None,
            ready: true,
            resolved: false,
        }
    }
}

impl OSlot {
    /// Point at a new target; returns the previous one when it changed.
    /// A new target starts out pending.
    pub fn set_target(&mut self, target: Option<RefPath>) -> Option<Option<RefPath>> {
        if self.target == target {
            return None;
        }
        let old = std::mem::replace(&mut self.target, target);
        self.ready = self.target.is_none();
        self.resolved = false;
        Some(old)
    }

    /// Apply a fresh resolution; returns whether the resolved target changed
    pub fn refresh(&mut self, resolution: Resolution) -> bool {
        if self.target.is_none() {
            let changed = self.resolved;
            self.ready = true;
            self.resolved = false;
            return changed;
        }
        self.ready = resolution.ready;
        let changed = self.resolved != resolution.resolved;
        self.resolved = resolution.resolved;
        changed
    }

    /// Drop the target; returns it so the caller can release its watcher
    pub fn clear(&mut self) -> Option<RefPath> {
        self.ready = true;
        self.resolved = false;
        self.target.take()
    }

    pub fn target(&self) -> Option<&RefPath> {
        self.target.as_ref()
    }

    /// Target readers may follow
    pub fn resolved_target(&self) -> Option<&RefPath> {
        if self.resolved {
            self.target.as_ref()
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}
