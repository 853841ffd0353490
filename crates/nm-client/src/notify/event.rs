//! Notification events and priorities

use crate::types::RefPath;

/// Flush priority; lower runs first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i32);

impl Priority {
    /// State fixups that must run before default work
    pub const BEFORE: Priority = Priority(-100);
    pub const DEFAULT: Priority = Priority(0);
    /// Aggregate notifications depending on all default work
    pub const AFTER: Priority = Priority(100);

    pub const fn offset(self, by: i32) -> Priority {
        Priority(self.0.saturating_add(by))
    }
}

/// A change delivered to subscribers at flush time
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// A property of a visible object changed
    PropertyChanged {
        path: RefPath,
        interface: &'static str,
        property: &'static str,
    },
    /// An object became visible
    ObjectAdded { path: RefPath, facade: &'static str },
    /// A visible object went away or was hidden
    ObjectRemoved { path: RefPath, facade: &'static str },
    /// A collection entry resolved
    EntryAdded {
        owner: RefPath,
        property: &'static str,
        target: RefPath,
    },
    EntryRemoved {
        owner: RefPath,
        property: &'static str,
        target: RefPath,
    },
}

impl Notification {
    /// Band this notification is queued in unless overridden
    pub fn priority(&self) -> Priority {
        match self {
            Notification::PropertyChanged { .. } => Priority::DEFAULT,
            Notification::ObjectRemoved { .. } | Notification::EntryRemoved { .. } => Priority::BEFORE,
            Notification::ObjectAdded { .. } | Notification::EntryAdded { .. } => Priority::AFTER,
        }
    }

    /// Object the notification is about
    pub fn path(&self) -> &RefPath {
        match self {
            Notification::PropertyChanged { path, .. }
            | Notification::ObjectAdded { path, .. }
            | Notification::ObjectRemoved { path, .. } => path,
            Notification::EntryAdded { owner, .. } | Notification::EntryRemoved { owner, .. } => owner,
        }
    }

    /// Wire property the notification is about, if any
    pub fn property(&self) -> Option<&'static str> {
        match self {
            Notification::PropertyChanged { property, .. }
            | Notification::EntryAdded { property, .. }
            | Notification::EntryRemoved { property, .. } => Some(property),
            Notification::ObjectAdded { .. } | Notification::ObjectRemoved { .. } => None,
        }
    }
}
