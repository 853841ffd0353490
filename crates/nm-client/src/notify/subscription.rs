//! Subscriptions to flushed notifications

use super::event::Notification;
use super::queue::Emitter;

/// Observer callback; may queue follow-up work through the [`Emitter`]
pub type Observer = Box<dyn FnMut(&Notification, &mut Emitter<'_>) + Send>;

/// Subscription handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Which notifications a subscriber receives
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub path: Option<String>,
    /// Wire property name; object-level notifications carry none
    pub property: Option<String>,
}

impl SubscriptionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            property: None,
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn matches(&self, notification: &Notification) -> bool {
        if let Some(path) = &self.path {
            if notification.path().as_str() != path {
                return false;
            }
        }
        match &self.property {
            Some(property) => notification.property() == Some(property.as_str()),
            None => true,
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    filter: SubscriptionFilter,
    observer: Observer,
}

/// Registered observers, called in registration order
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    entries: Vec<Subscriber>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: SubscriptionFilter, observer: Observer) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push(Subscriber { id, filter, observer });
        id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s.id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver one notification; returns how many observers saw it
    pub(crate) fn dispatch(&mut self, notification: &Notification, emitter: &mut Emitter<'_>) -> usize {
        let mut seen = 0;
        for sub in self.entries.iter_mut() {
            if sub.filter.matches(notification) {
                (sub.observer)(notification, emitter);
                seen += 1;
            }
        }
        seen
    }
}
