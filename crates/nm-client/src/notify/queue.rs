//! Priority-banded notification queue
//!
//! Items are ordered by (priority, enqueue sequence), so equal priorities
//! flush FIFO. Flushing pops the smallest item until the queue is empty;
//! anything an observer queues while the flush runs joins the same pass,
//! clamped so it never runs before the item that produced it.

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use super::event::{Notification, Priority};
use super::subscription::Subscribers;
use crate::types::RefPath;

/// Deferred action run at its turn in the flush
pub type Action = Box<dyn FnOnce(&mut Emitter<'_>) + Send>;

enum QueueItem {
    Event(Notification),
    Call(Action),
}

/// Pending notifications of the current processing cycle
#[derive(Default)]
pub struct NotifyQueue {
    pending: BTreeMap<(Priority, u64), QueueItem>,
    next_seq: u64,
    /// (path, interface, property) already queued this cycle
    coalesced: HashSet<(RefPath, &'static str, &'static str)>,
}

impl NotifyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, priority: Priority, item: QueueItem) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((priority, seq), item);
    }

    pub fn enqueue(&mut self, priority: Priority, notification: Notification) {
        trace!("queue {:?} at {:?}", notification, priority);
        self.push(priority, QueueItem::Event(notification));
    }

    pub fn enqueue_call<F>(&mut self, priority: Priority, action: F)
    where
        F: FnOnce(&mut Emitter<'_>) + Send + 'static,
    {
        self.push(priority, QueueItem::Call(Box::new(action)));
    }

    /// Queue a property change once per cycle; returns whether it was new
    pub fn property_changed(&mut self, path: &RefPath, interface: &'static str, property: &'static str) -> bool {
        if !self.coalesced.insert((path.clone(), interface, property)) {
            return false;
        }
        self.enqueue(
            Priority::DEFAULT,
            Notification::PropertyChanged {
                path: path.clone(),
                interface,
                property,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain everything to the subscribers; returns the number of
    /// notifications delivered
    pub fn flush(&mut self, subscribers: &mut Subscribers) -> usize {
        let mut delivered = 0;
        while let Some(((priority, _), item)) = self.pending.pop_first() {
            let mut emitter = Emitter {
                queue: &mut *self,
                floor: priority,
            };
            match item {
                QueueItem::Event(notification) => {
                    subscribers.dispatch(&notification, &mut emitter);
                    delivered += 1;
                }
                QueueItem::Call(action) => action(&mut emitter),
            }
        }
        self.coalesced.clear();
        delivered
    }
}

/// Handle for queueing work from inside a flush
pub struct Emitter<'a> {
    queue: &'a mut NotifyQueue,
    floor: Priority,
}

impl Emitter<'_> {
    /// Priority of the item being delivered
    pub fn floor(&self) -> Priority {
        self.floor
    }

    pub fn emit(&mut self, priority: Priority, notification: Notification) {
        let priority = priority.max(self.floor);
        self.queue.enqueue(priority, notification);
    }

    pub fn call<F>(&mut self, priority: Priority, action: F)
    where
        F: FnOnce(&mut Emitter<'_>) + Send + 'static,
    {
        let priority = priority.max(self.floor);
        self.queue.enqueue_call(priority, action);
    }
}
