//! Change notification pipeline
//!
//! Changes found while applying a batch are queued here and delivered to
//! subscribers only after the whole batch has been applied and settled.

mod event;
mod queue;
mod subscription;

pub use event::{Notification, Priority};
pub use queue::{Action, Emitter, NotifyQueue};
pub use subscription::{Observer, SubscriptionFilter, SubscriptionId, Subscribers};
