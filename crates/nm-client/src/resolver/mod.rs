//! Object reference resolver
//!
//! Object-valued properties do not own their targets. A slot remembers the
//! target path (holding a watcher on it), and separately whether the
//! reference is *ready* (resolution finished) and *resolved* (a reader may
//! follow it). Both flags are recomputed from the target's state when the
//! cache settles; see [`resolve`].

mod ao_slot;
mod o_slot;

pub use ao_slot::{AoDiff, AoSlot};
pub use o_slot::OSlot;

use crate::types::ObjState;

/// Readiness of one reference
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Resolution is finished; the owner need not wait on this target
    pub ready: bool,
    /// Readers may follow the reference
    pub resolved: bool,
}

impl Resolution {
    /// Waiting for the target
    pub const PENDING: Resolution = Resolution {
        ready: false,
        resolved: false,
    };
    /// Finished without a usable target
    pub const DANGLING: Resolution = Resolution {
        ready: true,
        resolved: false,
    };
    pub const RESOLVED: Resolution = Resolution {
        ready: true,
        resolved: true,
    };
}

/// Resolve a reference against its target's state at settle time
///
/// `target` is `None` when the target has left the cache. A target the peer
/// has not announced yet keeps the reference pending; once confirmed and then
/// withdrawn, or confirmed without giving it a type, it is dangling. A target
/// still deciding its visibility keeps the reference pending unless the slot
/// may become ready without it, which is what breaks reference cycles.
pub fn resolve(target: Option<ObjState>, ever_linked: bool, ready_without_visible: bool) -> Resolution {
    match target {
        Some(ObjState::Unlinked) | Some(ObjState::WatchedOnly) if !ever_linked => Resolution::PENDING,
        None | Some(ObjState::Unlinked) | Some(ObjState::WatchedOnly) | Some(ObjState::OnDbus) => {
            Resolution::DANGLING
        }
        Some(ObjState::FacadeNotReady) | Some(ObjState::FacadeMaybeReady) => {
            if ready_without_visible {
                Resolution::RESOLVED
            } else {
                Resolution::PENDING
            }
        }
        Some(ObjState::FacadeVisible) => Resolution::RESOLVED,
        Some(ObjState::FacadeHidden) => {
            if ready_without_visible {
                Resolution::RESOLVED
            } else {
                Resolution::DANGLING
            }
        }
    }
}
