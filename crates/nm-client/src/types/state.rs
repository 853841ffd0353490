//! Object lifecycle and visibility states

use std::fmt;

/// Lifecycle state of a cached object
///
/// ```text
/// Unlinked ─▶ WatchedOnly ─▶ OnDbus ─▶ FacadeNotReady ─▶ FacadeMaybeReady ─┬▶ FacadeVisible
///                                                                           └▶ FacadeHidden
/// ```
///
/// Removal walks back to `WatchedOnly` or `Unlinked`, and the object is
/// evicted once nothing holds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjState {
    /// Path known, nothing else
    Unlinked,
    /// Watched by a reference slot, not confirmed by the peer
    WatchedOnly,
    /// Confirmed by the peer, no local type chosen
    OnDbus,
    /// Facade created, references unresolved
    FacadeNotReady,
    /// References resolved, visibility not decided yet
    FacadeMaybeReady,
    FacadeVisible,
    /// Facade exists but fails its visibility predicate
    FacadeHidden,
}

impl ObjState {
    /// Whether the peer has confirmed the object
    pub fn is_on_dbus(self) -> bool {
        self >= ObjState::OnDbus
    }

    pub fn has_facade(self) -> bool {
        self >= ObjState::FacadeNotReady
    }

    /// Visibility has been decided one way or the other
    pub fn is_decided(self) -> bool {
        matches!(self, ObjState::FacadeVisible | ObjState::FacadeHidden)
    }
}

impl fmt::Display for ObjState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjState::Unlinked => "unlinked",
            ObjState::WatchedOnly => "watched-only",
            ObjState::OnDbus => "on-dbus",
            ObjState::FacadeNotReady => "facade-not-ready",
            ObjState::FacadeMaybeReady => "facade-maybe-ready",
            ObjState::FacadeVisible => "facade-visible",
            ObjState::FacadeHidden => "facade-hidden",
        };
        f.write_str(name)
    }
}
