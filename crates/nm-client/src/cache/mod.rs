//! Object cache
//!
//! ```text
//!   BusEvent ──▶ apply_event ──▶ marshal into InterfaceData
//!                    │                 │
//!                    │            watch / unwatch targets
//!                    ▼
//!                 dirty set ──▶ settle ──▶ facade, resolution, visibility
//!                                             │
//!                                             ▼
//!                                       NotifyQueue ──▶ flush ──▶ subscribers
//! ```

mod handle;
mod object;
mod settle;
mod table;
mod view;

pub use handle::ObjectHandle;
pub use object::InterfaceData;
pub use table::ObjectCache;
pub use view::FacadeView;
