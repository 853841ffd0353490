//! Core client types

mod error;
mod path;
mod state;

pub use error::{CatalogError, ClientError, MarshalError, Result};
pub use path::{PathPool, RefPath};
pub use state::ObjState;
