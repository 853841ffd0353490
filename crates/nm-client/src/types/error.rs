//! Client error types

use nm_ipc::IpcError;
use nm_variant::VariantError;
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Underlying IPC error
    #[error("IPC error: {0}")]
    Ipc(IpcError),

    /// The remote service has no owner on the bus
    #[error("service is not running")]
    NotRunning,

    /// No cached object at this path
    #[error("object not cached: {0}")]
    NotCached(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("marshal error: {0}")]
    Marshal(#[from] MarshalError),

    #[error("invalid value: {0}")]
    Variant(#[from] VariantError),
}

impl From<IpcError> for ClientError {
    fn from(err: IpcError) -> Self {
        if err.is_not_running() {
            ClientError::NotRunning
        } else {
            ClientError::Ipc(err)
        }
    }
}

/// Interface catalog validation failures, detected once at startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{interface}: properties not sorted at {property}")]
    Unsorted { interface: String, property: String },

    #[error("{interface}: duplicate property {property}")]
    DuplicateProperty { interface: String, property: String },

    #[error("duplicate interface {0}")]
    DuplicateInterface(String),

    /// Object and collection properties must be typed `o` and `ao`
    #[error("{interface}.{property}: kind does not match signature {signature}")]
    KindMismatch {
        interface: String,
        property: String,
        signature: String,
    },

    #[error("{interface}.{property}: invalid signature {signature}")]
    InvalidSignature {
        interface: String,
        property: String,
        signature: String,
    },
}

/// Failures converting one incoming property value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("{interface}.{property}: expected {expected}, got {found}")]
    TypeMismatch {
        interface: String,
        property: String,
        expected: String,
        found: String,
    },

    #[error("{interface}.{property}: {reason}")]
    Conversion {
        interface: String,
        property: String,
        reason: String,
    },
}

impl MarshalError {
    /// (interface, property) the failure belongs to
    pub fn key(&self) -> (&str, &str) {
        match self {
            MarshalError::TypeMismatch { interface, property, .. }
            | MarshalError::Conversion { interface, property, .. } => (interface, property),
        }
    }
}
