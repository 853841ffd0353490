//! Error types for the IPC boundary

use std::time::Duration;

use nm_variant::VariantError;
use thiserror::Error;

/// IPC error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IpcError {
    /// The remote service has no owner on the bus
    #[error("service is not running")]
    NotRunning,

    #[error("no reply")]
    NoReply,

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("operation was cancelled")]
    Cancelled,

    /// The peer answered with an error reply
    #[error("{name}: {message}")]
    MethodError { name: String, message: String },

    #[error("unknown method {interface}.{member}")]
    UnknownMethod { interface: String, member: String },

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("connection closed")]
    Disconnected,

    #[error("variant error: {0}")]
    Variant(#[from] VariantError),
}

impl IpcError {
    /// Build an error reply
    pub fn method_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        IpcError::MethodError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Drop a `"<remote error name>: "` prefix some peers put in the message
    pub fn strip_remote(self) -> Self {
        match self {
            IpcError::MethodError { name, message } => {
                let prefix = format!("{}: ", name);
                let message = match message.strip_prefix(&prefix) {
                    Some(rest) => rest.to_string(),
                    None => message,
                };
                IpcError::MethodError { name, message }
            }
            other => other,
        }
    }

    /// Whether the failure means the service is down rather than the call failed
    pub fn is_not_running(&self) -> bool {
        match self {
            IpcError::NotRunning | IpcError::Disconnected => true,
            IpcError::MethodError { name, .. } => {
                name == crate::message::ERROR_SERVICE_UNKNOWN || name == crate::message::ERROR_NAME_HAS_NO_OWNER
            }
            _ => false,
        }
    }
}

/// Result type for IPC operations
pub type Result<T> = std::result::Result<T, IpcError>;
