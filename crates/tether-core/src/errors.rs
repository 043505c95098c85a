use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::RegistryError;

/// Error raised by a service implementation. Travels over the wire as-is so
/// callers see exactly what the implementation returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new("UnknownMethod", format!("no method named '{method}'"))
    }

    pub fn bad_arguments(message: impl Into<String>) -> Self {
        Self::new("BadArguments", message)
    }
}

/// Failures of the transport collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("port {0} is already in use")]
    AddrInUse(u16),

    #[error("'{0}' is not bound in the registry")]
    NotBound(String),

    #[error("{target} is unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("no such object {0}")]
    NoSuchObject(Uuid),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn unreachable(target: impl Into<String>, reason: impl ToString) -> Self {
        TransportError::Unreachable {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

/// One service failed to export. Never aborts the others.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid export of '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("failed to serve '{name}' on port {port}: {source}")]
    Bind {
        name: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    #[error("failed to publish '{name}': {source}")]
    Publish {
        name: String,
        #[source]
        source: TransportError,
    },
}
