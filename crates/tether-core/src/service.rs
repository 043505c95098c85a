use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{ServiceError, TransportError};
use crate::transport::StubEndpoint;

/// Method every exported object answers once the capability proxy is applied.
pub const LIVENESS_METHOD: &str = "ping";

/// A local implementation of a declared interface, ready to be exported.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Simple name of the implemented interface.
    fn interface(&self) -> &str;

    /// Whether the implementation answers [`LIVENESS_METHOD`] itself.
    fn implements_liveness(&self) -> bool {
        false
    }

    async fn invoke(&self, method: &str, args: Value) -> Result<Value, ServiceError>;
}

/// Client-side stub for an exported object.
#[async_trait]
pub trait RemoteRef: Send + Sync {
    fn endpoint(&self) -> &StubEndpoint;

    async fn invoke(&self, method: &str, args: Value) -> Result<Value, TransportError>;

    /// Liveness probe. Anything but `true` counts as a failure.
    async fn ping(&self) -> Result<(), TransportError> {
        match self.invoke(LIVENESS_METHOD, Value::Null).await? {
            Value::Bool(true) => Ok(()),
            other => Err(TransportError::Protocol(format!(
                "unexpected liveness reply: {other}"
            ))),
        }
    }
}
