use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::errors::TransportError;
use crate::transport::StubEndpoint;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry on port {port} unavailable (create: {create}; attach: {attach})")]
    Unavailable {
        port: u16,
        create: String,
        attach: String,
    },
}

/// Name directory owned by the transport.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Publishes `endpoint` under `name`, replacing any previous entry.
    async fn rebind(&self, name: &str, endpoint: StubEndpoint) -> Result<(), TransportError>;
    async fn lookup(&self, name: &str) -> Result<StubEndpoint, TransportError>;
    async fn unbind(&self, name: &str) -> Result<(), TransportError>;
    async fn list(&self) -> Result<Vec<String>, TransportError>;
}

/// Creates a registry listener in this process, or connects to one
/// already running.
#[async_trait]
pub trait RegistryProvider: Send + Sync {
    /// Fails with [`TransportError::AddrInUse`] when a listener already
    /// holds the port.
    async fn create(&self, port: u16) -> Result<Arc<dyn Registry>, TransportError>;
    async fn attach(&self, host: &str, port: u16) -> Result<Arc<dyn Registry>, TransportError>;
}
