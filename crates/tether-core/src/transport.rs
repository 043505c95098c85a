use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::ServiceAddress;
use crate::errors::TransportError;
use crate::service::{RemoteRef, RemoteService};

/// What a registry entry points at: the advertised location of one
/// exported object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubEndpoint {
    pub interface: String,
    pub host: String,
    pub port: u16,
    /// Fresh for every export, so stubs from a previous server run are
    /// rejected after a restart.
    pub object_id: Uuid,
}

impl StubEndpoint {
    pub fn new(interface: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            interface: interface.into(),
            host: host.into(),
            port,
            object_id: Uuid::new_v4(),
        }
    }
}

#[async_trait]
pub trait ObjectExporter: Send + Sync {
    /// Serves `service` on `port` and returns the stub endpoint advertising
    /// `host`.
    async fn export(
        &self,
        service: Arc<dyn RemoteService>,
        host: &str,
        port: u16,
    ) -> Result<StubEndpoint, TransportError>;

    /// Stops serving the object. Returns false if it was not exported here.
    async fn unexport(&self, endpoint: &StubEndpoint) -> bool;
}

/// Resolves an address into a live stub.
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn lookup(&self, address: &ServiceAddress) -> Result<Arc<dyn RemoteRef>, TransportError>;
}
