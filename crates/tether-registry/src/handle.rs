use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tether_core::{
    LOOPBACK_HOST, Registry, RegistryError, RegistryProvider, StubEndpoint, TransportError,
};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMode {
    /// This process owns the registry listener.
    Created,
    /// Another process owns the listener; this one is a client of it.
    Attached,
}

impl fmt::Display for RegistryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryMode::Created => f.write_str("created"),
            RegistryMode::Attached => f.write_str("attached"),
        }
    }
}

/// A registry on a local port, either owned by this process or shared with
/// the process that got there first.
pub struct RegistryHandle {
    port: u16,
    mode: RegistryMode,
    registry: Arc<dyn Registry>,
}

impl RegistryHandle {
    /// Tries to create the registry and falls back to attaching when the
    /// port is already served.
    pub async fn create_or_attach(
        provider: &dyn RegistryProvider,
        port: u16,
    ) -> Result<Self, RegistryError> {
        let create_err = match provider.create(port).await {
            Ok(registry) => {
                tracing::info!(port, "created registry");
                return Ok(Self {
                    port,
                    mode: RegistryMode::Created,
                    registry,
                });
            }
            Err(e) => e,
        };

        if !matches!(create_err, TransportError::AddrInUse(_)) {
            tracing::warn!(
                port,
                error = %create_err,
                "could not create registry, trying to attach"
            );
        }

        match provider.attach(LOOPBACK_HOST, port).await {
            Ok(registry) => {
                tracing::info!(port, "attached to existing registry");
                Ok(Self {
                    port,
                    mode: RegistryMode::Attached,
                    registry,
                })
            }
            Err(attach_err) => Err(RegistryError::Unavailable {
                port,
                create: create_err.to_string(),
                attach: attach_err.to_string(),
            }),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn mode(&self) -> RegistryMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub async fn rebind(&self, name: &str, endpoint: StubEndpoint) -> Result<(), TransportError> {
        self.registry.rebind(name, endpoint).await
    }

    pub async fn lookup(&self, name: &str) -> Result<StubEndpoint, TransportError> {
        self.registry.lookup(name).await
    }

    /// Removes `name` only while it still points at `endpoint`'s object,
    /// so a newer export of the same name is left untouched.
    pub async fn withdraw(
        &self,
        name: &str,
        endpoint: &StubEndpoint,
    ) -> Result<bool, TransportError> {
        match self.registry.lookup(name).await {
            Ok(current) if current.object_id == endpoint.object_id => {
                self.registry.unbind(name).await?;
                Ok(true)
            }
            Ok(_) | Err(TransportError::NotBound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("port", &self.port)
            .field("mode", &self.mode)
            .finish()
    }
}

/// The process-wide table of registry handles, at most one per port.
pub struct RegistryHandles {
    provider: Arc<dyn RegistryProvider>,
    handles: Mutex<HashMap<u16, Arc<RegistryHandle>>>,
}

impl RegistryHandles {
    pub fn new(provider: Arc<dyn RegistryProvider>) -> Self {
        Self {
            provider,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handle for `port`, creating or attaching on first use.
    /// Concurrent callers for the same port wait for the first one.
    pub async fn obtain(&self, port: u16) -> Result<Arc<RegistryHandle>, RegistryError> {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(&port) {
            return Ok(handle.clone());
        }

        let handle = RegistryHandle::create_or_attach(self.provider.as_ref(), port).await?;
        let handle = Arc::new(handle);
        handles.insert(port, handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, port: u16) -> Option<Arc<RegistryHandle>> {
        self.handles.lock().await.get(&port).cloned()
    }

    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }
}
