//! JSON-over-HTTP transport.
//!
//! A registry is an HTTP listener holding a [`Directory`]; each export port
//! runs one listener serving every object exported on it, addressed by
//! object id.

mod client;
mod directory;
mod server;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tether_core::{
    Lookup, ObjectExporter, Registry, RegistryProvider, RemoteRef, RemoteService,
    ServiceAddress, StubEndpoint, TransportError,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use client::{HttpRemoteRef, RegistryClient};
pub use directory::Directory;

use server::ObjectTable;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

struct ObjectServer {
    table: Arc<ObjectTable>,
    cancel: CancellationToken,
}

pub struct HttpTransport {
    http: reqwest::Client,
    call_timeout: Duration,
    cancel: CancellationToken,
    object_servers: Mutex<HashMap<u16, ObjectServer>>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancel: CancellationToken::new(),
            object_servers: Mutex::new(HashMap::new()),
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Upper bound for every registry and object call made through this
    /// transport.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Closes every listener this transport opened and waits for them.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
        self.object_servers.lock().await.clear();
    }
}

#[async_trait]
impl RegistryProvider for HttpTransport {
    async fn create(&self, port: u16) -> Result<Arc<dyn Registry>, TransportError> {
        let listener = server::bind(port)?;
        let directory = Arc::new(Directory::new());
        let task = server::serve(
            listener,
            server::directory_router(directory.clone()),
            self.cancel.child_token(),
        )?;
        self.track(task);
        tracing::info!(port, "registry listening");
        Ok(directory)
    }

    async fn attach(&self, host: &str, port: u16) -> Result<Arc<dyn Registry>, TransportError> {
        let client = RegistryClient::new(self.http.clone(), host, port, self.call_timeout);
        // an unresponsive listener is not a registry
        client.list().await?;
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl ObjectExporter for HttpTransport {
    async fn export(
        &self,
        service: Arc<dyn RemoteService>,
        host: &str,
        port: u16,
    ) -> Result<StubEndpoint, TransportError> {
        let mut servers = self.object_servers.lock().await;

        let port = match servers.get(&port) {
            Some(_) if port != 0 => port,
            _ => {
                let listener = server::bind(port)?;
                let bound = listener.local_addr()?.port();
                let table = Arc::new(ObjectTable::default());
                let cancel = self.cancel.child_token();
                let router = server::object_router(table.clone());
                let task = server::serve(listener, router, cancel.clone())?;
                self.track(task);
                servers.insert(bound, ObjectServer { table, cancel });
                tracing::debug!(port = bound, "object listener started");
                bound
            }
        };

        let endpoint = StubEndpoint::new(service.interface(), host, port);
        if let Some(server) = servers.get(&port) {
            server.table.insert(endpoint.object_id, service);
        }
        Ok(endpoint)
    }

    async fn unexport(&self, endpoint: &StubEndpoint) -> bool {
        let mut servers = self.object_servers.lock().await;
        let Some(server) = servers.get(&endpoint.port) else {
            return false;
        };
        if !server.table.remove(&endpoint.object_id) {
            return false;
        }
        if server.table.is_empty() {
            if let Some(server) = servers.remove(&endpoint.port) {
                server.cancel.cancel();
                tracing::debug!(port = endpoint.port, "object listener stopped");
            }
        }
        true
    }
}

#[async_trait]
impl Lookup for HttpTransport {
    async fn lookup(&self, address: &ServiceAddress) -> Result<Arc<dyn RemoteRef>, TransportError> {
        let registry = RegistryClient::new(
            self.http.clone(),
            &address.host,
            address.port,
            self.call_timeout,
        );
        let endpoint = registry.lookup(&address.name).await?;
        Ok(Arc::new(HttpRemoteRef::new(self.http.clone(), endpoint, self.call_timeout)))
    }
}
