use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tether_core::{
    ExportDescriptor, ExportError, ObjectExporter, Registry, RegistryProvider, RemoteService,
    ServiceError, StubEndpoint, TransportError,
};
use tether_registry::{RegistryHandles, RegistryMode};
use tether_server::{ServiceExporter, resolve_advertised_host};
use tether_wire::Directory;

/// Registries keyed by port, shared like a network would share them.
#[derive(Default)]
struct Network {
    registries: Mutex<HashMap<u16, Arc<Directory>>>,
    dead_ports: Mutex<HashSet<u16>>,
}

#[async_trait]
impl RegistryProvider for Network {
    async fn create(&self, port: u16) -> Result<Arc<dyn Registry>, TransportError> {
        if self.dead_ports.lock().contains(&port) {
            return Err(TransportError::Io(std::io::Error::other("permission denied")));
        }
        let mut registries = self.registries.lock();
        if registries.contains_key(&port) {
            return Err(TransportError::AddrInUse(port));
        }
        let directory = Arc::new(Directory::new());
        registries.insert(port, directory.clone());
        Ok(directory)
    }

    async fn attach(&self, host: &str, port: u16) -> Result<Arc<dyn Registry>, TransportError> {
        let directory = self.registries.lock().get(&port).cloned();
        match directory {
            Some(d) => Ok(d),
            None => Err(TransportError::unreachable(format!("{host}:{port}"), "refused")),
        }
    }
}

#[derive(Default)]
struct Objects {
    served: Mutex<HashMap<uuid::Uuid, Arc<dyn RemoteService>>>,
    busy_ports: Mutex<HashSet<u16>>,
}

impl Objects {
    fn object(&self, endpoint: &StubEndpoint) -> Arc<dyn RemoteService> {
        self.served.lock().get(&endpoint.object_id).cloned().unwrap()
    }
}

#[async_trait]
impl ObjectExporter for Objects {
    async fn export(
        &self,
        service: Arc<dyn RemoteService>,
        host: &str,
        port: u16,
    ) -> Result<StubEndpoint, TransportError> {
        if self.busy_ports.lock().contains(&port) {
            return Err(TransportError::AddrInUse(port));
        }
        let endpoint = StubEndpoint::new(service.interface(), host, port);
        self.served.lock().insert(endpoint.object_id, service);
        Ok(endpoint)
    }

    async fn unexport(&self, endpoint: &StubEndpoint) -> bool {
        self.served.lock().remove(&endpoint.object_id).is_some()
    }
}

struct Billing;

#[async_trait]
impl RemoteService for Billing {
    fn interface(&self) -> &str {
        "BillingApi"
    }

    async fn invoke(&self, method: &str, _args: Value) -> Result<Value, ServiceError> {
        match method {
            "balance" => Ok(json!(42)),
            other => Err(ServiceError::unknown_method(other)),
        }
    }
}

fn exporter(network: &Arc<Network>, objects: &Arc<Objects>, host: &str) -> ServiceExporter {
    ServiceExporter::new(
        Arc::new(RegistryHandles::new(network.clone())),
        objects.clone(),
        host,
    )
}

#[tokio::test]
async fn billing_is_published_at_the_advertised_address() {
    let network = Arc::new(Network::default());
    let objects = Arc::new(Objects::default());
    let host = resolve_advertised_host(Some("orders-svc"));
    let mut exporter = exporter(&network, &objects, &host);

    exporter.declare(
        Arc::new(Billing),
        ExportDescriptor::named("Billing")
            .with_registry_port(1099)
            .with_export_port(5001),
    );
    let report = exporter.activate().await;

    assert!(report.is_complete());
    let exported = &report.exported[0];
    assert_eq!(exported.address().to_string(), "tether://orders-svc:1099/Billing");
    assert_eq!(exported.endpoint.port, 5001);
    assert_eq!(exported.endpoint.host, "orders-svc");
    assert_eq!(exported.registry_mode, RegistryMode::Created);

    let directory = network.registries.lock().get(&1099).cloned().unwrap();
    assert_eq!(directory.get("Billing"), Some(exported.endpoint.clone()));
}

#[tokio::test]
async fn exported_objects_answer_liveness() {
    let network = Arc::new(Network::default());
    let objects = Arc::new(Objects::default());
    let mut exporter = exporter(&network, &objects, "127.0.0.1");

    exporter.declare(Arc::new(Billing), ExportDescriptor::default());
    let report = exporter.activate().await;
    let exported = &report.exported[0];
    assert_eq!(exported.descriptor.name, "BillingApi");
    assert!(exported.descriptor.inject_liveness);

    let object = objects.object(&exported.endpoint);
    assert_eq!(object.invoke("ping", Value::Null).await, Ok(Value::Bool(true)));
    assert_eq!(object.invoke("balance", Value::Null).await, Ok(json!(42)));
    assert_eq!(
        object.invoke("refund", Value::Null).await,
        Err(ServiceError::unknown_method("refund"))
    );
}

#[tokio::test]
async fn one_failure_does_not_stop_the_rest() {
    let network = Arc::new(Network::default());
    let objects = Arc::new(Objects::default());
    objects.busy_ports.lock().insert(6001);
    network.dead_ports.lock().insert(7099);
    let mut exporter = exporter(&network, &objects, "127.0.0.1");

    exporter
        .declare(Arc::new(Billing), ExportDescriptor::named("Busy").with_export_port(6001))
        .declare(Arc::new(Billing), ExportDescriptor::named("Ephemeral").with_export_port(0))
        .declare(Arc::new(Billing), ExportDescriptor::named("NoRegistry").with_registry_port(7099))
        .declare(Arc::new(Billing), ExportDescriptor::named("Billing"));
    let report = exporter.activate().await;

    assert_eq!(report.exported.len(), 1);
    assert_eq!(report.exported[0].descriptor.name, "Billing");
    assert_eq!(exporter.exported().len(), 1);

    let failures: HashMap<_, _> = report.failed.into_iter().collect();
    assert!(matches!(failures["Busy"], ExportError::Bind { port: 6001, .. }));
    assert!(matches!(failures["Ephemeral"], ExportError::InvalidDescriptor { .. }));
    assert!(matches!(failures["NoRegistry"], ExportError::Registry(_)));
}

#[tokio::test]
async fn restarted_exporter_rebinds_over_previous_entry() {
    let network = Arc::new(Network::default());
    let objects = Arc::new(Objects::default());

    let mut first = exporter(&network, &objects, "127.0.0.1");
    first.declare(Arc::new(Billing), ExportDescriptor::named("Billing"));
    let old = first.activate().await.exported.remove(0);

    let mut second = exporter(&network, &objects, "127.0.0.1");
    second.declare(Arc::new(Billing), ExportDescriptor::named("Billing"));
    let new = second.activate().await.exported.remove(0);

    assert_eq!(new.registry_mode, RegistryMode::Attached);
    assert_ne!(old.endpoint.object_id, new.endpoint.object_id);

    let directory = network.registries.lock().get(&1099).cloned().unwrap();
    assert_eq!(directory.get("Billing"), Some(new.endpoint.clone()));

    // the stale process going away must not remove the fresh entry
    first.shutdown().await;
    assert_eq!(directory.get("Billing"), Some(new.endpoint.clone()));

    second.shutdown().await;
    assert_eq!(directory.get("Billing"), None);
    assert!(second.exported().is_empty());
}

#[tokio::test]
async fn activating_nothing_is_not_an_error() {
    let network = Arc::new(Network::default());
    let objects = Arc::new(Objects::default());
    let mut exporter = exporter(&network, &objects, "127.0.0.1");

    let report = exporter.activate().await;
    assert!(report.exported.is_empty());
    assert!(report.is_complete());
}
