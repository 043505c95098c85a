use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tether_core::{
    CapabilityProxy, Lookup, ObjectExporter, Registry, RegistryProvider, RemoteRef,
    RemoteService, ServiceAddress, ServiceError, TransportError,
};
use tether_registry::{RegistryHandle, RegistryMode};
use tether_wire::HttpTransport;

struct Greeter;

#[async_trait]
impl RemoteService for Greeter {
    fn interface(&self) -> &str {
        "Greeter"
    }

    async fn invoke(&self, method: &str, args: Value) -> Result<Value, ServiceError> {
        match method {
            "greet" => {
                let who = args
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ServiceError::bad_arguments("missing 'name'"))?;
                Ok(json!(format!("hello, {who}")))
            }
            other => Err(ServiceError::unknown_method(other)),
        }
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test]
async fn second_process_attaches_to_existing_registry() {
    let port = free_port();
    let owner = HttpTransport::new();
    let guest = HttpTransport::new();

    let created = RegistryHandle::create_or_attach(&owner, port).await.unwrap();
    assert_eq!(created.mode(), RegistryMode::Created);

    let attached = RegistryHandle::create_or_attach(&guest, port).await.unwrap();
    assert_eq!(attached.mode(), RegistryMode::Attached);

    let endpoint = guest
        .export(Arc::new(Greeter), "127.0.0.1", free_port())
        .await
        .unwrap();
    attached.rebind("Greeter", endpoint.clone()).await.unwrap();

    assert_eq!(created.lookup("Greeter").await.unwrap(), endpoint);

    guest.shutdown().await;
    owner.shutdown().await;
}

#[tokio::test]
async fn creating_on_an_occupied_port_reports_addr_in_use() {
    let port = free_port();
    let owner = HttpTransport::new();
    owner.create(port).await.unwrap();

    let other = HttpTransport::new();
    assert!(matches!(
        other.create(port).await,
        Err(TransportError::AddrInUse(p)) if p == port
    ));

    owner.shutdown().await;
}

#[tokio::test]
async fn attach_without_listener_fails() {
    let transport = HttpTransport::new();
    assert!(transport.attach("127.0.0.1", free_port()).await.is_err());
}

#[tokio::test]
async fn exported_object_answers_through_lookup() {
    let registry_port = free_port();
    let transport = HttpTransport::new();
    let registry = transport.create(registry_port).await.unwrap();

    let service = CapabilityProxy::wrap(Arc::new(Greeter));
    let endpoint = transport
        .export(service, "127.0.0.1", free_port())
        .await
        .unwrap();
    registry.rebind("Greeter", endpoint).await.unwrap();

    let stub = transport
        .lookup(&ServiceAddress::new("127.0.0.1", registry_port, "Greeter"))
        .await
        .unwrap();

    assert_eq!(
        stub.invoke("greet", json!({"name": "ada"})).await.unwrap(),
        json!("hello, ada")
    );
    stub.ping().await.unwrap();

    match stub.invoke("greet", json!({})).await {
        Err(TransportError::Service(fault)) => {
            assert_eq!(fault, ServiceError::bad_arguments("missing 'name'"))
        }
        other => panic!("expected service error, got {other:?}"),
    }

    transport.shutdown().await;
}

#[tokio::test]
async fn unknown_names_are_not_bound() {
    let registry_port = free_port();
    let transport = HttpTransport::new();
    transport.create(registry_port).await.unwrap();

    let result = transport
        .lookup(&ServiceAddress::new("127.0.0.1", registry_port, "Missing"))
        .await;
    assert!(matches!(result, Err(TransportError::NotBound(name)) if name == "Missing"));

    transport.shutdown().await;
}

#[tokio::test]
async fn objects_share_an_export_port_until_unexported() {
    let registry_port = free_port();
    let export_port = free_port();
    let transport = HttpTransport::new();
    let registry = transport.create(registry_port).await.unwrap();

    let first = transport
        .export(CapabilityProxy::wrap(Arc::new(Greeter)), "127.0.0.1", export_port)
        .await
        .unwrap();
    let second = transport
        .export(CapabilityProxy::wrap(Arc::new(Greeter)), "127.0.0.1", export_port)
        .await
        .unwrap();
    assert_eq!(first.port, second.port);
    assert_ne!(first.object_id, second.object_id);

    registry.rebind("First", first.clone()).await.unwrap();
    registry.rebind("Second", second.clone()).await.unwrap();

    let stub = transport
        .lookup(&ServiceAddress::new("127.0.0.1", registry_port, "First"))
        .await
        .unwrap();
    stub.ping().await.unwrap();

    assert!(transport.unexport(&first).await);
    assert!(!transport.unexport(&first).await);
    assert!(matches!(
        stub.ping().await,
        Err(TransportError::NoSuchObject(id)) if id == first.object_id
    ));

    let other = transport
        .lookup(&ServiceAddress::new("127.0.0.1", registry_port, "Second"))
        .await
        .unwrap();
    other.ping().await.unwrap();

    transport.shutdown().await;
}
