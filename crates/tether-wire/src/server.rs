use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::RwLock;
use serde_json::Value;
use tether_core::{RemoteService, StubEndpoint, TransportError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::directory::Directory;

/// Binds a listener on every interface. A port held by another listener
/// surfaces as [`TransportError::AddrInUse`].
pub(crate) fn bind(port: u16) -> Result<TcpListener, TransportError> {
    let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|e| match e.kind() {
        std::io::ErrorKind::AddrInUse => TransportError::AddrInUse(port),
        _ => TransportError::Io(e),
    })?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

pub(crate) fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, TransportError> {
    let addr = listener.local_addr()?;
    let server = axum::Server::from_tcp(listener)
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

    Ok(tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = server
            .serve(router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("server error on {}: {}", addr, e);
        }
        tracing::debug!("listener on {} closed", addr);
    }))
}

pub(crate) fn directory_router(directory: Arc<Directory>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/names", get(list_names))
        .route(
            "/names/:name",
            get(lookup_name).put(rebind_name).delete(unbind_name),
        )
        .with_state(directory)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

async fn list_names(State(directory): State<Arc<Directory>>) -> Json<Vec<String>> {
    Json(directory.names())
}

async fn lookup_name(
    State(directory): State<Arc<Directory>>,
    Path(name): Path<String>,
) -> Response {
    match directory.get(&name) {
        Some(endpoint) => (StatusCode::OK, Json(endpoint)).into_response(),
        None => (StatusCode::NOT_FOUND, "Name not bound").into_response(),
    }
}

async fn rebind_name(
    State(directory): State<Arc<Directory>>,
    Path(name): Path<String>,
    Json(endpoint): Json<StubEndpoint>,
) -> StatusCode {
    tracing::debug!(name = %name, object = %endpoint.object_id, "rebind");
    directory.insert(name, endpoint);
    StatusCode::NO_CONTENT
}

async fn unbind_name(
    State(directory): State<Arc<Directory>>,
    Path(name): Path<String>,
) -> StatusCode {
    match directory.remove(&name) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Objects served on one export port, addressed by object id.
#[derive(Default)]
pub(crate) struct ObjectTable {
    objects: RwLock<HashMap<Uuid, Arc<dyn RemoteService>>>,
}

impl ObjectTable {
    pub(crate) fn insert(&self, id: Uuid, service: Arc<dyn RemoteService>) {
        self.objects.write().insert(id, service);
    }

    pub(crate) fn remove(&self, id: &Uuid) -> bool {
        self.objects.write().remove(id).is_some()
    }

    pub(crate) fn get(&self, id: &Uuid) -> Option<Arc<dyn RemoteService>> {
        self.objects.read().get(id).cloned()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

pub(crate) fn object_router(table: Arc<ObjectTable>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/objects/:id/:method", post(invoke_object))
        .with_state(table)
}

async fn invoke_object(
    State(table): State<Arc<ObjectTable>>,
    Path((id, method)): Path<(Uuid, String)>,
    Json(args): Json<Value>,
) -> Response {
    let Some(service) = table.get(&id) else {
        return (StatusCode::NOT_FOUND, "No such object").into_response();
    };

    match service.invoke(&method, args).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(fault) => (StatusCode::UNPROCESSABLE_ENTITY, Json(fault)).into_response(),
    }
}
