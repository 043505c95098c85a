mod demo;

use std::{net::SocketAddr, sync::Arc};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use tether_core::{DEFAULT_EXPORT_PORT, DEFAULT_REGISTRY_PORT, ExportDescriptor};
use tether_registry::RegistryHandles;
use tether_server::{ServiceExporter, resolve_advertised_host};
use tether_wire::HttpTransport;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tether-server")]
#[command(about = "Exports the demo services into a tether registry", long_about = None)]
struct Cli {
    /// Host embedded in exported stubs; must be reachable by clients
    #[arg(long, env = "TETHER_HOSTNAME")]
    hostname: Option<String>,

    #[arg(long, env = "TETHER_REGISTRY_PORT", default_value_t = DEFAULT_REGISTRY_PORT)]
    registry_port: u16,

    /// Fixed port the exported objects are served on
    #[arg(long, env = "TETHER_EXPORT_PORT", default_value_t = DEFAULT_EXPORT_PORT)]
    export_port: u16,

    #[arg(long, env = "TETHER_ADMIN_ADDR", default_value = "127.0.0.1:3000")]
    admin_addr: SocketAddr,
}

#[derive(Clone, Serialize)]
struct ExportSummary {
    name: String,
    address: String,
    export_port: u16,
    object_id: String,
    registry: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).ok();

    let cli = Cli::parse();
    let host = resolve_advertised_host(cli.hostname.as_deref());

    let transport = Arc::new(HttpTransport::new());
    let registries = Arc::new(RegistryHandles::new(transport.clone()));
    let mut exporter = ServiceExporter::new(registries, transport.clone(), host);

    let descriptor = ExportDescriptor::default()
        .with_registry_port(cli.registry_port)
        .with_export_port(cli.export_port);
    exporter
        .declare(Arc::new(demo::Greeter), descriptor.clone())
        .declare(Arc::new(demo::Clock::default()), descriptor);

    let report = exporter.activate().await;
    tracing::info!(
        exported = report.exported.len(),
        failed = report.failed.len(),
        "export phase finished"
    );

    let summaries: Arc<Vec<ExportSummary>> = Arc::new(
        report
            .exported
            .iter()
            .map(|e| ExportSummary {
                name: e.descriptor.name.clone(),
                address: e.address().to_string(),
                export_port: e.endpoint.port,
                object_id: e.endpoint.object_id.to_string(),
                registry: e.registry_mode.to_string(),
            })
            .collect(),
    );

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(move || {
            let rendered = handle.render();
            async move { rendered }
        }))
        .route("/exports", get(list_exports))
        .with_state(summaries);

    tracing::info!("admin listening on {}", cli.admin_addr);
    let server = axum::Server::bind(&cli.admin_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!("admin server error: {}", e);
    }

    exporter.shutdown().await;
    transport.shutdown().await;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

async fn list_exports(State(summaries): State<Arc<Vec<ExportSummary>>>) -> impl IntoResponse {
    Json(summaries.as_ref().clone())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, withdrawing exports");
}
