use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tether_agent::{Transition, activate_from_path, admin};
use tether_wire::HttpTransport;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tether-agent")]
#[command(about = "Binds remote tether services and keeps them connected", long_about = None)]
struct Cli {
    /// Client config listing remote services to bind
    #[arg(long, env = "TETHER_CONFIG", default_value = "tether.toml")]
    config: PathBuf,

    #[arg(long, env = "TETHER_AGENT_ADMIN_ADDR", default_value = "127.0.0.1:3001")]
    admin_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics = admin::install_recorder();

    let cli = Cli::parse();
    let transport = Arc::new(HttpTransport::new());

    let Some(handle) = activate_from_path(&cli.config, transport.clone()).await? else {
        tracing::info!("nothing to monitor, exiting");
        return Ok(());
    };

    for binding in handle.bindings().all() {
        tracing::info!(
            service = %binding.name(),
            address = %binding.address(),
            state = %binding.state(),
            "binding"
        );
    }

    let reporter = tokio::spawn(report_transitions(handle.subscribe()));

    let app = admin::router(handle.bindings().clone(), metrics);
    tracing::info!("admin listening on {}", cli.admin_addr);
    let server = axum::Server::bind(&cli.admin_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!("admin server error: {}", e);
    }

    handle.stop().await;
    reporter.abort();
    transport.shutdown().await;
    Ok(())
}

async fn report_transitions(mut events: broadcast::Receiver<Transition>) {
    loop {
        match events.recv().await {
            Ok(t) => tracing::info!(
                service = %t.service,
                from = %t.from,
                to = %t.to,
                generation = t.generation,
                "binding state changed"
            ),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "missed binding state changes")
            }
            Err(RecvError::Closed) => break,
        }
    }
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

    tracing::info!("signal received, stopping monitor");
}
