use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;

use crate::binding::BindingSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSummary {
    pub name: String,
    pub address: String,
    pub state: String,
    pub generation: u64,
    pub last_probe_ms: Option<u64>,
}

/// Installs the process-wide Prometheus recorder. The monitor's probe and
/// reconnect counters are only kept once this has run.
pub fn install_recorder() -> PrometheusHandle {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    if let Err(e) = metrics::set_global_recorder(recorder) {
        tracing::warn!(error = %e, "metrics recorder already installed");
    }
    handle
}

pub fn summaries(bindings: &BindingSet) -> Vec<BindingSummary> {
    bindings
        .all()
        .iter()
        .map(|binding| {
            let snapshot = binding.snapshot();
            BindingSummary {
                name: binding.name().to_string(),
                address: binding.address().to_string(),
                state: snapshot.state.to_string(),
                generation: snapshot.generation,
                last_probe_ms: snapshot.last_probe_ms,
            }
        })
        .collect()
}

/// `/health`, `/metrics` and `/bindings` for the agent's admin address.
pub fn router(bindings: BindingSet, metrics: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(move || {
            let rendered = metrics.render();
            async move { rendered }
        }))
        .route("/bindings", get(list_bindings))
        .with_state(bindings)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

async fn list_bindings(State(bindings): State<BindingSet>) -> impl IntoResponse {
    Json(summaries(&bindings))
}
