use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures::future::join_all;
use serde_json::json;

use crate::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "gateway-server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Liveness: the process is up.
pub async fn liveness() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "gateway"}))
}

/// Readiness: every configured downstream answers its own health check
/// within the probe timeout.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let checks = state.config.services.iter().map(|service| {
        let client = state.probe_client.clone();
        let url = format!("{}/health", service.base_url.trim_end_matches('/'));
        let name = service.name;
        async move {
            let healthy = match client.get(&url).send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            };
            (name, healthy)
        }
    });

    let results: BTreeMap<&str, bool> = join_all(checks).await.into_iter().collect();
    let ok = results.values().all(|healthy| *healthy);

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({"ok": ok, "services": results})))
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.prometheus.render()
}
