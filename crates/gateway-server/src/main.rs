//! Gateway binary: builds the shared state once, wires the middleware and
//! routes, and serves until interrupted.

mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use crate::config::GatewayConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // RUST_LOG wins; LOG_LEVEL is the deployment-friendly fallback.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration error");
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .expect("install prometheus recorder");

    for service in &config.services {
        if service.auth_secret.is_none() {
            tracing::warn!(
                service = service.name,
                "service auth secret not configured; downstream will reject forwarded requests"
            );
        }
    }

    let addr = config.bind_addr();
    let state = AppState::new(config, prometheus);
    let app = routes::router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %addr, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %addr, "gateway listening");

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = serve.await {
        tracing::error!(error = %err, "server error");
    }

    tracing::info!("gateway shut down");
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for shutdown signal");
    }
}
