mod admin;
mod auth;
mod checkout;
mod health;
mod proxy;

use axum::http::HeaderValue;
use axum::routing::{any, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::liveness))
        .route("/readiness", get(health::readiness))
        .route("/metrics", get(health::metrics))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/api/v1/checkout", post(checkout::checkout))
        .route("/api/v1/circuit-breakers", get(admin::circuit_breakers))
        .route(
            "/api/v1/circuit-breakers/:service/reset",
            post(admin::reset_circuit_breaker),
        )
        .route("/api/v1/sagas/:saga_id", get(admin::saga_status))
        .route("/api/v1/*path", any(proxy::forward))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn(crate::middleware::observability))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .expose_headers([
            http::HeaderName::from_static("x-ratelimit-limit"),
            http::HeaderName::from_static("x-ratelimit-remaining"),
            http::HeaderName::from_static("x-ratelimit-reset"),
            http::HeaderName::from_static("x-correlation-id"),
        ])
}
