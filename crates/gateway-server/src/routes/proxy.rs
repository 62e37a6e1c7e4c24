use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use gateway_core::{CorrelationId, Identity};
use gateway_proxy::{ProxyRequest, ProxyResponse};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::middleware::request_context;
use crate::state::AppState;

/// `ANY /api/v1/<service>/{rest...}`: the dispatch core's ingress.
///
/// The route table picks the downstream by longest prefix; the resilient
/// proxy does the rest (headers, retries, breaker, failure mapping).
pub async fn forward(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    request: Request,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);

    let Some(matched) = state.routes.resolve(&path) else {
        return Err(ApiError::not_found(format!("no route for {path}")));
    };
    let service_name = matched.service_name.to_string();
    let mut path_and_query = if matched.rest.is_empty() {
        "/".to_string()
    } else {
        matched.rest.to_string()
    };
    if let Some(query) = query {
        path_and_query.push('?');
        path_and_query.push_str(&query);
    }

    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_else(CorrelationId::generate);
    let method = request.method().clone();
    let headers = request.headers().clone();

    let body = axum::body::to_bytes(request.into_body(), 2 * 1024 * 1024)
        .await
        .map_err(|err| {
            ApiError::new(
                http::StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                err.to_string(),
            )
        })?;

    let context = request_context(
        &state,
        correlation_id,
        Identity::User(claims.sub),
        method.clone(),
        &path,
    );

    let target = state
        .target(&service_name)
        .ok_or_else(|| ApiError::internal(format!("service {service_name} not configured")))?;
    let proxy = state
        .proxies
        .proxy(&target)
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let proxied = proxy
        .forward(
            ProxyRequest::new(method, path_and_query, context)
                .with_headers(headers)
                .with_body(body),
        )
        .await;

    Ok(to_axum_response(proxied))
}

fn to_axum_response(proxied: ProxyResponse) -> Response {
    let mut response = (proxied.status, proxied.body).into_response();
    *response.headers_mut() = proxied.headers;
    response
}
