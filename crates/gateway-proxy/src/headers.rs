//! Header policy applied on every forwarded attempt.
//!
//! The stripped set covers hop-by-hop headers plus `Authorization`: end-user
//! credentials never reach a downstream; service-to-service trust rides in
//! `X-Service-Auth` instead.

use gateway_core::{RequestContext, CORRELATION_HEADER};
use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Request headers that never cross the proxy boundary.
pub const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "authorization",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers dropped before the downstream reply reaches the client.
pub const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "upgrade",
];

/// Header naming this gateway on proxied responses.
pub const PROXIED_BY_HEADER: &str = "x-proxied-by";
/// Value for [`PROXIED_BY_HEADER`].
pub const PROXIED_BY_VALUE: &str = "gateway";
/// Header carrying the service-to-service secret.
pub const SERVICE_AUTH_HEADER: &str = "x-service-auth";
/// W3C trace-context header forwarded verbatim when present.
pub const TRACEPARENT_HEADER: &str = "traceparent";

fn is_stripped(name: &HeaderName, stripped: &[&str]) -> bool {
    stripped.iter().any(|s| name.as_str() == *s)
}

/// Builds the outbound header map for one attempt: copy the inbound headers
/// minus the stripped set, then inject correlation and service auth.
pub fn prepare_forward_headers(
    inbound: &HeaderMap,
    context: &RequestContext,
    service_auth_secret: Option<&str>,
) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.len() + 2);

    for (name, value) in inbound {
        if !is_stripped(name, STRIPPED_REQUEST_HEADERS) {
            outbound.append(name.clone(), value.clone());
        }
    }

    if let Ok(value) = HeaderValue::from_str(context.correlation_id.as_str()) {
        outbound.insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }

    if let Some(secret) = service_auth_secret {
        if let Ok(value) = HeaderValue::from_str(secret) {
            outbound.insert(HeaderName::from_static(SERVICE_AUTH_HEADER), value);
        }
    }

    outbound
}

/// Filters a downstream response's headers and stamps the gateway markers.
pub fn decorate_response_headers(downstream: &HeaderMap, context: &RequestContext) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(downstream.len() + 2);

    for (name, value) in downstream {
        if !is_stripped(name, STRIPPED_RESPONSE_HEADERS) {
            headers.append(name.clone(), value.clone());
        }
    }

    if let Ok(value) = HeaderValue::from_str(context.correlation_id.as_str()) {
        headers.insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(PROXIED_BY_HEADER),
        HeaderValue::from_static(PROXIED_BY_VALUE),
    );

    headers
}
