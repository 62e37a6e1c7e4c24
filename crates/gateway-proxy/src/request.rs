use bytes::Bytes;
use gateway_core::RequestContext;
use http::{HeaderMap, Method, StatusCode};

/// One proxied request as it leaves the ingress handler.
///
/// The body is fully buffered so the retry layer can replay the request;
/// streaming bodies are out of scope for this version.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path below the routed prefix, plus the query string.
    pub path_and_query: String,
    /// Inbound headers before the forwarding policy is applied.
    pub headers: HeaderMap,
    pub body: Bytes,
    pub context: RequestContext,
}

impl ProxyRequest {
    pub fn new(method: Method, path_and_query: impl Into<String>, context: RequestContext) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            context,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

/// A downstream response, and equally the shape handed back to the client
/// after decoration.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Builds a JSON response, used by the failure-mapping paths.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(value.to_string()),
        }
    }
}
