//! Correlation id ("flow id") propagation.
//!
//! Every inbound HTTP request carries an `X-Flow-ID` header; it is read if
//! present or synthesized otherwise, threaded through the request's tracing
//! span, and echoed back in the response header. Background loops (ingestion
//! ticks, the reflection sweep) allocate a fresh id at their own loop boundary
//! rather than inheriting one, since they have no inbound request to carry it.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const FLOW_ID_HEADER: &str = "x-flow-id";

/// A correlation id threaded through logs, audit events, and persisted runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowId(pub String);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read `X-Flow-ID` from inbound headers, or synthesize a fresh id.
fn read_or_generate(req: &Request<Body>) -> FlowId {
    req.headers()
        .get(FLOW_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| FlowId(s.to_string()))
        .unwrap_or_default()
}

/// Extract the flow id previously injected into request extensions.
pub fn extract_flow_id(req: &Request<Body>) -> Option<&FlowId> {
    req.extensions().get::<FlowId>()
}

/// Middleware: inject the inbound-or-generated flow id into request
/// extensions and echo it back on the response.
pub async fn flow_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let flow_id = read_or_generate(&req);
    req.extensions_mut().insert(flow_id.clone());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(flow_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(FLOW_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body as AxumBody;
    use axum::http::Request as HttpRequest;

    #[test]
    fn generates_new_flow_id_when_absent() {
        let req = HttpRequest::builder().body(AxumBody::empty()).unwrap();
        let id = read_or_generate(&req);
        assert!(!id.as_str().is_empty());
    }

    #[test]
    fn reuses_inbound_flow_id_when_present() {
        let req = HttpRequest::builder()
            .header(FLOW_ID_HEADER, "abc-123")
            .body(AxumBody::empty())
            .unwrap();
        let id = read_or_generate(&req);
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn ignores_blank_inbound_header() {
        let req = HttpRequest::builder()
            .header(FLOW_ID_HEADER, "   ")
            .body(AxumBody::empty())
            .unwrap();
        let id = read_or_generate(&req);
        assert_ne!(id.as_str(), "   ");
    }
}
