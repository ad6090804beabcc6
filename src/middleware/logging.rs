//! Request logging
//!
//! Every request gets a span carrying its `x-request-id`; completion is
//! logged at a level that follows the response status.

use std::time::Instant;
use axum::extract::Request;
use axum::http::HeaderName;
use axum::middleware::Next;
use axum::response::Response;
use tower_http::trace::MakeSpan;
use tracing::{error, info, info_span, warn, Span};

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

fn request_id<B>(request: &axum::http::Request<B>) -> &str {
    request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// Span factory for the HTTP trace layer
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id(request),
        )
    }
}

pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        error!(%method, path = %path, status, elapsed_ms, "Request failed");
    } else if response.status().is_client_error() {
        warn!(%method, path = %path, status, elapsed_ms, "Request rejected");
    } else {
        info!(%method, path = %path, status, elapsed_ms, "Request completed");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_request_id_fallback() {
        let request = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(request_id(&request), "-");

        let request = axum::http::Request::builder()
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_id(&request), "abc-123");
    }
}
