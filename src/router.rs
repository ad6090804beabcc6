//! Application router
//!
//! Shared by the server binary and the integration tests so both run the
//! same middleware stack.

use std::time::Duration;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{warn, Level};
use crate::config::ServerConfig;
use crate::handlers;
use crate::middleware::auth::API_KEY_HEADER;
use crate::middleware::logging::{log_requests, RequestSpan, REQUEST_ID_HEADER};
use crate::middleware::rate_limit::public_rate_limit;
use crate::state::AppState;

/// Full application router with all middleware layers.
///
/// Layers, outermost first: CORS, request id, tracing, request id
/// propagation, timeout, panic recovery, request logging.
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.settings.server);
    let timeout = Duration::from_secs(state.settings.server.request_timeout_seconds.max(1));

    let public = handlers::public::router()
        .route_layer(from_fn_with_state(state.clone(), public_rate_limit));

    Router::new()
        .merge(public)
        .nest("/auth", handlers::auth::router())
        .nest("/admin", handlers::admin::router().merge(handlers::scheduler::router()))
        .nest("/settings", handlers::settings::router())
        .nest("/agent", handlers::agent::router())
        .layer(from_fn(log_requests))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(RequestSpan)
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER.clone(), MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// CORS layer from the configured origins; invalid origins are skipped
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, HeaderName::from_static(API_KEY_HEADER)])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
