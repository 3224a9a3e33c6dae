//! HTTP and RPC handler construction, shared state, and signal handling.
//!
//! Contains [`AppState`] (the `Arc`-shared state read by the health
//! endpoint), [`build_router`] for the Axum router with its middleware
//! layers and JSON fallbacks, [`build_rpc_router`] for the tonic router carrying the standard
//! gRPC health service, and [`shutdown_signal`] for SIGTERM / Ctrl+C
//! handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::health::{health_handler, TargetHealth};

pub struct AppState {
    pub start_time: Instant,
    pub targets: Vec<TargetHealth>,
}

impl AppState {
    #[must_use]
    pub fn new(targets: Vec<TargetHealth>) -> Self {
        Self {
            start_time: Instant::now(),
            targets,
        }
    }
}

/// JSON body returned for requests the router cannot serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    tracing::warn!(status = status.as_u16(), code, "failed to handle request");
    let body = ErrorBody {
        code: code.to_string(),
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

async fn not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "not_found",
        "The requested resource was not found",
    )
}

async fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        "Method is not allowed",
    )
}

pub fn build_router(state: Arc<AppState>, request_timeout: Duration, max_body: usize) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .with_state(state);
    with_http_middleware(router, request_timeout, max_body)
}

/// Wrap `router` with the JSON fallbacks and the middleware stack shared by
/// every HTTP target: tracing, panic recovery, body limit, permissive CORS
/// and the per-request timeout.
pub fn with_http_middleware(router: Router, request_timeout: Duration, max_body: usize) -> Router {
    // Layers that answer on their own (timeout, CORS preflight) need a
    // response body with a default, so they sit inside the body limit.
    router
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(RequestBodyLimitLayer::new(max_body))
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
}

/// Build the RPC router serving `grpc.health.v1.Health`, reporting the
/// whole server as serving.
pub async fn build_rpc_router() -> (HealthReporter, tonic::transport::server::Router) {
    let (mut reporter, health_service) = tonic_health::server::health_reporter();
    reporter
        .set_service_status("", ServingStatus::Serving)
        .await;
    let router = tonic::transport::Server::builder().add_service(health_service);
    (reporter, router)
}

/// Flip the RPC health status to not-serving once `token` is cancelled so
/// load balancers stop routing before the listener goes away.
pub async fn report_not_serving_on_cancel(mut reporter: HealthReporter, token: CancellationToken) {
    token.cancelled().await;
    reporter
        .set_service_status("", ServingStatus::NotServing)
        .await;
    tracing::debug!("rpc health status set to not serving");
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
