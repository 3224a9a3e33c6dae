//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the build
//! version and commit, uptime, and the targets this process serves.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub commit: String,
    pub uptime_seconds: u64,
    pub targets: Vec<TargetHealth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHealth {
    pub protocol: String,
    pub address: String,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("SERVEMUX_GIT_SHORT").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        targets: state.targets.clone(),
    })
}
