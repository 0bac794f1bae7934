//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use core_kernel::{AdapterHealth, HealthCheckResult, Store};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: AdapterHealth,
    pub version: String,
    pub checked_at: DateTime<Utc>,
    pub checks: Vec<HealthCheckResult>,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check over every registered adapter
///
/// Degraded adapters keep the service ready; one unhealthy adapter
/// turns the response into a 503.
pub async fn readiness_check<S>(State(state): State<AppState<S>>) -> (StatusCode, Json<ReadinessResponse>)
where
    S: Store,
{
    let mut checks = Vec::with_capacity(state.health.len());
    for adapter in state.health.iter() {
        checks.push(adapter.health_check().await);
    }

    let status = if checks.iter().any(|c| c.status == AdapterHealth::Unhealthy) {
        AdapterHealth::Unhealthy
    } else if checks.iter().any(|c| c.status == AdapterHealth::Degraded) {
        AdapterHealth::Degraded
    } else {
        AdapterHealth::Healthy
    };
    let code = match status {
        AdapterHealth::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        code,
        Json(ReadinessResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checked_at: Utc::now(),
            checks,
        }),
    )
}
