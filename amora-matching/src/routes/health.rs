use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use amora_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut checks = vec![match state.store.ping().await {
        Ok(()) => HealthCheck::ok("storage"),
        Err(e) => HealthCheck::failed("storage", e.to_string()),
    }];

    // A dropped broker connection only loses events, so it degrades rather than fails.
    if let Some(connected) = state.events.is_connected() {
        checks.push(if connected {
            HealthCheck::ok("rabbitmq")
        } else {
            HealthCheck {
                name: "rabbitmq".into(),
                status: HealthStatus::Degraded,
                message: Some("channel closed".into()),
            }
        });
    }

    let lock_check = format!("pair_locks:{}", state.locks.backend_name());
    checks.push(match state.locks.ping().await {
        Ok(()) => HealthCheck::ok(lock_check),
        Err(e) => HealthCheck::failed(lock_check, e.to_string()),
    });

    Json(HealthResponse::healthy("amora-matching", env!("CARGO_PKG_VERSION")).with_checks(checks))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            String::new(),
        ),
    }
}
