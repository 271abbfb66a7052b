//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use crate::predictor::ProbeStatus;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    predictor: PredictorHealth,
}

#[derive(Serialize)]
pub struct PredictorHealth {
    interpreter: String,
    available: bool,
    detail: String,
    checked_at: Option<i64>,
}

/// Reports the last interpreter probe; never spawns a process itself
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let interpreter = state.predictor.config().interpreter.clone();

    let predictor = match state.predictor.last_probe().await {
        Some(ProbeStatus { available, detail, checked_at }) => PredictorHealth {
            interpreter,
            available,
            detail,
            checked_at: Some(checked_at.timestamp()),
        },
        None => PredictorHealth {
            interpreter,
            available: false,
            detail: "not checked yet".to_string(),
            checked_at: None,
        },
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        predictor,
    })
}
