//! Liveness probe

use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "runningJobs": state.processor.running_jobs().len(),
    }))
}
