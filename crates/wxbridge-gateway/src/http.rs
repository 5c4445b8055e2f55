use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe: process is up and serving requests.
pub async fn health_handler(State(_state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /status — a snapshot of the monitor's health score, per-instance
/// connectivity, and delivery counters. Read-only; never mutates state.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.monitor.snapshot().await;
    Json(json!({
        "health_score": snapshot.health_score,
        "connected_instances": snapshot.connected_instances,
        "total_instances": snapshot.total_instances,
        "active_listeners": snapshot.active_listeners,
        "processed": snapshot.processed,
        "delivered": snapshot.delivered,
        "replied": snapshot.replied,
        "failed": snapshot.failed,
        "recent_errors": snapshot.recent_errors,
    }))
}
