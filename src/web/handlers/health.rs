//! Health check HTTP handlers

use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::services::QueueStats;
use crate::web::{AppState, responses::ok};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` while every slot is busy
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub task_queue: QueueStats,
}

impl HealthResponse {
    pub fn from_stats(stats: QueueStats) -> Self {
        let status = if stats.is_saturated() {
            "degraded"
        } else {
            "healthy"
        };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            task_queue: stats,
        }
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    ok(HealthResponse::from_stats(state.task_queue.snapshot()))
}

/// Liveness check (for Kubernetes probes)
pub async fn liveness_check() -> impl IntoResponse {
    ok(serde_json::json!({
        "status": "alive",
        "timestamp": chrono::Utc::now()
    }))
}
