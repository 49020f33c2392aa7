//! Task submission and queue statistics handlers

use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::duration_serde;
use crate::errors::AppResult;
use crate::web::{AppState, extractors::ValidatedJson, responses::ok};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTaskRequest {
    /// Script followed by its parameters
    pub args: Vec<String>,
    /// Overrides the configured default budget
    #[serde(default, with = "duration_serde::option_duration")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTaskResponse {
    pub output: String,
    pub elapsed_ms: u64,
}

/// Run a script through the bounded queue and return its trimmed output
pub async fn run_task(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RunTaskRequest>,
) -> AppResult<impl IntoResponse> {
    let started = Instant::now();
    let output = state
        .task_queue
        .execute(request.args, request.timeout)
        .await?;

    Ok(ok(RunTaskResponse {
        output,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

pub async fn queue_stats(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.task_queue.snapshot())
}
