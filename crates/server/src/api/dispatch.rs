//! Dispatch loop handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use prospector_core::{DispatchLogEntry, DispatchStatus};

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    /// False when the loop was already in the requested state.
    pub changed: bool,
    pub status: DispatchStatus,
}

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    pub limit: Option<usize>,
}

pub async fn start(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ToggleResponse>, ApiError> {
    if state.session().senders().await.is_empty() {
        return Err(error_response(
            StatusCode::CONFLICT,
            "No sender available: link a mailbox first",
        ));
    }
    let changed = state.dispatch().start().await;
    Ok(Json(ToggleResponse {
        changed,
        status: state.dispatch().status().await,
    }))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<ToggleResponse> {
    let changed = state.dispatch().stop().await;
    Json(ToggleResponse {
        changed,
        status: state.dispatch().status().await,
    })
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<DispatchStatus> {
    Json(state.dispatch().status().await)
}

/// Most recent log lines, oldest first.
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsParams>,
) -> Json<Vec<DispatchLogEntry>> {
    let logs = state.dispatch().logs();
    let skip = params
        .limit
        .map(|limit| logs.len().saturating_sub(limit))
        .unwrap_or(0);
    Json(logs.into_iter().skip(skip).collect())
}
