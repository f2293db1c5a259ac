//! Enrichment pipeline handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use prospector_core::{PipelineError, PipelineRequest, PipelineStatus};

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunPipelineBody {
    /// Market description or a URL to read companies from.
    pub query: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub location: String,
    /// Defaults to the configured maximum.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RunPipelineResponse {
    pub message: String,
    pub query: String,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Start a run in the background. Progress is streamed over the websocket.
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunPipelineBody>,
) -> Result<(StatusCode, Json<RunPipelineResponse>), ApiError> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "query cannot be empty"));
    }
    let max = state.config().pipeline.max_leads;
    let limit = body.limit.unwrap_or(max).min(max);
    if limit == 0 {
        return Err(error_response(StatusCode::BAD_REQUEST, "limit must be positive"));
    }

    let request = PipelineRequest::new(query, limit)
        .with_sector(body.sector.trim())
        .with_location(body.location.trim());

    match state
        .pipeline()
        .spawn(request, Arc::clone(state.session()))
        .await
    {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(RunPipelineResponse {
                message: "Pipeline run started".to_string(),
                query: query.to_string(),
                limit,
            }),
        )),
        Err(e @ PipelineError::AlreadyRunning) => {
            Err(error_response(StatusCode::CONFLICT, e.to_string()))
        }
        Err(e @ PipelineError::InsufficientBalance) => {
            Err(error_response(StatusCode::PAYMENT_REQUIRED, e.to_string()))
        }
        Err(e) => Err(error_response(StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

pub async fn cancel_pipeline(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.pipeline().cancel(),
    })
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<PipelineStatus> {
    Json(state.pipeline().status().await)
}
