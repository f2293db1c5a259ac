//! Lead collection handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use prospector_core::{
    lead::is_plausible_email, AutomationStatus, Lead, ProcessingStatus,
};

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsParams {
    pub status: Option<ProcessingStatus>,
    pub automation: Option<AutomationStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListLeadsResponse {
    pub leads: Vec<Lead>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearLeadsResponse {
    pub removed: usize,
}

/// Leads to queue for outreach. Without `ids`, every enriched lead with a
/// usable address that has not been sent yet is queued.
#[derive(Debug, Default, Deserialize)]
pub struct QueueLeadsBody {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct QueueLeadsResponse {
    pub queued: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLeadsParams>,
) -> Json<ListLeadsResponse> {
    let leads: Vec<Lead> = state
        .leads()
        .list()
        .await
        .into_iter()
        .filter(|l| params.status.is_none_or(|s| l.status == s))
        .filter(|l| params.automation.is_none_or(|a| l.automation == a))
        .collect();
    let total = leads.len();
    Json(ListLeadsResponse { leads, total })
}

pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Lead>, ApiError> {
    state
        .leads()
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Lead not found: {}", id)))
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.leads().remove(&id).await {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Lead not found: {}", id),
        )),
    }
}

pub async fn clear_leads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearLeadsResponse>, ApiError> {
    if state.pipeline().is_running() {
        return Err(error_response(
            StatusCode::CONFLICT,
            "Cannot clear leads while a pipeline run is in progress",
        ));
    }
    let removed = state.leads().len().await;
    state.leads().clear().await;
    info!(removed, "Lead collection cleared");
    Ok(Json(ClearLeadsResponse { removed }))
}

pub async fn queue_leads(
    State(state): State<Arc<AppState>>,
    body: Option<Json<QueueLeadsBody>>,
) -> Json<QueueLeadsResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let ids = match body.ids {
        Some(ids) => ids,
        None => state
            .leads()
            .list()
            .await
            .into_iter()
            .filter(|l| {
                l.status == ProcessingStatus::Completed
                    && matches!(l.automation, AutomationStatus::Idle)
                    && is_plausible_email(&l.email)
            })
            .map(|l| l.id)
            .collect(),
    };

    let queued = state.leads().queue(&ids).await;
    info!(count = queued.len(), "Leads queued for outreach");
    Json(QueueLeadsResponse { queued })
}
