//! Session, profile, credits and sender pool handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use prospector_core::{
    dispatch::active_index, lead::is_plausible_email, SenderCredential, SenderProfile,
    SenderStatus,
};

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// A linked mailbox as shown to clients. The access token never leaves the server.
#[derive(Debug, Serialize)]
pub struct SenderView {
    pub id: String,
    pub email: String,
    pub status: SenderStatus,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Whether this sender handles the next send.
    pub next_up: bool,
}

impl SenderView {
    fn new(sender: SenderCredential, next_up: bool) -> Self {
        Self {
            id: sender.id,
            email: sender.email,
            status: sender.status,
            usage_count: sender.usage_count,
            last_used_at: sender.last_used_at,
            next_up,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub profile: SenderProfile,
    pub quota: u32,
    pub rotation_cursor: usize,
    pub senders: Vec<SenderView>,
}

#[derive(Debug, Deserialize)]
pub struct AddCreditsBody {
    pub credits: u32,
}

#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    pub quota: u32,
}

#[derive(Debug, Deserialize)]
pub struct AddSenderBody {
    pub email: String,
    pub access_token: String,
}

fn sender_views(senders: Vec<SenderCredential>, cursor: usize) -> Vec<SenderView> {
    let next = active_index(senders.len(), cursor).ok();
    senders
        .into_iter()
        .enumerate()
        .map(|(i, s)| SenderView::new(s, Some(i) == next))
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let session = state.session().snapshot().await;
    Json(SessionResponse {
        user_id: session.user_id,
        profile: session.profile,
        quota: session.quota,
        rotation_cursor: session.rotation_cursor,
        senders: sender_views(session.senders, session.rotation_cursor),
    })
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<SenderProfile>,
) -> Result<Json<SenderProfile>, ApiError> {
    if profile.company_name.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "company_name cannot be empty",
        ));
    }
    state.session().set_profile(profile.clone()).await;
    info!(company = %profile.company_name, "Sender profile updated");
    Ok(Json(profile))
}

pub async fn add_credits(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddCreditsBody>,
) -> Result<Json<QuotaResponse>, ApiError> {
    if body.credits == 0 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "credits must be positive",
        ));
    }
    let quota = state.session().add_credits(body.credits).await;
    Ok(Json(QuotaResponse { quota }))
}

pub async fn list_senders(State(state): State<Arc<AppState>>) -> Json<Vec<SenderView>> {
    let session = state.session();
    let cursor = session.cursor().await;
    Json(sender_views(session.senders().await, cursor))
}

pub async fn add_sender(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddSenderBody>,
) -> Result<(StatusCode, Json<SenderView>), ApiError> {
    let email = body.email.trim();
    if !is_plausible_email(email) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a valid email address", email),
        ));
    }
    if body.access_token.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "access_token cannot be empty",
        ));
    }

    let session = state.session();
    let sender = session
        .add_sender(SenderCredential::new(email, body.access_token.trim()))
        .await;
    info!(email = %sender.email, "Sender linked");

    let view = sender_views(session.senders().await, session.cursor().await)
        .into_iter()
        .find(|v| v.id == sender.id)
        .unwrap_or_else(|| SenderView::new(sender, false));
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn remove_sender(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.session().remove_sender(&id).await {
        Some(sender) => {
            info!(email = %sender.email, "Sender unlinked");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Sender not found: {}", id),
        )),
    }
}
