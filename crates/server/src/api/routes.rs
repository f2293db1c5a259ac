use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{dispatch, handlers, leads, middleware as mw, pipeline, session, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Session
        .route("/session", get(session::get_session))
        .route("/session/profile", put(session::update_profile))
        .route("/session/credits", post(session::add_credits))
        .route("/senders", get(session::list_senders).post(session::add_sender))
        .route("/senders/{id}", delete(session::remove_sender))
        // Leads
        .route("/leads", get(leads::list_leads).delete(leads::clear_leads))
        .route("/leads/queue", post(leads::queue_leads))
        .route("/leads/{id}", get(leads::get_lead).delete(leads::delete_lead))
        // Pipeline
        .route("/pipeline/run", post(pipeline::run_pipeline))
        .route("/pipeline/cancel", post(pipeline::cancel_pipeline))
        .route("/pipeline/status", get(pipeline::get_status))
        // Dispatch
        .route("/dispatch/start", post(dispatch::start))
        .route("/dispatch/stop", post(dispatch::stop))
        .route("/dispatch/status", get(dispatch::get_status))
        .route("/dispatch/logs", get(dispatch::get_logs))
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            mw::auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(mw::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
