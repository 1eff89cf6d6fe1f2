use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use campaign_engine::session::{SessionEngine, SessionRegistry};

mod channels;
mod errors;
mod health;
pub mod models;
mod sessions;

#[derive(Clone)]
pub struct AppState {
    pub engine: SessionEngine,
    pub registry: Arc<SessionRegistry>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/channels/{channel}/schema", get(channels::channel_schema))
        .route("/v1/sessions", post(sessions::create_session))
        .route(
            "/v1/sessions/{session_id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/v1/sessions/{session_id}/generate", post(sessions::generate))
        .route(
            "/v1/sessions/{session_id}/select",
            post(sessions::select_variant),
        )
        .route("/v1/sessions/{session_id}/edit", post(sessions::edit_selected))
        .with_state(app_state)
}
