use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use campaign_engine::content::Channel;
use campaign_engine::session::{CampaignBrief, SharedSession};
use tracing::info;
use uuid::Uuid;

use super::AppState;
use super::errors::{bad_request_response, session_error_response, session_not_found_response};
use super::models::{
    CreateSessionResponse, EditRequest, GenerateRequest, OkResponse, SelectVariantRequest,
};

pub(super) async fn create_session(State(state): State<AppState>) -> Response {
    let session_id = state.registry.insert(state.engine.new_session());
    info!(session_id = %session_id, "campaign session created");

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    )
        .into_response()
}

pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some((_, session)) = checkout(&state, &session_id) else {
        return session_not_found_response();
    };

    let snapshot = session.lock().await.snapshot();
    (StatusCode::OK, Json(snapshot)).into_response()
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Ok(session_id) = Uuid::parse_str(&session_id) else {
        return session_not_found_response();
    };

    if state.registry.remove(session_id) {
        info!(session_id = %session_id, "campaign session ended");
        return (StatusCode::OK, Json(OkResponse { ok: true })).into_response();
    }

    session_not_found_response()
}

pub(super) async fn generate(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let Some((session_id, session)) = checkout(&state, &session_id) else {
        return session_not_found_response();
    };

    let channel = match request.channel.parse::<Channel>() {
        Ok(channel) => channel,
        Err(err) => return bad_request_response("invalid_request", &err.to_string()),
    };

    let mut brief = CampaignBrief::new(request.prompt, channel);
    if let Some(language) = request.language {
        brief = brief.with_language(language);
    }
    if let Some(tone) = request.tone {
        brief = brief.with_tone(tone);
    }
    if let Some(max_length) = request.max_length {
        brief = brief.with_max_length(max_length);
    }
    if let Some(variants) = request.variants {
        brief = brief.with_variant_count(variants);
    }

    let mut session = session.lock().await;
    let result = state.engine.generate(&mut session, brief).await.map(|_| ());
    state.registry.touch(session_id);
    if let Err(err) = result {
        return session_error_response(session_id, err);
    }

    (StatusCode::OK, Json(session.snapshot())).into_response()
}

pub(super) async fn select_variant(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SelectVariantRequest>,
) -> Response {
    let Some((session_id, session)) = checkout(&state, &session_id) else {
        return session_not_found_response();
    };

    let mut session = session.lock().await;
    if let Err(err) = session.select_variant(request.index) {
        return session_error_response(session_id, err);
    }

    (StatusCode::OK, Json(session.snapshot())).into_response()
}

pub(super) async fn edit_selected(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<EditRequest>,
) -> Response {
    let Some((session_id, session)) = checkout(&state, &session_id) else {
        return session_not_found_response();
    };

    let mut session = session.lock().await;
    let result = state
        .engine
        .edit_selected(&mut session, &request.instruction)
        .await
        .map(|_| ());
    state.registry.touch(session_id);
    if let Err(err) = result {
        return session_error_response(session_id, err);
    }

    (StatusCode::OK, Json(session.snapshot())).into_response()
}

/// Malformed ids are reported the same way as unknown ones.
fn checkout(state: &AppState, raw_session_id: &str) -> Option<(Uuid, SharedSession)> {
    let session_id = Uuid::parse_str(raw_session_id).ok()?;
    let session = state.registry.checkout(session_id)?;
    Some((session_id, session))
}
