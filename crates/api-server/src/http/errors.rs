use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use campaign_engine::session::SessionError;
use tracing::{error, warn};
use uuid::Uuid;

use super::models::{ErrorBody, ErrorResponse};

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn not_found_response(message: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", message)
}

pub(super) fn session_not_found_response() -> Response {
    not_found_response("Campaign session not found")
}

pub(super) fn session_error_response(session_id: Uuid, err: SessionError) -> Response {
    match err {
        SessionError::InvalidRequest(message) => bad_request_response("invalid_request", &message),
        SessionError::IndexOutOfRange { index, len } => bad_request_response(
            "variant_index_out_of_range",
            &format!("Variant index {index} is out of range for {len} variants"),
        ),
        SessionError::Precondition(message) => {
            warn!(session_id = %session_id, "session precondition failed: {message}");
            error_response(StatusCode::CONFLICT, "no_active_variants", message)
        }
        SessionError::Completion(err) => {
            error!(
                session_id = %session_id,
                error_kind = err.kind(),
                "completion request failed: {err}"
            );
            error_response(
                StatusCode::BAD_GATEWAY,
                "completion_failed",
                "Content generation is temporarily unavailable",
            )
        }
    }
}
