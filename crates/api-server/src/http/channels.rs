use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use campaign_engine::content::{Channel, output_schema};

use super::errors::not_found_response;

pub(super) async fn channel_schema(Path(channel): Path<String>) -> Response {
    let Ok(channel) = channel.parse::<Channel>() else {
        return not_found_response("Channel not found");
    };

    (StatusCode::OK, Json(output_schema(channel))).into_response()
}
