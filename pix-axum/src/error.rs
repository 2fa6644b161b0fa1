use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pix_core::errors::PixError;
use serde_json::json;

#[derive(Debug)]
pub struct PixAxumError(pub anyhow::Error);

impl From<anyhow::Error> for PixAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<PixError> for PixAxumError {
    fn from(e: PixError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for PixAxumError {
    fn into_response(self) -> Response {
        // A PixError anywhere in the chain keeps its kind and fields
        let safe = match PixError::from_anyhow(&self.0) {
            Some(pix) => pix.sanitize_for_client(),
            None => PixError::general_error(self.0.to_string()),
        };

        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }

        (status, Json(safe.to_json())).into_response()
    }
}

pub fn map_json_rejection(rejection: JsonRejection) -> PixAxumError {
    PixError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into()
}
