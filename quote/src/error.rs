//! Maps `core::CoreError` onto the `{ status, result }` envelope every HTTP
//! surface in this workspace shares (`core::types::Response`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use core::types::Response as Envelope;
use core::CoreError;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(CoreError::InvalidRequest(e.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(Envelope::err(self.0.to_string()))).into_response()
    }
}
