use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use calsync_core::ProcessorError;
use calsync_domain::CalsyncError;
use serde_json::json;
use tracing::{error, warn};

/// Handler error rendered as `{"error", "details"}`
#[derive(Debug)]
pub struct ApiError(pub CalsyncError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CalsyncError::Validation(_) => StatusCode::BAD_REQUEST,
            CalsyncError::Security(_) | CalsyncError::AuthExpired(_) => StatusCode::UNAUTHORIZED,
            CalsyncError::NotFound(_) | CalsyncError::NotConnected(_) => StatusCode::NOT_FOUND,
            CalsyncError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(status: StatusCode) -> &'static str {
        match status {
            StatusCode::BAD_REQUEST => "Invalid request.",
            StatusCode::UNAUTHORIZED => "Not authorized.",
            StatusCode::NOT_FOUND => "Not found.",
            StatusCode::SERVICE_UNAVAILABLE => "Try again later.",
            _ => "An internal error has occurred. Check app server logs for details.",
        }
    }
}

impl From<CalsyncError> for ApiError {
    fn from(err: CalsyncError) -> Self {
        Self(err)
    }
}

impl From<ProcessorError> for ApiError {
    fn from(err: ProcessorError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, status = status.as_u16(), "Request rejected");
        }
        let body = json!({ "error": self.0.to_string(), "details": Self::summary(status) });
        (status, Json(body)).into_response()
    }
}
