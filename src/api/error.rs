//! API error type with IntoResponse
//!
//! Record errors become JSON `{"error": ...}` bodies. Store failures are logged and
//! answered with a generic message so nothing about the database leaks to callers.

use crate::core::DatabaseError;
use crate::records::RecordError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Body of every 500 response
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Failure of a request handler
#[derive(Debug)]
pub struct ApiError(pub RecordError);

impl ApiError {
    /// HTTP status for this failure
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RecordError::NotFound(_) => StatusCode::NOT_FOUND,
            RecordError::BadInput(_) => StatusCode::BAD_REQUEST,
            RecordError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.0 {
            RecordError::NotFound(message) | RecordError::BadInput(message) => message,
            RecordError::StoreFailure(e) => {
                tracing::error!(error = %e, "Error executing query");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        Self(e)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        Self(RecordError::StoreFailure(e))
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
