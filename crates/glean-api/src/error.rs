use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use glean_commands::CommandError;
use serde_json::json;

/// HTTP shape of the command-error taxonomy:
/// `{ errorCode, message, requestId }`.
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
}

impl ApiError {
    pub fn unauthenticated(request_id: &str) -> Self {
        ApiError {
            status: StatusCode::UNAUTHORIZED,
            code: "AUTHENTICATION_ERROR",
            message: "a bearer identity assertion is required".to_string(),
            request_id: request_id.to_string(),
        }
    }

    /// Map a command error onto its status code, keeping the stable code and
    /// message.
    pub fn of(error: CommandError, request_id: &str) -> Self {
        let status = match &error {
            CommandError::Validation(_)
            | CommandError::InvalidStateTransition(_)
            | CommandError::ComplianceViolation(_) => StatusCode::BAD_REQUEST,
            CommandError::Authentication => StatusCode::UNAUTHORIZED,
            CommandError::Authorization(_) => StatusCode::FORBIDDEN,
            CommandError::NotFound { .. } => StatusCode::NOT_FOUND,
            CommandError::Conflict(_) | CommandError::IdempotencyViolation(_) => {
                StatusCode::CONFLICT
            }
            CommandError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CommandError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            code: error.code(),
            message: error.to_string(),
            request_id: request_id.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "errorCode": self.code,
            "message": self.message,
            "requestId": self.request_id,
        }));
        (self.status, body).into_response()
    }
}
