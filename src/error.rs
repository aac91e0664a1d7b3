/// Unified error types for the hosting service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum HostError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors (no or invalid session)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors (authenticated but lacks ownership/role)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors (malformed input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload exceeds the caller's per-file size ceiling
    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    /// MIME type not in the allowed set
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Upload would push the user over their storage quota
    #[error("Storage limit exceeded")]
    QuotaExceeded,

    /// File storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// External service (payment provider, object storage) failures
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Webhook signature verification failed
    #[error("Invalid webhook signature: {0}")]
    SignatureInvalid(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate signup email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert HostError to HTTP response
impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            HostError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                self.to_string(),
            ),
            HostError::Authorization(_) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                self.to_string(),
            ),
            HostError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "ValidationError",
                self.to_string(),
            ),
            HostError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PayloadTooLarge",
                self.to_string(),
            ),
            HostError::UnsupportedMediaType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UnsupportedMediaType",
                self.to_string(),
            ),
            HostError::QuotaExceeded => (
                StatusCode::BAD_REQUEST,
                "QuotaExceeded",
                self.to_string(),
            ),
            HostError::SignatureInvalid(_) => (
                StatusCode::BAD_REQUEST,
                "SignatureInvalid",
                self.to_string(),
            ),
            HostError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            HostError::Conflict(_) => (
                StatusCode::CONFLICT,
                "Conflict",
                self.to_string(),
            ),
            HostError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "UpstreamError",
                self.to_string(),
            ),
            HostError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            HostError::Database(_)
            | HostError::Storage(_)
            | HostError::Internal(_)
            | HostError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type HostResult<T> = Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_errors_map_to_client_statuses() {
        let resp = HostError::PayloadTooLarge("max 5MB".into()).into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = HostError::UnsupportedMediaType("text/plain".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let resp = HostError::QuotaExceeded.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let resp = HostError::Internal("secret connection string".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
