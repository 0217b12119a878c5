use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// User-safe message for a terminally failed booking. Retry internals never
/// reach the customer.
pub const BOOKING_FAILED_MESSAGE: &str =
    "Unable to process booking. Our team has been notified and will contact you shortly.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("that time slot is no longer available, please pick another")]
    SlotTaken,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("notification delivery failed: {0}")]
    Gateway(String),

    #[error("booking could not be processed")]
    BookingFailed,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    /// Transient errors are retried by the pipeline; everything else is a
    /// definitive rejection surfaced to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::StorageUnavailable(_) | AppError::Gateway(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::SlotTaken => (StatusCode::CONFLICT, self.to_string()),
            AppError::StorageUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service temporarily unavailable, please try again".to_string(),
            ),
            AppError::Gateway(_) | AppError::BookingFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                BOOKING_FAILED_MESSAGE.to_string(),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}
