use axum::response::{IntoResponse, Response};
use ctlstore_engine::EngineError;
use http::StatusCode;

/// Wraps [`EngineError`] so it can be returned directly from a handler;
/// maps the taxonomy of spec.md 7 onto the status codes of spec.md 6.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl From<ctlstore_types::IdentError> for ApiError {
    fn from(e: ctlstore_types::IdentError) -> Self {
        ApiError(EngineError::from(e))
    }
}

impl From<ctlstore_types::TableError> for ApiError {
    fn from(e: ctlstore_types::TableError) -> Self {
        ApiError(EngineError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::CookieConflict => StatusCode::CONFLICT,
            EngineError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::InsufficientStorage { .. } => StatusCode::INSUFFICIENT_STORAGE,
            EngineError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            EngineError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("internal error serving request: {}", self.0);
        }
        (status, self.0.to_string()).into_response()
    }
}
