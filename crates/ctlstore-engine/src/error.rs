use thiserror::Error;

/// The executive's error taxonomy (spec.md 7), shared by every operation
/// that mutates or reads authority state. Each variant carries its own
/// message and maps onto an HTTP status code in `ctlstore-executive`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("cookie conflict")]
    CookieConflict,
    #[error("rate limit exceeded for writer {writer}")]
    RateLimitExceeded { writer: String },
    #[error("table {family}.{table} exceeds its maximum size")]
    InsufficientStorage { family: String, table: String },
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("transient storage error: {0}")]
    Transient(#[from] rusqlite::Error),
}

impl From<ctlstore_types::IdentError> for EngineError {
    fn from(e: ctlstore_types::IdentError) -> Self {
        EngineError::BadRequest(e.to_string())
    }
}

impl From<ctlstore_types::TableError> for EngineError {
    fn from(e: ctlstore_types::TableError) -> Self {
        EngineError::BadRequest(e.to_string())
    }
}

impl From<ctlstore_sql::generator::GenError> for EngineError {
    fn from(e: ctlstore_sql::generator::GenError) -> Self {
        use ctlstore_sql::generator::GenError;
        match e {
            GenError::StatementTooLarge { .. } => EngineError::PayloadTooLarge(e.to_string()),
            GenError::ValueCountMismatch { .. } | GenError::KeyCountMismatch { .. } => {
                EngineError::BadRequest(e.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
