//! The Executive's HTTP surface: axum routes over `ctlstore-engine`,
//! mapping its error taxonomy onto HTTP status codes and its wire formats
//! onto JSON request/response bodies.

pub mod body_limit;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
pub mod wire;

pub use error::ApiError;
pub use extract::WriterCredentials;
pub use routes::router;
pub use state::AppState;
