use axum::extract::{Path, State};
use axum::response::Result;
use serde::Deserialize;
use axum::Json;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterWriterBody {
    pub secret: String,
}

/// `POST /writers/{w}`: registers a new writer with its shared secret.
pub async fn register_writer(
    State(state): State<AppState>,
    Path(writer): Path<String>,
    Json(body): Json<RegisterWriterBody>,
) -> Result<(), ApiError> {
    state.executive.register_writer(&writer, &body.secret)?;
    Ok(())
}
