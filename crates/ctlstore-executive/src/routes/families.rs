use axum::extract::{Path, State};
use axum::response::Result;
use axum::Json;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /families/{f}`.
pub async fn create_family(State(state): State<AppState>, Path(family): Path<String>) -> Result<(), ApiError> {
    state.executive.create_family(&family)?;
    Ok(())
}

/// `GET /schema/family/{f}`: names of every table declared in the family.
pub async fn family_schema(
    State(state): State<AppState>,
    Path(family): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let tables = state.executive.list_family_tables(&family)?;
    Ok(Json(tables))
}
