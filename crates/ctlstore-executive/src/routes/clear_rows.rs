use axum::extract::{Path, State};
use axum::response::Result;

use crate::error::ApiError;
use crate::state::AppState;

/// `DELETE /clear-rows/families/{f}/tables/{t}`, gated by `allow_clear_rows`.
pub async fn clear_table(State(state): State<AppState>, Path((family, table)): Path<(String, String)>) -> Result<(), ApiError> {
    let meta = state.executive.get_table_schema(&family, &table)?;
    state.executive.clear_table(&meta)?;
    Ok(())
}

/// `DELETE /clear-rows/families/{f}`: clears every table in the family.
pub async fn clear_family(State(state): State<AppState>, Path(family): Path<String>) -> Result<(), ApiError> {
    let tables = state.executive.list_family_tables(&family)?;
    for table in tables {
        let meta = state.executive.get_table_schema(&family, &table)?;
        state.executive.clear_table(&meta)?;
    }
    Ok(())
}
