use axum::extract::{Path, State};
use axum::response::Result;
use axum::Json;
use ctlstore_types::{Engine, FamilyName, MetaTable, TableName};

use crate::error::ApiError;
use crate::state::AppState;
use crate::wire::{AddFieldsBody, CreateTableBody, SchemaResponse};

/// `POST /families/{f}/tables/{t}`.
pub async fn create_table(
    State(state): State<AppState>,
    Path((family, table)): Path<(String, String)>,
    Json(body): Json<CreateTableBody>,
) -> Result<(), ApiError> {
    let family_name = FamilyName::new(family.as_str())?;
    let table_name = TableName::new(table.as_str())?;
    let fields = crate::wire::parse_fields(&body.fields)?;
    let key_fields = body
        .key_fields
        .iter()
        .map(|f| Ok(ctlstore_types::FieldName::new(f.as_str())?))
        .collect::<Result<Vec<_>, ApiError>>()?;

    let meta = MetaTable::new(Engine::Authority, family_name, table_name, fields, key_fields)?;
    state.executive.create_table(&meta)?;
    Ok(())
}

/// `PUT /families/{f}/tables/{t}`: adds columns to an existing table.
pub async fn add_fields(
    State(state): State<AppState>,
    Path((family, table)): Path<(String, String)>,
    Json(body): Json<AddFieldsBody>,
) -> Result<(), ApiError> {
    let meta = state.executive.get_table_schema(&family, &table)?;
    let fields = crate::wire::parse_fields(&body.fields)?;
    state.executive.add_fields(&meta, &fields)?;
    Ok(())
}

/// `DELETE /families/{f}/tables/{t}`, gated by `allow_drop_table`.
pub async fn drop_table(State(state): State<AppState>, Path((family, table)): Path<(String, String)>) -> Result<(), ApiError> {
    let meta = state.executive.get_table_schema(&family, &table)?;
    state.executive.drop_table(&meta)?;
    Ok(())
}

/// `GET /schema/table/{f}/{t}`.
pub async fn table_schema(
    State(state): State<AppState>,
    Path((family, table)): Path<(String, String)>,
) -> Result<Json<SchemaResponse>, ApiError> {
    let meta = state.executive.get_table_schema(&family, &table)?;
    Ok(Json(SchemaResponse::from(&meta)))
}
