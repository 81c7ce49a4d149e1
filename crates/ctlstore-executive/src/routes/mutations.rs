use axum::extract::{Path, State};
use axum::response::Result;
use axum::Json;
use ctlstore_engine::{EngineError, MutateCall, MutationRequest};
use ctlstore_types::{FamilyName, TableName, WriterName};

use crate::error::ApiError;
use crate::extract::WriterCredentials;
use crate::state::AppState;
use crate::wire::{decode_cookie, mutation_values, MutateBody, MutateResponse};

/// `POST /families/{f}/mutations`.
pub async fn mutate(
    State(state): State<AppState>,
    Path(family): Path<String>,
    creds: WriterCredentials,
    Json(body): Json<MutateBody>,
) -> Result<Json<MutateResponse>, ApiError> {
    let family_name = FamilyName::new(family.as_str()).map_err(EngineError::from)?;
    let writer = WriterName::new_writer(creds.writer.as_str()).map_err(EngineError::from)?;
    let new_cookie = decode_cookie(&body.cookie)?;
    let check_cookie = body.check_cookie.as_deref().map(decode_cookie).transpose()?;

    let mut mutations = Vec::with_capacity(body.mutations.len());
    for m in &body.mutations {
        let table_name = TableName::new(m.table.as_str()).map_err(EngineError::from)?;
        let meta = state.executive.get_table_schema(&family, &m.table)?;
        let values = mutation_values(&meta, m)?;
        mutations.push(MutationRequest {
            table: table_name,
            delete: m.delete,
            values,
        });
    }

    let outcome = state.executive.mutate(MutateCall {
        family: family_name,
        writer,
        secret: creds.secret,
        new_cookie,
        check_cookie,
        mutations,
    })?;

    Ok(Json(MutateResponse { last_seq: outcome.last_seq }))
}
