use axum::extract::{Path, State};
use axum::response::Result;
use axum::Json;
use ctlstore_engine::{EngineError, SizeLimit};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::wire::{RateLimitBody, SizeLimitBody};

#[derive(Debug, Serialize)]
pub struct WriterRateEntry {
    pub writer: String,
    pub amount_per_minute: i64,
}

#[derive(Debug, Serialize)]
pub struct TableSizeEntry {
    pub family: String,
    pub table: String,
    pub warn_size_bytes: i64,
    pub max_size_bytes: i64,
}

pub async fn list_writer_rates(State(state): State<AppState>) -> Result<Json<Vec<WriterRateEntry>>, ApiError> {
    let rows = state.executive.list_writer_rate_limits()?;
    Ok(Json(
        rows.into_iter()
            .map(|(writer, amount_per_minute)| WriterRateEntry { writer, amount_per_minute })
            .collect(),
    ))
}

pub async fn set_global_rate(State(state): State<AppState>, Json(body): Json<RateLimitBody>) -> Result<(), ApiError> {
    state.executive.set_global_rate_limit(body.amount_per_minute)?;
    Ok(())
}

pub async fn set_writer_rate(
    State(state): State<AppState>,
    Path(writer): Path<String>,
    Json(body): Json<RateLimitBody>,
) -> Result<(), ApiError> {
    state.executive.set_writer_rate_limit(&writer, body.amount_per_minute)?;
    Ok(())
}

pub async fn get_writer_rate(State(state): State<AppState>, Path(writer): Path<String>) -> Result<Json<WriterRateEntry>, ApiError> {
    let amount_per_minute = state
        .executive
        .get_writer_rate_limit(&writer)?
        .ok_or_else(|| EngineError::NotFound(format!("no rate limit override for writer {writer:?}")))?;
    Ok(Json(WriterRateEntry { writer, amount_per_minute }))
}

pub async fn delete_writer_rate(State(state): State<AppState>, Path(writer): Path<String>) -> Result<(), ApiError> {
    state.executive.delete_writer_rate_limit(&writer)?;
    Ok(())
}

pub async fn list_table_sizes(State(state): State<AppState>) -> Result<Json<Vec<TableSizeEntry>>, ApiError> {
    let rows = state.executive.list_table_size_limits()?;
    Ok(Json(
        rows.into_iter()
            .map(|(family, table, limit)| TableSizeEntry {
                family,
                table,
                warn_size_bytes: limit.warn_size_bytes,
                max_size_bytes: limit.max_size_bytes,
            })
            .collect(),
    ))
}

pub async fn set_table_size(
    State(state): State<AppState>,
    Path((family, table)): Path<(String, String)>,
    Json(body): Json<SizeLimitBody>,
) -> Result<(), ApiError> {
    state.executive.set_table_size_limit(
        &family,
        &table,
        SizeLimit {
            warn_size_bytes: body.warn_size_bytes,
            max_size_bytes: body.max_size_bytes,
        },
    )?;
    Ok(())
}

pub async fn get_table_size(
    State(state): State<AppState>,
    Path((family, table)): Path<(String, String)>,
) -> Result<Json<TableSizeEntry>, ApiError> {
    let limit = state
        .executive
        .get_table_size_limit(&family, &table)?
        .ok_or_else(|| EngineError::NotFound(format!("no size limit for table {family}.{table}")))?;
    Ok(Json(TableSizeEntry {
        family,
        table,
        warn_size_bytes: limit.warn_size_bytes,
        max_size_bytes: limit.max_size_bytes,
    }))
}

pub async fn delete_table_size(
    State(state): State<AppState>,
    Path((family, table)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.executive.delete_table_size_limit(&family, &table)?;
    Ok(())
}
