use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ledger_seq: i64,
    pub writer_count: i64,
    pub uptime_seconds: u64,
}

/// `GET /status`: a small health body (spec.md 6: "ledger seq, uptime,
/// connected-writers count").
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let (ledger_seq, writer_count) = state.executive.status()?;
    Ok(Json(StatusResponse {
        ledger_seq,
        writer_count,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}
