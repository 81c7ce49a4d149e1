use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response, Result};

use crate::error::ApiError;
use crate::extract::WriterCredentials;
use crate::state::AppState;

/// `GET /cookie`: the writer's last-stored cookie, raw bytes in the body
/// (spec.md 6: "writer in header, body is raw cookie bytes").
pub async fn get_cookie(State(state): State<AppState>, creds: WriterCredentials) -> Result<Response, ApiError> {
    let cookie = state.executive.get_cookie(&creds.writer, &creds.secret)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Bytes::from(cookie),
    )
        .into_response())
}

/// `POST /cookie`: an unconditional cookie overwrite, not gated by the
/// ledger lock since it doesn't touch the ledger (spec.md 6). The body is
/// the raw cookie bytes, not a JSON envelope.
pub async fn set_cookie(State(state): State<AppState>, creds: WriterCredentials, body: Bytes) -> Result<(), ApiError> {
    state.executive.set_cookie(&creds.writer, &creds.secret, &body)?;
    Ok(())
}
