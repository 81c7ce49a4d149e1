use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, Limited};

use ctlstore_engine::executive::MAX_REQUEST_BODY_BYTES;

/// Enforces spec.md 6's 1 MiB request body cap.
///
/// Replaces `axum::extract::DefaultBodyLimit`, whose rejection maps to 413;
/// spec.md 6 calls for 417 Expectation Failed on an oversized body instead.
/// Buffers the body through `http_body_util::Limited` so an over-limit body
/// is rejected without ever allocating past the cap.
pub async fn enforce_body_limit(req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let limited = Limited::new(body, MAX_REQUEST_BODY_BYTES);
    let bytes: Bytes = match limited.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => {
            return (StatusCode::EXPECTATION_FAILED, "request body exceeds the 1 MiB limit").into_response();
        }
    };
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
