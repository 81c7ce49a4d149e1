use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use http::StatusCode;

/// Writer identity carried on `ctlstore-writer` / `ctlstore-secret` request
/// headers (spec.md 6: `POST /families/{f}/mutations`, `GET/POST /cookie`).
pub struct WriterCredentials {
    pub writer: String,
    pub secret: String,
}

impl<S> FromRequestParts<S> for WriterCredentials
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &'static str| -> Result<String, Self::Rejection> {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .ok_or((StatusCode::BAD_REQUEST, "missing or non-UTF-8 writer credentials header"))
        };
        Ok(Self {
            writer: header("ctlstore-writer")?,
            secret: header("ctlstore-secret")?,
        })
    }
}
