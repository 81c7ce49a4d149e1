use ctlstore_engine::{AuthorityDb, Executive, ExecutiveConfig};
use ctlstore_executive::{router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state(allow_drop_table: bool, allow_clear_rows: bool) -> AppState {
    let db = AuthorityDb::open_in_memory().unwrap();
    let executive = Executive::new(
        db,
        ExecutiveConfig {
            allow_drop_table,
            allow_clear_rows,
        },
    );
    executive.refresh_limits().unwrap();
    AppState::new(executive)
}

fn request(
    method: &str,
    uri: &str,
    creds: Option<(&str, &str)>,
    body: Option<Value>,
) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some((writer, secret)) = creds {
        builder = builder.header("ctlstore-writer", writer).header("ctlstore-secret", secret);
    }
    match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&v).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn raw_body(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn byte_request(method: &str, uri: &str, creds: Option<(&str, &str)>, body: Vec<u8>) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some((writer, secret)) = creds {
        builder = builder.header("ctlstore-writer", writer).header("ctlstore-secret", secret);
    }
    builder.body(axum::body::Body::from(body)).unwrap()
}

#[tokio::test]
async fn status_reports_zero_ledger_seq_on_a_fresh_authority() {
    let app = router(test_state(false, false));
    let response = app.oneshot(request("GET", "/status", None, None)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ledger_seq"], json!(0));
    assert_eq!(body["writer_count"], json!(0));
}

#[tokio::test]
async fn full_mutation_round_trip_through_the_http_surface() {
    let app = router(test_state(false, false));

    let response = app
        .clone()
        .oneshot(request("POST", "/families/widgets", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/families/widgets/tables/items",
            None,
            Some(json!({
                "fields": [["id", "integer"], ["name", "string"]],
                "key_fields": ["id"],
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/writers/loader",
            None,
            Some(json!({ "secret": "s3cr3t" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/families/widgets/mutations",
            Some(("loader", "s3cr3t")),
            Some(json!({
                "cookie": "AQ==",
                "mutations": [
                    {"table": "items", "values": [1, "sprocket"]},
                ],
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["last_seq"], json!(1));

    let response = app
        .clone()
        .oneshot(request("GET", "/status", None, None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["ledger_seq"], json!(1));
    assert_eq!(body["writer_count"], json!(1));
}

#[tokio::test]
async fn mutation_with_wrong_secret_is_rejected_as_not_found() {
    let app = router(test_state(false, false));
    app.clone()
        .oneshot(request("POST", "/families/widgets", None, None))
        .await
        .unwrap();
    app.clone()
        .oneshot(request(
            "POST",
            "/families/widgets/tables/items",
            None,
            Some(json!({ "fields": [["id", "integer"]], "key_fields": ["id"] })),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(request("POST", "/writers/loader", None, Some(json!({ "secret": "right" }))))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            "POST",
            "/families/widgets/mutations",
            Some(("loader", "wrong")),
            Some(json!({ "cookie": "", "mutations": [{"table": "items", "values": [1]}] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mutation_missing_credentials_header_is_bad_request() {
    let app = router(test_state(false, false));
    let response = app
        .oneshot(request(
            "POST",
            "/families/widgets/mutations",
            None,
            Some(json!({ "cookie": "", "mutations": [] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn drop_table_is_gated_by_the_allow_drop_table_flag() {
    let app = router(test_state(false, false));
    app.clone()
        .oneshot(request("POST", "/families/widgets", None, None))
        .await
        .unwrap();
    app.clone()
        .oneshot(request(
            "POST",
            "/families/widgets/tables/items",
            None,
            Some(json!({ "fields": [["id", "integer"]], "key_fields": ["id"] })),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request("DELETE", "/families/widgets/tables/items", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_table_404s_for_an_unknown_family() {
    let app = router(test_state(false, false));
    let response = app
        .oneshot(request(
            "POST",
            "/families/ghosts/tables/items",
            None,
            Some(json!({ "fields": [["id", "integer"]], "key_fields": ["id"] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn schema_family_lists_every_table_once_created() {
    let app = router(test_state(false, false));
    app.clone()
        .oneshot(request("POST", "/families/widgets", None, None))
        .await
        .unwrap();
    app.clone()
        .oneshot(request(
            "POST",
            "/families/widgets/tables/items",
            None,
            Some(json!({ "fields": [["id", "integer"]], "key_fields": ["id"] })),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(request(
            "POST",
            "/families/widgets/tables/orders",
            None,
            Some(json!({ "fields": [["id", "integer"]], "key_fields": ["id"] })),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request("GET", "/schema/family/widgets", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, json!(["items", "orders"]));
}

#[tokio::test]
async fn schema_family_404s_for_an_unknown_family() {
    let app = router(test_state(false, false));
    let response = app
        .oneshot(request("GET", "/schema/family/ghosts", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cookie_round_trips_through_get_and_post() {
    let app = router(test_state(false, false));
    app.clone()
        .oneshot(request("POST", "/writers/loader", None, Some(json!({ "secret": "s3cr3t" }))))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(byte_request("POST", "/cookie", Some(("loader", "s3cr3t")), b"hello".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let response = app
        .oneshot(request("GET", "/cookie", Some(("loader", "s3cr3t")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = raw_body(response).await;
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn oversized_request_body_is_rejected_with_expectation_failed() {
    let app = router(test_state(false, false));
    let huge = vec![0u8; ctlstore_engine::executive::MAX_REQUEST_BODY_BYTES + 1];
    let response = app
        .oneshot(byte_request("POST", "/cookie", Some(("loader", "s3cr3t")), huge))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::EXPECTATION_FAILED);
}

#[tokio::test]
async fn writer_rate_limit_admin_round_trips() {
    let app = router(test_state(false, false));
    app.clone()
        .oneshot(request("POST", "/writers/loader", None, Some(json!({ "secret": "s3cr3t" }))))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/limits/writers/loader",
            None,
            Some(json!({ "amount_per_minute": 42 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request("GET", "/limits/writers/loader", None, None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["amount_per_minute"], json!(42));

    let response = app
        .oneshot(request("DELETE", "/limits/writers/loader", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
