//! Router tests for paths that finish before any statement reaches the database.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use dbrest::{app, AppState, AuditTable, PagingLimits, PermissionGate, Settings};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn router() -> axum::Router {
    router_with_role_headers(true)
}

fn router_with_role_headers(trust_role_headers: bool) -> axum::Router {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://dbrest@127.0.0.1:1/unused")
        .expect("lazy pool");
    let gate = PermissionGate::from_json(
        r#"[{"user": "reader", "domain": "sales", "access": "viewer"}]"#,
    )
    .unwrap();
    let state = AppState {
        read_pool: pool.clone(),
        write_pool: pool,
        catalog: Arc::new(common::catalog()),
        gate: Arc::new(gate),
        limits: PagingLimits::default(),
        audit: Arc::new(AuditTable::default()),
        trust_role_headers,
    };
    let settings = Settings::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        _ => None,
    })
    .unwrap();
    app(state, &settings)
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_needs_no_database() {
    let response = router()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn version_reports_the_catalog() {
    let response = router()
        .oneshot(request(Method::GET, "/version", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "dbrest");
    assert_eq!(body["entities"], 4);
}

#[tokio::test]
async fn anonymous_callers_are_forbidden() {
    let response = router()
        .oneshot(request(Method::GET, "/sales/customers", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn denial_does_not_reveal_missing_entities() {
    let response = router()
        .oneshot(request(Method::DELETE, "/sales/nonexistent/1", Some("reader"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn viewers_cannot_write() {
    let response = router()
        .oneshot(request(
            Method::POST,
            "/sales/customers",
            Some("reader"),
            Some(r#"{"Name": "Ann"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bad_filter_is_a_client_error() {
    let response = router()
        .oneshot(request(
            Method::GET,
            "/sales/customers?filter=ID%20eq%2042%20AND",
            Some("reader"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_query");
}

#[tokio::test]
async fn unknown_entity_is_not_found_for_authorized_callers() {
    let response = router()
        .oneshot(request(Method::GET, "/sales/nonexistent", Some("reader"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn views_reject_mutations() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/sales/customer_totals")
        .header("X-User-Roles", "Admin")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"Total": 1}"#))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn options_describes_the_entity() {
    let response = router()
        .oneshot(request(Method::OPTIONS, "/sales/orders", Some("reader"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["allow"], "GET, POST, PATCH, OPTIONS");
    let body = json_body(response).await;
    assert_eq!(body["columns"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn invalid_body_is_rejected_before_execution() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/sales/customers")
        .header("X-User-Roles", "Editor")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"Email": "a@b"}"#))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bulk_create_needs_the_bulk_bit() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/sales/customers")
        .header("X-User-Roles", "Owner")
        .header("content-type", "application/json")
        .body(Body::from(r#"[{"Name": "Ann"}, {"Name": "Bo"}]"#))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_patch_is_a_client_error() {
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/sales/customers")
        .header("X-User-Roles", "Editor")
        .header("content-type", "application/json")
        .body(Body::from(r#"[{"op": "copy", "from": "/1/Name", "path": "/1/Age"}]"#))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_patch_is_authorized_before_lookup() {
    let response = router()
        .oneshot(request(Method::PATCH, "/sales/nonexistent", None, Some("[]")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router()
        .oneshot(request(Method::PATCH, "/sales/nonexistent/7", Some("reader"), Some("[]")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_patch_is_rejected_for_authorized_callers() {
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/sales/customers")
        .header("X-User-Roles", "Editor")
        .header("content-type", "application/json")
        .body(Body::from("[]"))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn deeply_nested_filter_is_a_client_error() {
    let filter = format!("{}ID%20eq%201{}", "(".repeat(3000), ")".repeat(3000));
    let response = router()
        .oneshot(request(
            Method::GET,
            &format!("/sales/customers?filter={}", filter),
            Some("reader"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn role_headers_can_be_ignored() {
    let admin = || {
        Request::builder()
            .method(Method::GET)
            .uri("/sales/customers?filter=ID%20eq%201%20AND")
            .header("X-User-Roles", "Admin")
            .body(Body::empty())
            .unwrap()
    };
    let response = router_with_role_headers(false).oneshot(admin()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = router().oneshot(admin()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
