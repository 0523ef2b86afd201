use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use bson::doc;
use campusdb::engine::Engine;
use campusdb::http::{AppState, build_router};
use campusdb::registry::{TableRegistry, TableSpec};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let mut registry = TableRegistry::with_default_tables(false);
    registry.register("news", TableSpec { defaults: doc! {"published": false} }).unwrap();
    build_router(AppState::new(Arc::new(Engine::in_memory()), registry))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn count_of(v: &Value) -> usize {
    v.as_array().map_or(0, Vec::len)
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["metrics"]["queries_total"].is_u64());
}

#[tokio::test]
async fn test_batch_upsert_end_to_end() {
    let app = app();
    let body = json!({ "data": [{ "id": "s1", "name": "A" }, { "name": "B" }], "onConflict": "id" });

    let (status, out) = send(&app, Method::POST, "/api/students/upsert", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_of(&out), 2);
    let (_, list) = send(&app, Method::GET, "/api/students", None).await;
    assert_eq!(count_of(&list), 2);

    let (status, _) = send(&app, Method::POST, "/api/students/upsert", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = send(&app, Method::GET, "/api/students", None).await;
    assert_eq!(count_of(&list), 3);
    let (_, s1) = send(&app, Method::GET, "/api/students?id=s1", None).await;
    assert_eq!(count_of(&s1), 1);
}

#[tokio::test]
async fn test_single_upsert_returns_object() {
    let app = app();
    let (status, out) = send(&app, Method::POST, "/api/news/upsert", Some(json!({"data": {"slug": "x"}, "onConflict": "slug"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(out.is_object());
    assert_eq!(out["published"], false);
    assert!(out["_id"].is_string());
}

#[tokio::test]
async fn test_failed_batch_keeps_earlier_records() {
    let app = app();
    let body = json!({ "data": [{ "id": "a" }, 42, { "id": "c" }] });
    let (status, out) = send(&app, Method::POST, "/api/students/upsert", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(out["error"].as_str().unwrap().contains("object"));
    let (_, list) = send(&app, Method::GET, "/api/students", None).await;
    assert_eq!(count_of(&list), 1);
    assert_eq!(list[0]["id"], "a");
}

#[tokio::test]
async fn test_dual_identity_for_get_patch_delete() {
    let app = app();
    let (status, created) = send(&app, Method::POST, "/api/faculty", Some(json!({"id": "f-7", "name": "Grace"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let native = created["_id"].as_str().unwrap().to_string();

    let (status, by_ext) = send(&app, Method::GET, "/api/faculty/f-7", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, by_native) = send(&app, Method::GET, &format!("/api/faculty/{native}"), None).await;
    assert_eq!(by_ext["_id"], by_native["_id"]);

    let (status, patched) = send(&app, Method::PATCH, &format!("/api/faculty/{native}"), Some(json!({"name": "Grace H.", "_id": "nope"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Grace H.");
    assert_eq!(patched["_id"], native.as_str());

    let (status, patched) = send(&app, Method::PATCH, "/api/faculty/f-7", Some(json!({"room": "B12"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Grace H.");
    assert_eq!(patched["room"], "B12");

    let (status, removed) = send(&app, Method::DELETE, "/api/faculty/f-7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["_id"], native.as_str());

    for uri in ["/api/faculty/f-7".to_string(), format!("/api/faculty/{native}")] {
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
    let (status, _) = send(&app, Method::PATCH, "/api/faculty/f-7", Some(json!({"x": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, "/api/faculty/f-7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters_projection_sort_count_head() {
    let app = app();
    let records = json!([
        {"name": "a", "grade": "7", "active": true},
        {"name": "b", "grade": "8", "active": false},
        {"name": "c", "grade": "9", "active": true},
        {"name": "d", "grade": "8", "active": true}
    ]);
    let (status, out) = send(&app, Method::POST, "/api/students", Some(records)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(count_of(&out), 4);

    let (_, list) = send(&app, Method::GET, "/api/students?active=true&sort=grade&order=desc&select=name", None).await;
    let names: Vec<&str> = list.as_array().unwrap().iter().map(|d| d["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["c", "d", "a"]);
    assert!(list[0].get("grade").is_none());
    assert!(list[0]["_id"].is_string());

    let (_, page) = send(&app, Method::GET, "/api/students?grade_gte=8&limit=1&count=exact", None).await;
    assert_eq!(count_of(&page["data"]), 1);
    assert_eq!(page["count"], 3);

    let (_, head) = send(&app, Method::GET, "/api/students?grade_in=%5B%227%22%2C%229%22%5D&head=true", None).await;
    assert_eq!(head, json!({"count": 2}));

    // not JSON, so matched literally
    let (_, fallback) = send(&app, Method::GET, "/api/students?name_in=d", None).await;
    assert_eq!(count_of(&fallback), 1);

    let (_, bad_limit) = send(&app, Method::GET, "/api/students?limit=lots", None).await;
    assert_eq!(count_of(&bad_limit), 4);
}

#[tokio::test]
async fn test_delete_by_filter() {
    let app = app();
    send(&app, Method::POST, "/api/events", Some(json!([{"kind": "fair"}, {"kind": "fair"}, {"kind": "talk"}]))).await;

    let (status, body) = send(&app, Method::DELETE, "/api/events", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    let (status, body) = send(&app, Method::DELETE, "/api/events?limit=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, Method::DELETE, "/api/events?kind=fair", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": 2}));
    let (_, list) = send(&app, Method::GET, "/api/events", None).await;
    assert_eq!(count_of(&list), 1);
}

#[tokio::test]
async fn test_unknown_and_malformed_tables_are_404() {
    let app = app();
    for uri in ["/api/secrets", "/api/Students", "/api/a-b", "/api/_private"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].is_string());
    }
    let (status, _) = send(&app, Method::POST, "/api/secrets/upsert", Some(json!({"data": {}}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_bodies_are_400() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/news/upsert", Some(json!({"rows": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("data"));

    let (status, _) = send(&app, Method::POST, "/api/news", Some(json!({"$where": "1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/news")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_upsert_path_only_accepts_post() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/news/upsert", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_record_with_id_upsert_is_reachable_by_native_id_and_filter() {
    let app = app();
    let (_, created) = send(&app, Method::POST, "/api/pages", Some(json!({"id": "upsert", "title": "How to"}))).await;
    let native = created["_id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::GET, "/api/pages/upsert", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, by_native) = send(&app, Method::GET, &format!("/api/pages/{native}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_native["id"], "upsert");

    let (_, listed) = send(&app, Method::GET, "/api/pages?id=upsert", None).await;
    assert_eq!(count_of(&listed), 1);
    let (_, body) = send(&app, Method::DELETE, "/api/pages?id=upsert", None).await;
    assert_eq!(body, json!({"deleted": 1}));
}
