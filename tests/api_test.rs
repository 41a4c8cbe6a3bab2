//! HTTP surface tests against an in-memory store

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tower::ServiceExt;

use web_annotator::annotations::MemoryStore;
use web_annotator::config::Config;
use web_annotator::routes;
use web_annotator::state::AppState;

const PAGE: &str = "https://example.com/articles/foxes";

fn state() -> AppState {
    AppState::new(Config::default(), Arc::new(MemoryStore::new()))
}

fn server() -> TestServer {
    TestServer::new(routes::app(state())).unwrap()
}

fn record(id: &str, text: &str, start: usize, end: usize) -> Value {
    json!({
        "id": id,
        "color": "cyan",
        "text": text,
        "comment": "",
        "position": { "start": start, "end": end },
        "quote": { "prefix": "", "suffix": "" },
        "createdAt": "2024-05-01T10:00:00.000Z",
    })
}

#[tokio::test]
async fn test_health() {
    let response = server().get("/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "web-annotator");
}

#[tokio::test]
async fn test_put_then_get_ignores_fragment() {
    let server = server();
    let response = server
        .put("/api/v1/annotations")
        .add_query_param("url", format!("{}#comments", PAGE))
        .json(&json!([record("a1", "quick", 4, 9), { "text": "   " }, 42]))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["key"], PAGE);
    assert_eq!(body["annotations"].as_array().unwrap().len(), 1);

    let body = server
        .get("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .await
        .json::<Value>();
    assert_eq!(body["annotations"][0]["id"], "a1");
    assert_eq!(body["annotations"][0]["color"], "cyan");
}

#[tokio::test]
async fn test_empty_list_removes_entry() {
    let server = server();
    server
        .put("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .json(&json!([record("a1", "quick", 4, 9)]))
        .await
        .assert_status_ok();
    server
        .put("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .json(&json!([]))
        .await
        .assert_status_ok();

    let summary = server.get("/api/v1/annotations/summary").await.json::<Value>();
    assert_eq!(summary["urlCount"], 0);
    assert_eq!(summary["annotationCount"], 0);
}

#[tokio::test]
async fn test_delete_and_unsafe_key() {
    let server = server();
    server
        .put("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .json(&json!([record("a1", "quick", 4, 9)]))
        .await
        .assert_status_ok();

    let response = server
        .delete("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let body = server
        .get("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .await
        .json::<Value>();
    assert_eq!(body["annotations"], json!([]));

    let response = server
        .get("/api/v1/annotations")
        .add_query_param("url", "__proto__")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_envelope() {
    let server = server();
    server
        .put("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .json(&json!([record("a1", "quick", 4, 9), record("a2", "fox", 16, 19)]))
        .await
        .assert_status_ok();

    let response = server.get("/api/v1/export").await;
    response.assert_status_ok();
    let disposition = response.header("content-disposition");
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"web-annotations-"));

    let body = response.json::<Value>();
    assert_eq!(body["format"], "web-annotations-export");
    assert_eq!(body["version"], 1);
    assert_eq!(body["annotationsByUrl"][PAGE].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_import_merge_and_replace() {
    let server = server();
    server
        .put("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .json(&json!([record("a1", "quick", 4, 9)]))
        .await
        .assert_status_ok();

    let other = "https://example.com/other";
    let payload = json!({
        "format": "web-annotations-export",
        "version": 1,
        "annotationsByUrl": { other: [record("b1", "lazy", 0, 4)] },
    });

    let summary = server.post("/api/v1/import").json(&payload).await.json::<Value>();
    assert_eq!(summary["mode"], "merge");
    assert_eq!(summary["urlCount"], 1);
    let totals = server.get("/api/v1/annotations/summary").await.json::<Value>();
    assert_eq!(totals["urlCount"], 2);

    let summary = server
        .post("/api/v1/import")
        .add_query_param("mode", "replace")
        .json(&payload)
        .await
        .json::<Value>();
    assert_eq!(summary["mode"], "replace");
    let totals = server.get("/api/v1/annotations/summary").await.json::<Value>();
    assert_eq!(totals["urlCount"], 1);
    assert_eq!(totals["urls"][0]["url"], other);
}

#[tokio::test]
async fn test_rejected_import_writes_nothing() {
    let server = server();

    let response = server.post("/api/v1/import").json(&json!([1, 2, 3])).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "invalid_import");

    let response = server
        .post("/api/v1/import")
        .json(&json!({ "annotationsByUrl": { PAGE: [{ "text": "" }] } }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/import")
        .add_query_param("mode", "overwrite")
        .json(&json!({ PAGE: [record("a1", "quick", 4, 9)] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let totals = server.get("/api/v1/annotations/summary").await.json::<Value>();
    assert_eq!(totals["urlCount"], 0);
}

#[tokio::test]
async fn test_render_paints_stored_annotations() {
    let server = server();
    server
        .put("/api/v1/annotations")
        .add_query_param("url", PAGE)
        .json(&json!([
            record("a1", "quick", 4, 9),
            { "id": "lost", "text": "not on this page" },
        ]))
        .await
        .assert_status_ok();

    let response = server
        .post("/api/v1/render")
        .json(&json!({
            "url": PAGE,
            "html": "<p>The quick brown fox</p><script>alert(1)</script>",
        }))
        .await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    let html = body["html"].as_str().unwrap();
    assert!(html.contains("data-annotation-id=\"a1\""));
    assert!(html.contains(">quick</span>"));
    assert!(!html.contains("alert(1)"));
    assert_eq!(body["painted"], json!(["a1"]));
    assert_eq!(body["orphaned"], json!(["lost"]));
}

#[tokio::test]
async fn test_cross_origin_requests_are_allowed() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/annotations/summary")
        .header(header::ORIGIN, "https://example.com")
        .body(Body::empty())
        .unwrap();

    let response = routes::app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let summary: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["urlCount"], 0);
}
