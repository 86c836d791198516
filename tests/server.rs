//! HTTP API tests against a router served on an ephemeral port.

use serde_json::{json, Value};

use targeting_harness::config::Config;
use targeting_harness::engine::Engine;
use targeting_harness::server::{build_router, AppState};

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    let engine = Engine::bootstrap(&Config::minimal()).await.unwrap();
    let app = build_router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn test_health_reports_index_size() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["features"], 75);

    handle.abort();
}

#[tokio::test]
async fn test_catalog_lists_every_feature() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/catalog", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 75);
    assert!(features[0]["name"].as_str().unwrap().contains('('));

    handle.abort();
}

#[tokio::test]
async fn test_feature_search_returns_k_rows() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/features/search", base))
        .json(&json!({
            "request": {
                "product": "TestPhone",
                "metric": "전환율",
                "target_count": "100만명",
                "frequency": 4
            },
            "k": 5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let rows = body["features"].as_array().unwrap();
    assert_eq!(rows.len(), 5);
    for row in rows {
        let sim = row["similarity"].as_f64().unwrap();
        assert!(sim > 0.0 && sim <= 1.0);
        assert!(row["justification"]
            .as_str()
            .unwrap()
            .starts_with("주요 행동 발생처:"));
    }

    handle.abort();
}

#[tokio::test]
async fn test_segments_end_to_end() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/segments", base))
        .json(&json!({
            "request": {
                "product": "TestPhone",
                "target_count": "100만명",
                "frequency": 4
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["features"].as_array().unwrap().len(), 20);
    let report = &body["segmentation"];
    assert_eq!(report["total_count"], 1_000_000);
    assert_eq!(report["generation_fallback"], true);
    let segments = report["segments"].as_array().unwrap();
    assert_eq!(segments.len(), 4);
    assert!(segments.iter().all(|s| s["volume"] == 250_000));

    handle.abort();
}

#[tokio::test]
async fn test_invalid_frequency_is_bad_request() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/segments", base))
        .json(&json!({
            "request": { "product": "TestPhone", "target_count": "100", "frequency": 0 }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("frequency"));

    handle.abort();
}

#[tokio::test]
async fn test_oversized_frequency_is_bad_request() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/segments", base))
        .json(&json!({
            "request": { "product": "TestPhone", "target_count": "100만명", "frequency": 40_000_000 }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    handle.abort();
}

#[tokio::test]
async fn test_missing_request_is_bad_request() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/features/search", base))
        .json(&json!({ "k": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    handle.abort();
}
