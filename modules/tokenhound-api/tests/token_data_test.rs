use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use tokenhound_api::{router, AppState};

async fn get(store_path: PathBuf) -> (StatusCode, Option<String>, Value) {
    let app = router(Arc::new(AppState { store_path }));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/token-data")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let cors = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, cors, serde_json::from_slice(&body).unwrap())
}

fn record(symbol: &str, rationale: &str) -> Value {
    json!({
        "symbol": symbol,
        "risk": 6,
        "investmentPotential": 7,
        "overall": 70,
        "rationale": rationale,
        "price": 0.0042,
        "volume": "$12K",
        "marketCap": "$1.2M",
        "liquidity": "$80K",
        "change24h": -7.5,
        "age": "3h",
        "href": "#"
    })
}

#[tokio::test]
async fn serves_complete_records_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ai_analyzer.json");
    let file = json!({
        "best_token": {"symbol": "DOGA", "overall": 70, "rationale": "meme"},
        "results": [
            record("DOGA", "dog meme"),
            record("", "no symbol"),
            record("BLANK", "  "),
            {"symbol": "HALF", "risk": 3, "rationale": "no potential"},
        ]
    });
    std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();

    let (status, cors, body) = get(path).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cors.as_deref(), Some("*"));
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["symbol"], "DOGA");
    assert_eq!(data[0]["marketCap"], "$1.2M");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn accepts_legacy_array_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ai_analyzer.json");
    let legacy = json!([record("PEPEM", "frog"), record("WIF", "hat")]);
    std::fs::write(&path, serde_json::to_vec(&legacy).unwrap()).unwrap();

    let (status, _, body) = get(path).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_store_is_not_found() {
    let dir = tempfile::tempdir().unwrap();

    let (status, _, body) = get(dir.path().join("ai_analyzer.json")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Token data file not found", "data": []}));
}

#[tokio::test]
async fn unparseable_store_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ai_analyzer.json");
    std::fs::write(&path, "{ \"results\": [").unwrap();

    let (status, _, body) = get(path).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to parse token data", "data": []}));
}
