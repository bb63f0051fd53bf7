//! Gemini client against a local stand-in for the generateContent endpoint.

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::json;

use ai_client::{AccessToken, AiError, CompletionModel, Gemini, GeminiAuth};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn returns_first_candidate_text() {
    let app = Router::new().fallback(|headers: HeaderMap| async move {
        assert_eq!(headers.get("x-goog-api-key").unwrap(), "test-key");
        Json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"is_memecoin\": false}"}]}}]
        }))
    });
    let base = serve(app).await;

    let ai = Gemini::new(GeminiAuth::ApiKey("test-key".into()), "gemini-test").with_base_url(base);
    let text = ai.complete("hello").await.unwrap();
    assert_eq!(text, "{\"is_memecoin\": false}");
}

#[tokio::test]
async fn too_many_requests_is_rate_limited() {
    let app = Router::new().fallback(|| async {
        (StatusCode::TOO_MANY_REQUESTS, "RESOURCE_EXHAUSTED").into_response()
    });
    let base = serve(app).await;

    let ai = Gemini::new(GeminiAuth::ApiKey("k".into()), "gemini-test").with_base_url(base);
    let err = ai.complete("hello").await.unwrap_err();
    assert!(err.is_rate_limited(), "got {err:?}");
}

#[tokio::test]
async fn server_error_is_api_error() {
    let app = Router::new().fallback(|| async {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
    });
    let base = serve(app).await;

    let ai = Gemini::new(GeminiAuth::ApiKey("k".into()), "gemini-test").with_base_url(base);
    match ai.complete("hello").await.unwrap_err() {
        AiError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn candidate_without_text_is_empty_response() {
    let app = Router::new().fallback(|| async { Json(json!({"candidates": []})) });
    let base = serve(app).await;

    let ai = Gemini::new(GeminiAuth::ApiKey("k".into()), "gemini-test").with_base_url(base);
    let err = ai.complete("hello").await.unwrap_err();
    assert!(matches!(err, AiError::EmptyResponse), "got {err:?}");
}

#[tokio::test]
async fn rejected_credentials_are_an_auth_failure() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
        let app = Router::new().fallback(move || async move {
            (status, "ACCESS_TOKEN_EXPIRED").into_response()
        });
        let base = serve(app).await;

        let ai = Gemini::new(GeminiAuth::ApiKey("k".into()), "gemini-test").with_base_url(base);
        let err = ai.complete("hello").await.unwrap_err();
        assert!(err.is_auth_failure(), "got {err:?}");
        assert!(!err.is_rate_limited());
    }
}

#[tokio::test]
async fn vertex_bearer_follows_the_token_file() {
    let app = Router::new().fallback(|headers: HeaderMap| async move {
        let bearer = headers.get("authorization").unwrap().to_str().unwrap().to_string();
        Json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": bearer}]}}]
        }))
    });
    let base = serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token");

    let ai = Gemini::new(
        GeminiAuth::Vertex {
            project: "proj".into(),
            location: "us-central1".into(),
            access_token: AccessToken::File(token_path.clone()),
        },
        "gemini-test",
    )
    .with_base_url(base);

    std::fs::write(&token_path, "ya29.first\n").unwrap();
    assert_eq!(ai.complete("hello").await.unwrap(), "Bearer ya29.first");

    std::fs::write(&token_path, "ya29.refreshed\n").unwrap();
    assert_eq!(ai.complete("hello").await.unwrap(), "Bearer ya29.refreshed");
}
