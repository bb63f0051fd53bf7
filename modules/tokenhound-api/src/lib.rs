use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

pub struct AppState {
    pub store_path: PathBuf,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/token-data", get(api_token_data))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            },
        ))
}

// --- Handlers ---

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message, "data": [] }))).into_response()
}

/// Serve the complete records of the result store as `{ data: [...] }`.
pub async fn api_token_data(State(state): State<Arc<AppState>>) -> Response {
    let bytes = match tokio::fs::read(&state.store_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return error_body(StatusCode::NOT_FOUND, "Token data file not found");
        }
        Err(e) => {
            warn!(error = %e, path = %state.store_path.display(), "Failed to read token data");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to parse token data");
        }
    };

    let file: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Failed to parse token data");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to parse token data");
        }
    };

    let all = results_of(file);
    let total = all.len();
    let complete: Vec<Value> = all.into_iter().filter(is_complete).collect();
    debug!(complete = complete.len(), total, "Filtered token data");

    Json(json!({ "data": complete })).into_response()
}

// --- Helpers ---

/// The record list of either store shape: `{ results: [...] }` or a bare
/// array. Anything else has no records.
fn results_of(file: Value) -> Vec<Value> {
    match file {
        Value::Array(records) => records,
        Value::Object(mut object) => match object.remove("results") {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn non_empty_str(record: &Value, key: &str) -> bool {
    record
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn is_complete(record: &Value) -> bool {
    non_empty_str(record, "symbol")
        && record.get("risk").is_some_and(Value::is_number)
        && record.get("investmentPotential").is_some_and(Value::is_number)
        && non_empty_str(record, "rationale")
}
