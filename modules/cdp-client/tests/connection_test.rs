//! Drives `CdpConnection` against an in-process fake DevTools endpoint.

use std::time::Duration;

use cdp_client::{CdpConnection, CdpError};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Accept one socket and answer each command with `respond(method, params)`.
/// `None` means "hang up".
async fn fake_devtools<F>(respond: F) -> String
where
    F: Fn(&str, &Value) -> Option<Vec<Value>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let request: Value = serde_json::from_str(&text).unwrap();
            let method = request["method"].as_str().unwrap_or_default().to_string();
            let Some(mut replies) = respond(&method, &request) else {
                let _ = ws.close(None).await;
                return;
            };
            for reply in replies.iter_mut() {
                if reply.get("method").is_none() {
                    reply["id"] = request["id"].clone();
                }
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
        }
    });

    format!("ws://{addr}/devtools/browser/fake")
}

#[tokio::test]
async fn call_returns_result_payload() {
    let url = fake_devtools(|method, _| {
        assert_eq!(method, "Browser.getVersion");
        Some(vec![json!({ "result": { "product": "HeadlessChrome/126.0" } })])
    })
    .await;

    let conn = CdpConnection::connect(&url).await.unwrap();
    let result = conn.call("Browser.getVersion", json!({}), None).await.unwrap();
    assert_eq!(result["product"], "HeadlessChrome/126.0");
}

#[tokio::test]
async fn protocol_errors_surface_with_code() {
    let url = fake_devtools(|_, _| {
        Some(vec![json!({ "error": { "code": -32601, "message": "'Nope.nope' wasn't found" } })])
    })
    .await;

    let conn = CdpConnection::connect(&url).await.unwrap();
    let err = conn.call("Nope.nope", json!({}), None).await.unwrap_err();
    assert!(matches!(err, CdpError::Protocol { code: -32601, .. }), "{err:?}");
}

#[tokio::test]
async fn session_id_is_forwarded_and_events_fan_out() {
    let url = fake_devtools(|method, request| {
        assert_eq!(method, "Page.navigate");
        assert_eq!(request["sessionId"], "SESSION");
        Some(vec![
            json!({ "result": { "frameId": "F", "loaderId": "L1" } }),
            json!({
                "method": "Page.lifecycleEvent",
                "sessionId": "SESSION",
                "params": { "frameId": "F", "loaderId": "L1", "name": "networkIdle" }
            }),
        ])
    })
    .await;

    let conn = CdpConnection::connect(&url).await.unwrap();
    let mut events = conn.subscribe();
    let nav = conn
        .call("Page.navigate", json!({ "url": "https://example.com" }), Some("SESSION"))
        .await
        .unwrap();
    assert_eq!(nav["loaderId"], "L1");

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.params["name"], "networkIdle");
    assert_eq!(event.session_id.as_deref(), Some("SESSION"));
}

#[tokio::test]
async fn hang_up_fails_pending_calls() {
    let url = fake_devtools(|_, _| None).await;

    let conn = CdpConnection::connect(&url).await.unwrap();
    let err = conn.call("Browser.close", json!({}), None).await.unwrap_err();
    assert!(matches!(err, CdpError::ConnectionClosed), "{err:?}");
}

#[tokio::test]
async fn unanswered_call_times_out() {
    let url = fake_devtools(|_, _| Some(Vec::new())).await;

    let conn = CdpConnection::connect(&url)
        .await
        .unwrap()
        .with_command_timeout(Duration::from_millis(100));
    let err = conn.call("Page.enable", json!({}), None).await.unwrap_err();
    assert!(err.is_timeout(), "{err:?}");
}
